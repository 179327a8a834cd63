//! Content-addressed bytecode storage.
//!
//! Bytecode is keyed by its SHA-256 digest, so the same code deployed at many
//! addresses is stored once.

use alloy_primitives::Bytes;
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};

use crate::error::{IndexerDbError, IndexerDbResult};
use crate::identity::BYTECODES;
use crate::types::{Bytecode, BytecodeId};

/// SHA-256 digest of `bytecode`.
pub fn digest(bytecode: &[u8]) -> [u8; 32] {
    Sha256::digest(bytecode).into()
}

/// Store one bytecode blob and return its id.
pub fn store(conn: &Connection, bytecode: &Bytecode) -> IndexerDbResult<BytecodeId> {
    let hash = digest(bytecode);
    let ids = BYTECODES.resolve(
        conn,
        &[(bytecode, hash)],
        |conn, (bytecode, hash)| {
            let code: &[u8] = bytecode;
            let id = conn
                .prepare_cached(
                    "INSERT INTO bytecodes (bytecode, sha256) VALUES (?1, ?2)
                     ON CONFLICT DO NOTHING RETURNING id",
                )?
                .query_row(params![code, hash.as_slice()], |row| row.get(0))
                .optional()?;
            Ok(id)
        },
        |(_, hash)| hash.as_slice(),
    )?;
    ids.first()
        .copied()
        .map(BytecodeId::from)
        .ok_or(IndexerDbError::LostWrite {
            table: BYTECODES.table,
            key: alloy_primitives::hex::encode(hash),
        })
}

/// Store bytecode given as a batch.
///
/// Only batches of at most one blob are accepted; larger batches are rejected
/// with [`IndexerDbError::UnsupportedBulkBytecode`].
pub fn store_batch(conn: &Connection, bytecodes: &[Bytecode]) -> IndexerDbResult<Vec<BytecodeId>> {
    match bytecodes {
        [] => Ok(Vec::new()),
        [bytecode] => Ok(vec![store(conn, bytecode)?]),
        _ => Err(IndexerDbError::UnsupportedBulkBytecode(bytecodes.len())),
    }
}

/// Bytecode stored under `id`.
pub fn get(conn: &Connection, id: BytecodeId) -> IndexerDbResult<Option<Bytecode>> {
    let bytecode = conn
        .prepare_cached("SELECT bytecode FROM bytecodes WHERE id = ?1")?
        .query_row(params![id], |row| row.get::<_, Vec<u8>>(0))
        .optional()?;
    Ok(bytecode.map(Bytes::from))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        schema::enable_foreign_keys(&conn).unwrap();
        schema::apply(&conn).unwrap();
        conn
    }

    #[test]
    fn test_same_content_same_id() {
        let conn = setup();
        let code = Bytes::from_static(&[0x60, 0x80, 0x60, 0x40]);

        let id = store(&conn, &code).unwrap();
        assert_eq!(store(&conn, &code.clone()).unwrap(), id);

        let other = store(&conn, &Bytes::from_static(&[0x00])).unwrap();
        assert_ne!(other, id);

        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM bytecodes", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 2);
        assert_eq!(get(&conn, id).unwrap(), Some(code));
    }

    #[test]
    fn test_batch_sizes() {
        let conn = setup();
        assert!(store_batch(&conn, &[]).unwrap().is_empty());
        assert_eq!(
            store_batch(&conn, &[Bytes::from_static(&[0x01])])
                .unwrap()
                .len(),
            1
        );

        let err = store_batch(
            &conn,
            &[Bytes::from_static(&[0x01]), Bytes::from_static(&[0x02])],
        )
        .unwrap_err();
        assert!(matches!(err, IndexerDbError::UnsupportedBulkBytecode(2)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_digest_is_sha256() {
        // SHA-256 of the empty string.
        assert_eq!(
            alloy_primitives::hex::encode(digest(&[])),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_missing_id() {
        let conn = setup();
        assert_eq!(get(&conn, BytecodeId(1)).unwrap(), None);
    }
}
