//! Schema bootstrap.

use rusqlite::Connection;

use crate::error::{IndexerDbError, IndexerDbResult};

const SCHEMA: &str = include_str!("schema.sql");

/// Tables created by [`apply`], in dependency order.
pub const TABLES: &[&str] = &[
    "addresses",
    "event_types",
    "bytecodes",
    "blocks",
    "uncles",
    "transactions",
    "receipts",
    "logs",
    "erc20_tokens",
    "erc20_token_transfers",
    "contracts",
    "storage_keys",
    "traces",
    "ether_balances",
    "erc20_token_balances",
    "state_changes",
    "storage_changes",
];

/// Apply the schema. Safe to run against an already initialised database.
pub fn apply(conn: &Connection) -> IndexerDbResult<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

/// Turn on foreign key enforcement and confirm the engine honours it.
///
/// Cascading deletes rely on it; a build without foreign key support would
/// accept the pragma and silently ignore it.
pub fn enable_foreign_keys(conn: &Connection) -> IndexerDbResult<()> {
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;
    let enabled: i64 = conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0))?;
    if enabled != 1 {
        return Err(IndexerDbError::ForeignKeysUnavailable);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_names(conn: &Connection) -> Vec<String> {
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .unwrap();
        stmt.query_map([], |row| row.get(0))
            .unwrap()
            .collect::<rusqlite::Result<_>>()
            .unwrap()
    }

    #[test]
    fn test_apply_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        apply(&conn).unwrap();
        apply(&conn).unwrap();

        let names = table_names(&conn);
        for table in TABLES {
            assert!(names.iter().any(|n| n == table), "missing table {table}");
        }
    }

    #[test]
    fn test_foreign_keys_enabled() {
        let conn = Connection::open_in_memory().unwrap();
        enable_foreign_keys(&conn).unwrap();
        apply(&conn).unwrap();

        // Transaction referencing a block that does not exist.
        let err = conn
            .execute(
                "INSERT INTO transactions
                 (block_number, hash, nonce, tx_index, from_address_id, value, gas,
                  gas_price, input, tx_type)
                 VALUES (1, x'01', x'', 0, 1, x'', x'', x'', x'', 0)",
                [],
            )
            .unwrap_err();
        assert_eq!(
            err.sqlite_error_code(),
            Some(rusqlite::ErrorCode::ConstraintViolation)
        );
    }
}
