//! Hash to surrogate id dictionaries.
//!
//! Resolution is two-pass. Each key is inserted on its own with
//! `ON CONFLICT DO NOTHING RETURNING id`, which yields the id of fresh rows;
//! keys that hit a conflict are then looked up. Existing rows are never
//! rewritten. A key that neither inserts nor resolves means a write was lost.

use alloy_primitives::{hex, Address};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{IndexerDbError, IndexerDbResult};
use crate::types::{AddressId, EventType, EventTypeId};

/// A dictionary table: a surrogate `id` plus a unique key column.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Dictionary {
    pub table: &'static str,
    pub key_column: &'static str,
}

pub(crate) const ADDRESSES: Dictionary = Dictionary {
    table: "addresses",
    key_column: "hash",
};

pub(crate) const EVENT_TYPES: Dictionary = Dictionary {
    table: "event_types",
    key_column: "hash",
};

pub(crate) const TRANSACTIONS: Dictionary = Dictionary {
    table: "transactions",
    key_column: "hash",
};

pub(crate) const BYTECODES: Dictionary = Dictionary {
    table: "bytecodes",
    key_column: "sha256",
};

impl Dictionary {
    /// Id of `key`, if present.
    pub fn lookup(&self, conn: &Connection, key: &[u8]) -> IndexerDbResult<Option<i64>> {
        let sql = format!(
            "SELECT id FROM {} WHERE {} = ?1",
            self.table, self.key_column
        );
        let id = conn
            .prepare_cached(&sql)?
            .query_row(params![key], |row| row.get(0))
            .optional()?;
        Ok(id)
    }

    /// Resolve every record to its id, inserting the ones not yet present.
    ///
    /// `insert` must insert one record with `ON CONFLICT DO NOTHING RETURNING id`
    /// and report the returned id, or `None` on conflict. `key` extracts the
    /// record's unique key. Ids come back in input order; repeated keys resolve
    /// to the same id.
    pub fn resolve<T>(
        &self,
        conn: &Connection,
        records: &[T],
        mut insert: impl FnMut(&Connection, &T) -> IndexerDbResult<Option<i64>>,
        key: impl Fn(&T) -> &[u8],
    ) -> IndexerDbResult<Vec<i64>> {
        let inserted = records
            .iter()
            .map(|record| insert(conn, record))
            .collect::<IndexerDbResult<Vec<_>>>()?;

        let fresh = inserted.iter().filter(|id| id.is_some()).count();

        let ids = records
            .iter()
            .zip(inserted)
            .map(|(record, id)| match id {
                Some(id) => Ok(id),
                None => self
                    .lookup(conn, key(record))?
                    .ok_or_else(|| IndexerDbError::LostWrite {
                        table: self.table,
                        key: hex::encode(key(record)),
                    }),
            })
            .collect::<IndexerDbResult<Vec<_>>>()?;

        tracing::debug!(
            table = self.table,
            inserted = fresh,
            total = records.len(),
            "resolved identities"
        );
        Ok(ids)
    }
}

fn insert_address(conn: &Connection, address: &Address) -> IndexerDbResult<Option<i64>> {
    let id = conn
        .prepare_cached(
            "INSERT INTO addresses (hash) VALUES (?1)
             ON CONFLICT DO NOTHING RETURNING id",
        )?
        .query_row(params![address.as_slice()], |row| row.get(0))
        .optional()?;
    Ok(id)
}

fn insert_event_type(conn: &Connection, event_type: &EventType) -> IndexerDbResult<Option<i64>> {
    let id = conn
        .prepare_cached(
            "INSERT INTO event_types (hash, signature) VALUES (?1, ?2)
             ON CONFLICT DO NOTHING RETURNING id",
        )?
        .query_row(
            params![event_type.hash.as_slice(), event_type.signature],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

/// Resolve addresses to their ids, creating ids for new addresses.
pub fn resolve_addresses(
    conn: &Connection,
    addresses: &[Address],
) -> IndexerDbResult<Vec<AddressId>> {
    let ids = ADDRESSES.resolve(conn, addresses, insert_address, |a| a.as_slice())?;
    Ok(ids.into_iter().map(AddressId::from).collect())
}

/// Resolve event signatures to their ids. The signature text of an already
/// known hash is left unchanged.
pub fn resolve_event_types(
    conn: &Connection,
    event_types: &[EventType],
) -> IndexerDbResult<Vec<EventTypeId>> {
    let ids = EVENT_TYPES.resolve(conn, event_types, insert_event_type, |e| {
        e.hash.as_slice()
    })?;
    Ok(ids.into_iter().map(EventTypeId::from).collect())
}

/// Id of a known address.
pub fn address_id(conn: &Connection, address: &Address) -> IndexerDbResult<Option<AddressId>> {
    Ok(ADDRESSES
        .lookup(conn, address.as_slice())?
        .map(AddressId::from))
}

/// Address behind an id.
pub fn address_by_id(conn: &Connection, id: AddressId) -> IndexerDbResult<Option<Address>> {
    let address = conn
        .prepare_cached("SELECT hash FROM addresses WHERE id = ?1")?
        .query_row(params![id], |row| crate::rows::address_at(row, 0))
        .optional()?;
    Ok(address)
}
