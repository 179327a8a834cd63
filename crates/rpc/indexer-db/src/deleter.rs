//! Removal of blocks and everything that hangs off them.
//!
//! Child rows are removed by `ON DELETE CASCADE` foreign keys, which
//! [`crate::schema::enable_foreign_keys`] guarantees are enforced. Shared
//! dictionaries (addresses, event types, bytecode) and token metadata are kept.

use rusqlite::{params, Connection};

use crate::error::IndexerDbResult;
use crate::rows::lookup_int;
use crate::types::BlockNumber;

/// Delete the given blocks with their transactions, receipts, logs, transfers,
/// traces, uncles, balance snapshots and state diffs.
///
/// Returns the number of blocks removed; unknown numbers are skipped.
pub fn delete_blocks_and_all_references(
    conn: &Connection,
    numbers: &[BlockNumber],
) -> IndexerDbResult<usize> {
    if numbers.is_empty() {
        return Ok(0);
    }

    let mut stmt = conn.prepare_cached("DELETE FROM blocks WHERE number = ?1")?;
    let mut deleted = 0;
    for number in numbers.iter().filter_map(|n| lookup_int(*n)) {
        deleted += stmt.execute(params![number])?;
    }

    tracing::info!(requested = numbers.len(), deleted, "deleted blocks");
    Ok(deleted)
}
