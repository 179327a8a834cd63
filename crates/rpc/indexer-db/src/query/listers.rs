//! Listings.
//!
//! Paginated listings report the total number of matching rows alongside the
//! requested slice. Orderings are newest first unless noted.

use alloy_primitives::{Address, B256};
use rusqlite::types::ToSql;
use rusqlite::Connection;

use super::{all, paged};
use crate::error::IndexerDbResult;
use crate::identity;
use crate::query::getters;
use crate::rows::{
    self, lookup_int, BLOCK_COLUMNS, LOG_COLUMNS, STATE_CHANGE_COLUMNS, STORAGE_CHANGE_COLUMNS,
    STORAGE_KEY_COLUMNS, TRACE_ENTRY_COLUMNS, TRANSACTION_COLUMNS, TRANSFER_COLUMNS, UNCLE_COLUMNS,
};
use crate::types::{
    Block, BlockNumber, Erc20TokenTransfer, Log, OffsetPagination, Page, StateChange, StorageKey,
    TraceEntry, Transaction, TransactionId, Uncle,
};

const TRACE_JOIN: &str = "traces
     JOIN transactions ON transactions.id = traces.transaction_id
     JOIN blocks ON blocks.number = transactions.block_number";

/// Blocks by number, highest first.
pub fn list_blocks(conn: &Connection, pagination: OffsetPagination) -> IndexerDbResult<Page<Block>> {
    paged(
        conn,
        "SELECT COUNT(*) FROM blocks",
        &format!("SELECT {BLOCK_COLUMNS} FROM blocks ORDER BY number DESC LIMIT ? OFFSET ?"),
        &[],
        Some(pagination),
        rows::row_to_block,
    )
}

/// Uncles of a block, by position.
pub fn list_uncles_by_block_number(
    conn: &Connection,
    number: BlockNumber,
) -> IndexerDbResult<Vec<Uncle>> {
    let Some(number) = lookup_int(number) else {
        return Ok(Vec::new());
    };
    all(
        conn,
        &format!("SELECT {UNCLE_COLUMNS} FROM uncles WHERE block_height = ?1 ORDER BY position ASC"),
        &[&number],
        rows::row_to_uncle,
    )
}

/// All transactions, most recently stored first.
pub fn list_transactions(
    conn: &Connection,
    pagination: OffsetPagination,
) -> IndexerDbResult<Page<(TransactionId, Transaction)>> {
    paged(
        conn,
        "SELECT COUNT(*) FROM transactions",
        &format!("SELECT {TRANSACTION_COLUMNS} FROM transactions ORDER BY id DESC LIMIT ? OFFSET ?"),
        &[],
        Some(pagination),
        rows::row_to_transaction,
    )
}

/// Transactions of a block, highest index first.
pub fn list_transactions_by_block_number(
    conn: &Connection,
    number: BlockNumber,
    pagination: Option<OffsetPagination>,
) -> IndexerDbResult<Page<(TransactionId, Transaction)>> {
    let Some(number) = lookup_int(number) else {
        return Ok(Page::empty());
    };
    paged(
        conn,
        "SELECT COUNT(*) FROM transactions WHERE block_number = ?",
        &format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE block_number = ?
             ORDER BY tx_index DESC LIMIT ? OFFSET ?"
        ),
        &[&number],
        pagination,
        rows::row_to_transaction,
    )
}

/// Transactions sent from or to `address`. An unknown address has none.
pub fn list_transactions_by_address(
    conn: &Connection,
    address: &Address,
    pagination: OffsetPagination,
) -> IndexerDbResult<Page<(TransactionId, Transaction)>> {
    let Some(id) = identity::address_id(conn, address)? else {
        return Ok(Page::empty());
    };
    paged(
        conn,
        "SELECT COUNT(*) FROM transactions WHERE from_address_id = ?1 OR to_address_id = ?1",
        &format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions
             WHERE from_address_id = ?1 OR to_address_id = ?1
             ORDER BY id DESC LIMIT ? OFFSET ?"
        ),
        &[&id],
        Some(pagination),
        rows::row_to_transaction,
    )
}

pub fn list_storage_keys_by_transaction_id(
    conn: &Connection,
    id: TransactionId,
) -> IndexerDbResult<Vec<StorageKey>> {
    all(
        conn,
        &format!(
            "SELECT {STORAGE_KEY_COLUMNS} FROM storage_keys WHERE transaction_id = ?1
             ORDER BY address_id, length(storage_key), storage_key"
        ),
        &[&id],
        rows::row_to_storage_key,
    )
}

/// Logs of a transaction, highest index first.
pub fn list_logs_by_transaction_id(
    conn: &Connection,
    id: TransactionId,
) -> IndexerDbResult<Vec<Log>> {
    all(
        conn,
        &format!(
            "SELECT {LOG_COLUMNS} FROM logs WHERE transaction_id = ?1 ORDER BY log_index DESC"
        ),
        &[&id],
        rows::row_to_log,
    )
}

/// Token transfers, optionally restricted to a token and to a participant
/// (sender or recipient).
///
/// Filtering on an address that was never stored matches nothing. Without
/// pagination only the total is reported.
pub fn list_erc20_token_transfers(
    conn: &Connection,
    token: Option<&Address>,
    from_or_to: Option<&Address>,
    pagination: Option<OffsetPagination>,
) -> IndexerDbResult<Page<Erc20TokenTransfer>> {
    let mut conditions = Vec::new();
    let mut ids = Vec::new();

    if let Some(token) = token {
        let Some(id) = identity::address_id(conn, token)? else {
            return Ok(Page::empty());
        };
        ids.push(id);
        conditions.push(format!("token_address_id = ?{}", ids.len()));
    }
    if let Some(participant) = from_or_to {
        let Some(id) = identity::address_id(conn, participant)? else {
            return Ok(Page::empty());
        };
        ids.push(id);
        let n = ids.len();
        conditions.push(format!("(from_address_id = ?{n} OR to_address_id = ?{n})"));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };
    let filter: Vec<&dyn ToSql> = ids.iter().map(|id| id as &dyn ToSql).collect();

    paged(
        conn,
        &format!("SELECT COUNT(*) FROM erc20_token_transfers {where_clause}"),
        &format!(
            "SELECT {TRANSFER_COLUMNS} FROM erc20_token_transfers {where_clause}
             ORDER BY transaction_id DESC, log_index DESC LIMIT ? OFFSET ?"
        ),
        &filter,
        Some(pagination.unwrap_or(OffsetPagination::new(0, 0))),
        rows::row_to_transfer,
    )
}

/// Traces of every transaction, with the block they executed in.
pub fn list_traces(
    conn: &Connection,
    pagination: Option<OffsetPagination>,
) -> IndexerDbResult<Page<TraceEntry>> {
    paged(
        conn,
        &format!("SELECT COUNT(*) FROM {TRACE_JOIN}"),
        &format!(
            "SELECT {TRACE_ENTRY_COLUMNS} FROM {TRACE_JOIN}
             ORDER BY traces.transaction_id DESC, traces.trace_index DESC LIMIT ? OFFSET ?"
        ),
        &[],
        pagination,
        rows::row_to_trace_entry,
    )
}

pub fn list_traces_by_block_number(
    conn: &Connection,
    number: BlockNumber,
    pagination: Option<OffsetPagination>,
) -> IndexerDbResult<Page<TraceEntry>> {
    let Some(number) = lookup_int(number) else {
        return Ok(Page::empty());
    };
    paged(
        conn,
        &format!("SELECT COUNT(*) FROM {TRACE_JOIN} WHERE blocks.number = ?"),
        &format!(
            "SELECT {TRACE_ENTRY_COLUMNS} FROM {TRACE_JOIN} WHERE blocks.number = ?
             ORDER BY traces.transaction_id DESC, traces.trace_index DESC LIMIT ? OFFSET ?"
        ),
        &[&number],
        pagination,
        rows::row_to_trace_entry,
    )
}

pub fn list_traces_by_transaction_hash(
    conn: &Connection,
    hash: &B256,
) -> IndexerDbResult<Vec<TraceEntry>> {
    all(
        conn,
        &format!(
            "SELECT {TRACE_ENTRY_COLUMNS} FROM {TRACE_JOIN} WHERE transactions.hash = ?1
             ORDER BY traces.trace_index DESC"
        ),
        &[&hash.as_slice()],
        rows::row_to_trace_entry,
    )
}

/// State changes of a transaction, each with its storage changes.
pub fn list_state_changes_by_transaction_hash(
    conn: &Connection,
    hash: &B256,
) -> IndexerDbResult<Vec<StateChange>> {
    let Some((tx_id, _)) = getters::get_transaction_by_hash(conn, hash)? else {
        return Ok(Vec::new());
    };

    let mut changes = all(
        conn,
        &format!(
            "SELECT {STATE_CHANGE_COLUMNS} FROM state_changes WHERE transaction_id = ?1
             ORDER BY address_id"
        ),
        &[&tx_id],
        rows::row_to_state_change,
    )?;

    let storage_sql = format!(
        "SELECT {STORAGE_CHANGE_COLUMNS} FROM storage_changes
         WHERE transaction_id = ?1 AND address_id = ?2
         ORDER BY length(storage_address), storage_address"
    );
    for change in &mut changes {
        change.storage_changes = all(
            conn,
            &storage_sql,
            &[&change.transaction_id, &change.address_id],
            rows::row_to_storage_change,
        )?;
    }

    Ok(changes)
}
