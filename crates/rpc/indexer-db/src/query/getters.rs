//! Single-record lookups.

use alloy_primitives::{Address, B256};
use rusqlite::{params, Connection, OptionalExtension};

use crate::content;
use crate::error::IndexerDbResult;
use crate::identity;
use crate::rows::{
    self, lookup_int, BLOCK_COLUMNS, CONTRACT_COLUMNS, LOG_COLUMNS, RECEIPT_COLUMNS, TOKEN_COLUMNS,
    TRANSACTION_COLUMNS, UNCLE_COLUMNS,
};
use crate::types::{
    AddressId, Block, BlockNumber, Bytecode, BytecodeId, Contract, Erc20Token, EventType,
    EventTypeId, Log, LogId, Receipt, Transaction, TransactionId, Uncle,
};

pub fn get_address_by_id(conn: &Connection, id: AddressId) -> IndexerDbResult<Option<Address>> {
    identity::address_by_id(conn, id)
}

pub fn get_address_id_by_hash(
    conn: &Connection,
    address: &Address,
) -> IndexerDbResult<Option<AddressId>> {
    identity::address_id(conn, address)
}

pub fn get_block_by_number(
    conn: &Connection,
    number: BlockNumber,
) -> IndexerDbResult<Option<Block>> {
    let Some(number) = lookup_int(number) else {
        return Ok(None);
    };
    let sql = format!("SELECT {BLOCK_COLUMNS} FROM blocks WHERE number = ?1");
    let block = conn
        .prepare_cached(&sql)?
        .query_row(params![number], rows::row_to_block)
        .optional()?;
    Ok(block)
}

pub fn get_block_by_hash(conn: &Connection, hash: &B256) -> IndexerDbResult<Option<Block>> {
    let sql = format!("SELECT {BLOCK_COLUMNS} FROM blocks WHERE hash = ?1");
    let block = conn
        .prepare_cached(&sql)?
        .query_row(params![hash.as_slice()], rows::row_to_block)
        .optional()?;
    Ok(block)
}

/// Highest stored block number, `None` on an empty database.
pub fn get_latest_block_number(conn: &Connection) -> IndexerDbResult<Option<BlockNumber>> {
    let number: Option<i64> = conn
        .prepare_cached("SELECT MAX(number) FROM blocks")?
        .query_row([], |row| row.get(0))?;
    Ok(number.and_then(|n| u64::try_from(n).ok()))
}

pub fn get_uncle_by_uncle_hash(conn: &Connection, hash: &B256) -> IndexerDbResult<Option<Uncle>> {
    let sql = format!("SELECT {UNCLE_COLUMNS} FROM uncles WHERE hash = ?1");
    let uncle = conn
        .prepare_cached(&sql)?
        .query_row(params![hash.as_slice()], rows::row_to_uncle)
        .optional()?;
    Ok(uncle)
}

pub fn get_transaction_by_id(
    conn: &Connection,
    id: TransactionId,
) -> IndexerDbResult<Option<Transaction>> {
    let sql = format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = ?1");
    let tx = conn
        .prepare_cached(&sql)?
        .query_row(params![id], rows::row_to_transaction)
        .optional()?;
    Ok(tx.map(|(_, tx)| tx))
}

pub fn get_transaction_by_hash(
    conn: &Connection,
    hash: &B256,
) -> IndexerDbResult<Option<(TransactionId, Transaction)>> {
    let sql = format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE hash = ?1");
    let tx = conn
        .prepare_cached(&sql)?
        .query_row(params![hash.as_slice()], rows::row_to_transaction)
        .optional()?;
    Ok(tx)
}

pub fn get_receipt_by_transaction_id(
    conn: &Connection,
    id: TransactionId,
) -> IndexerDbResult<Option<Receipt>> {
    let sql = format!("SELECT {RECEIPT_COLUMNS} FROM receipts WHERE transaction_id = ?1");
    let receipt = conn
        .prepare_cached(&sql)?
        .query_row(params![id], rows::row_to_receipt)
        .optional()?;
    Ok(receipt)
}

pub fn get_bytecode(conn: &Connection, id: BytecodeId) -> IndexerDbResult<Option<Bytecode>> {
    content::get(conn, id)
}

pub fn get_log_by_id(conn: &Connection, id: LogId) -> IndexerDbResult<Option<Log>> {
    let Some(log_index) = lookup_int(id.log_index) else {
        return Ok(None);
    };
    let sql = format!("SELECT {LOG_COLUMNS} FROM logs WHERE transaction_id = ?1 AND log_index = ?2");
    let log = conn
        .prepare_cached(&sql)?
        .query_row(params![id.transaction_id, log_index], rows::row_to_log)
        .optional()?;
    Ok(log)
}

pub fn get_erc20_token_by_address_id(
    conn: &Connection,
    id: AddressId,
) -> IndexerDbResult<Option<Erc20Token>> {
    let sql = format!("SELECT {TOKEN_COLUMNS} FROM erc20_tokens WHERE address_id = ?1");
    let token = conn
        .prepare_cached(&sql)?
        .query_row(params![id], rows::row_to_token)
        .optional()?;
    Ok(token)
}

pub fn get_contract_by_address_id(
    conn: &Connection,
    id: AddressId,
) -> IndexerDbResult<Option<Contract>> {
    let sql = format!("SELECT {CONTRACT_COLUMNS} FROM contracts WHERE address_id = ?1");
    let contract = conn
        .prepare_cached(&sql)?
        .query_row(params![id], rows::row_to_contract)
        .optional()?;
    Ok(contract)
}

pub fn get_event_type_by_id(
    conn: &Connection,
    id: EventTypeId,
) -> IndexerDbResult<Option<EventType>> {
    let event_type = conn
        .prepare_cached("SELECT hash, signature FROM event_types WHERE id = ?1")?
        .query_row(params![id], rows::row_to_event_type)
        .optional()?;
    Ok(event_type)
}

/// Oldest transaction sent by `sender`.
pub fn get_first_tx_sent(
    conn: &Connection,
    sender: AddressId,
) -> IndexerDbResult<Option<Transaction>> {
    sent_by(conn, "MIN", sender)
}

/// Most recent transaction sent by `sender`.
pub fn get_last_tx_sent(
    conn: &Connection,
    sender: AddressId,
) -> IndexerDbResult<Option<Transaction>> {
    sent_by(conn, "MAX", sender)
}

fn sent_by(
    conn: &Connection,
    aggregate: &str,
    sender: AddressId,
) -> IndexerDbResult<Option<Transaction>> {
    let sql = format!("SELECT {aggregate}(id) FROM transactions WHERE from_address_id = ?1");
    let id: Option<TransactionId> = conn
        .prepare_cached(&sql)?
        .query_row(params![sender], |row| row.get(0))?;
    match id {
        Some(id) => get_transaction_by_id(conn, id),
        None => Ok(None),
    }
}
