//! Row mapping between SQL rows and domain types.
//!
//! Each `*_COLUMNS` constant is the select list its `row_to_*` mapper expects,
//! in column order.

use alloy_primitives::{Address, Bloom, Bytes, B256, U256};
use rusqlite::types::Type;
use rusqlite::Row;

use crate::codec::{self, CodecError};
use crate::error::{IndexerDbError, IndexerDbResult};
use crate::types::{
    Block, Contract, Erc20Token, Erc20TokenBalance, Erc20TokenTransfer, EtherBalance, EventType,
    Log, LogId, Receipt, ReceiptStatus, StateChange, StorageChange, StorageKey, TraceAction,
    TraceEntry, Transaction, TransactionId, Uncle,
};

pub(crate) const BLOCK_COLUMNS: &str = "number, hash, nonce, sha3_uncles, logs_bloom, state_root,
     receipts_root, miner_address_id, difficulty, total_difficulty, size, extra_data, gas_limit,
     gas_used, base_fee_per_gas, mix_hash, static_reward, timestamp";

pub(crate) const UNCLE_COLUMNS: &str = "position, hash, uncle_height, block_height, parent_hash,
     miner_address_id, difficulty, gas_limit, gas_used, timestamp, reward";

pub(crate) const TRANSACTION_COLUMNS: &str = "id, block_number, hash, nonce, tx_index,
     from_address_id, to_address_id, value, gas, gas_price, gas_tip_cap, gas_fee_cap, input,
     tx_type";

pub(crate) const RECEIPT_COLUMNS: &str = "transaction_id, cumulative_gas_used, gas_used,
     contract_address_id, post_state, success, effective_gas_price";

pub(crate) const LOG_COLUMNS: &str =
    "transaction_id, log_index, address_id, topic0_id, topic1, topic2, topic3, data";

pub(crate) const TRANSFER_COLUMNS: &str =
    "transaction_id, log_index, token_address_id, from_address_id, to_address_id, value";

pub(crate) const TOKEN_COLUMNS: &str = "address_id, symbol, name, decimals, total_supply";

pub(crate) const CONTRACT_COLUMNS: &str = "address_id, transaction_id, bytecode_id";

pub(crate) const STORAGE_KEY_COLUMNS: &str = "transaction_id, address_id, storage_key";

/// Trace columns qualified with the `traces` table, followed by the block
/// number and timestamp of the enclosing block.
pub(crate) const TRACE_ENTRY_COLUMNS: &str = "traces.transaction_id, traces.trace_index,
     traces.trace_type, traces.input, traces.from_address_id, traces.to_address_id, traces.value,
     traces.gas, traces.error, blocks.number, blocks.timestamp";

pub(crate) const STATE_CHANGE_COLUMNS: &str =
    "transaction_id, address_id, balance_before, balance_after, nonce_before, nonce_after";

pub(crate) const STORAGE_CHANGE_COLUMNS: &str =
    "transaction_id, address_id, storage_address, value_before, value_after";

/// Convert an ordering key to an SQL integer for writing.
pub(crate) fn sql_int(field: &'static str, value: u64) -> IndexerDbResult<i64> {
    i64::try_from(value).map_err(|_| IndexerDbError::IntegerOutOfRange { field, value })
}

/// Convert a lookup key to an SQL integer. Keys above `i64::MAX` are never
/// stored, so `None` means no row can match.
pub(crate) fn lookup_int(value: u64) -> Option<i64> {
    i64::try_from(value).ok()
}

/// Convert an inclusive upper bound to an SQL integer, saturating at `i64::MAX`.
pub(crate) fn bound_int(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn codec_failure(col: usize, err: CodecError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(col, Type::Blob, Box::new(err))
}

fn fixed_from_row<const N: usize>(bytes: &[u8], col: usize) -> rusqlite::Result<[u8; N]> {
    <[u8; N]>::try_from(bytes).map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            col,
            Type::Blob,
            format!("expected {N} bytes, got {}", bytes.len()).into(),
        )
    })
}

pub(crate) fn b256_at(row: &Row<'_>, col: usize) -> rusqlite::Result<B256> {
    let bytes: Vec<u8> = row.get(col)?;
    fixed_from_row::<32>(&bytes, col).map(B256::from)
}

pub(crate) fn optional_b256_at(row: &Row<'_>, col: usize) -> rusqlite::Result<Option<B256>> {
    let bytes: Option<Vec<u8>> = row.get(col)?;
    bytes
        .map(|b| fixed_from_row::<32>(&b, col).map(B256::from))
        .transpose()
}

pub(crate) fn address_at(row: &Row<'_>, col: usize) -> rusqlite::Result<Address> {
    let bytes: Vec<u8> = row.get(col)?;
    fixed_from_row::<20>(&bytes, col).map(Address::from)
}

fn bloom_at(row: &Row<'_>, col: usize) -> rusqlite::Result<Bloom> {
    let bytes: Vec<u8> = row.get(col)?;
    fixed_from_row::<256>(&bytes, col).map(Bloom::from)
}

fn bytes_at(row: &Row<'_>, col: usize) -> rusqlite::Result<Bytes> {
    let bytes: Vec<u8> = row.get(col)?;
    Ok(Bytes::from(bytes))
}

/// Counter stored as a compact blob.
pub(crate) fn u64_at(row: &Row<'_>, col: usize) -> rusqlite::Result<u64> {
    let bytes: Vec<u8> = row.get(col)?;
    codec::decode_u64(&bytes).map_err(|e| codec_failure(col, e))
}

fn optional_u64_at(row: &Row<'_>, col: usize) -> rusqlite::Result<Option<u64>> {
    let bytes: Option<Vec<u8>> = row.get(col)?;
    bytes
        .map(|b| codec::decode_u64(&b).map_err(|e| codec_failure(col, e)))
        .transpose()
}

pub(crate) fn u256_at(row: &Row<'_>, col: usize) -> rusqlite::Result<U256> {
    let bytes: Vec<u8> = row.get(col)?;
    codec::decode_u256(&bytes).map_err(|e| codec_failure(col, e))
}

fn optional_u256_at(row: &Row<'_>, col: usize) -> rusqlite::Result<Option<U256>> {
    let bytes: Option<Vec<u8>> = row.get(col)?;
    bytes
        .map(|b| codec::decode_u256(&b).map_err(|e| codec_failure(col, e)))
        .transpose()
}

/// Ordering key stored as an SQL integer.
pub(crate) fn uint_at(row: &Row<'_>, col: usize) -> rusqlite::Result<u64> {
    let value: i64 = row.get(col)?;
    u64::try_from(value).map_err(|_| rusqlite::Error::IntegralValueOutOfRange(col, value))
}

pub(crate) fn row_to_block(row: &Row<'_>) -> rusqlite::Result<Block> {
    Ok(Block {
        number: uint_at(row, 0)?,
        hash: b256_at(row, 1)?,
        nonce: u64_at(row, 2)?,
        sha3_uncles: b256_at(row, 3)?,
        logs_bloom: bloom_at(row, 4)?,
        state_root: b256_at(row, 5)?,
        receipts_root: b256_at(row, 6)?,
        miner_address_id: row.get(7)?,
        difficulty: u256_at(row, 8)?,
        total_difficulty: u256_at(row, 9)?,
        size: u64_at(row, 10)?,
        extra_data: bytes_at(row, 11)?,
        gas_limit: u64_at(row, 12)?,
        gas_used: u64_at(row, 13)?,
        base_fee_per_gas: u256_at(row, 14)?,
        mix_hash: b256_at(row, 15)?,
        static_reward: u256_at(row, 16)?,
        timestamp: uint_at(row, 17)?,
    })
}

pub(crate) fn row_to_uncle(row: &Row<'_>) -> rusqlite::Result<Uncle> {
    let position: u8 = row.get(0)?;
    Ok(Uncle {
        position,
        hash: b256_at(row, 1)?,
        uncle_height: uint_at(row, 2)?,
        block_height: uint_at(row, 3)?,
        parent_hash: b256_at(row, 4)?,
        miner_address_id: row.get(5)?,
        difficulty: u256_at(row, 6)?,
        gas_limit: u64_at(row, 7)?,
        gas_used: u64_at(row, 8)?,
        timestamp: uint_at(row, 9)?,
        reward: u256_at(row, 10)?,
    })
}

/// Maps [`TRANSACTION_COLUMNS`]; the surrogate id travels next to the record.
pub(crate) fn row_to_transaction(row: &Row<'_>) -> rusqlite::Result<(TransactionId, Transaction)> {
    let id: TransactionId = row.get(0)?;
    let tx_type: u8 = row.get(13)?;
    Ok((
        id,
        Transaction {
            block_number: uint_at(row, 1)?,
            hash: b256_at(row, 2)?,
            nonce: u64_at(row, 3)?,
            index: uint_at(row, 4)?,
            from_address_id: row.get(5)?,
            to_address_id: row.get(6)?,
            value: u256_at(row, 7)?,
            gas: u64_at(row, 8)?,
            gas_price: u256_at(row, 9)?,
            gas_tip_cap: optional_u256_at(row, 10)?,
            gas_fee_cap: optional_u256_at(row, 11)?,
            input: bytes_at(row, 12)?,
            tx_type,
        },
    ))
}

pub(crate) fn row_to_receipt(row: &Row<'_>) -> rusqlite::Result<Receipt> {
    let success: bool = row.get(5)?;
    Ok(Receipt {
        transaction_id: row.get(0)?,
        cumulative_gas_used: u64_at(row, 1)?,
        gas_used: u64_at(row, 2)?,
        contract_address_id: row.get(3)?,
        post_state: b256_at(row, 4)?,
        status: ReceiptStatus::from(success),
        effective_gas_price: u256_at(row, 6)?,
    })
}

pub(crate) fn row_to_log(row: &Row<'_>) -> rusqlite::Result<Log> {
    Ok(Log {
        id: LogId {
            transaction_id: row.get(0)?,
            log_index: uint_at(row, 1)?,
        },
        address_id: row.get(2)?,
        topic0_id: row.get(3)?,
        topic1: optional_b256_at(row, 4)?,
        topic2: optional_b256_at(row, 5)?,
        topic3: optional_b256_at(row, 6)?,
        data: bytes_at(row, 7)?,
    })
}

pub(crate) fn row_to_transfer(row: &Row<'_>) -> rusqlite::Result<Erc20TokenTransfer> {
    Ok(Erc20TokenTransfer {
        log_id: LogId {
            transaction_id: row.get(0)?,
            log_index: uint_at(row, 1)?,
        },
        token_address_id: row.get(2)?,
        from_address_id: row.get(3)?,
        to_address_id: row.get(4)?,
        value: u256_at(row, 5)?,
    })
}

pub(crate) fn row_to_token(row: &Row<'_>) -> rusqlite::Result<Erc20Token> {
    Ok(Erc20Token {
        address_id: row.get(0)?,
        symbol: row.get(1)?,
        name: row.get(2)?,
        decimals: row.get(3)?,
        total_supply: u256_at(row, 4)?,
    })
}

pub(crate) fn row_to_contract(row: &Row<'_>) -> rusqlite::Result<Contract> {
    Ok(Contract {
        address_id: row.get(0)?,
        transaction_id: row.get(1)?,
        bytecode_id: row.get(2)?,
    })
}

pub(crate) fn row_to_event_type(row: &Row<'_>) -> rusqlite::Result<EventType> {
    Ok(EventType {
        hash: b256_at(row, 0)?,
        signature: row.get(1)?,
    })
}

pub(crate) fn row_to_storage_key(row: &Row<'_>) -> rusqlite::Result<StorageKey> {
    Ok(StorageKey {
        transaction_id: row.get(0)?,
        address_id: row.get(1)?,
        storage_key: u256_at(row, 2)?,
    })
}

pub(crate) fn row_to_trace_entry(row: &Row<'_>) -> rusqlite::Result<TraceEntry> {
    let index: u16 = row.get(1)?;
    Ok(TraceEntry {
        trace: TraceAction {
            transaction_id: row.get(0)?,
            index,
            trace_type: row.get(2)?,
            input: bytes_at(row, 3)?,
            from_address_id: row.get(4)?,
            to_address_id: row.get(5)?,
            value: u256_at(row, 6)?,
            gas: u64_at(row, 7)?,
            error: row.get(8)?,
        },
        block_number: uint_at(row, 9)?,
        timestamp: uint_at(row, 10)?,
    })
}

/// Maps `block_number, address_id, balance`.
pub(crate) fn row_to_ether_balance(row: &Row<'_>) -> rusqlite::Result<EtherBalance> {
    Ok(EtherBalance {
        block_number: uint_at(row, 0)?,
        address_id: row.get(1)?,
        balance: u256_at(row, 2)?,
    })
}

/// Maps `block_number, address_id, token_address_id, balance`.
pub(crate) fn row_to_token_balance(row: &Row<'_>) -> rusqlite::Result<Erc20TokenBalance> {
    Ok(Erc20TokenBalance {
        block_number: uint_at(row, 0)?,
        address_id: row.get(1)?,
        token_address_id: row.get(2)?,
        balance: u256_at(row, 3)?,
    })
}

/// Storage changes are loaded separately and attached by the caller.
pub(crate) fn row_to_state_change(row: &Row<'_>) -> rusqlite::Result<StateChange> {
    Ok(StateChange {
        transaction_id: row.get(0)?,
        address_id: row.get(1)?,
        balance_before: optional_u256_at(row, 2)?,
        balance_after: optional_u256_at(row, 3)?,
        nonce_before: optional_u64_at(row, 4)?,
        nonce_after: optional_u64_at(row, 5)?,
        storage_changes: Vec::new(),
    })
}

pub(crate) fn row_to_storage_change(row: &Row<'_>) -> rusqlite::Result<StorageChange> {
    Ok(StorageChange {
        transaction_id: row.get(0)?,
        address_id: row.get(1)?,
        storage_address: u256_at(row, 2)?,
        value_before: u256_at(row, 3)?,
        value_after: u256_at(row, 4)?,
    })
}
