//! Record builders shared by unit tests.

use alloy_primitives::{Address, Bloom, Bytes, B256, U256};
use rusqlite::Connection;

use crate::identity;
use crate::schema;
use crate::types::{
    AddressId, Block, Log, LogId, Receipt, ReceiptStatus, TraceAction, Transaction,
    TransactionId, Uncle,
};

/// In-memory database with the schema applied, in autocommit mode.
pub fn schema_conn() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    schema::enable_foreign_keys(&conn).unwrap();
    schema::apply(&conn).unwrap();
    conn
}

pub fn address_ids(conn: &Connection, bytes: &[u8]) -> Vec<AddressId> {
    let addresses: Vec<_> = bytes.iter().map(|b| Address::repeat_byte(*b)).collect();
    identity::resolve_addresses(conn, &addresses).unwrap()
}

pub fn make_block(number: u64, miner: AddressId) -> Block {
    Block {
        number,
        hash: B256::left_padding_from(&number.to_be_bytes()),
        nonce: 0,
        sha3_uncles: B256::repeat_byte(0x1d),
        logs_bloom: Bloom::ZERO,
        state_root: B256::repeat_byte(0xaa),
        receipts_root: B256::repeat_byte(0xcc),
        miner_address_id: miner,
        difficulty: U256::from(17_000_000_000u64),
        total_difficulty: U256::from(number) * U256::from(17_000_000_000u64),
        size: 540,
        extra_data: Bytes::new(),
        gas_limit: 30_000_000,
        gas_used: 21_000,
        base_fee_per_gas: U256::ZERO,
        mix_hash: B256::ZERO,
        static_reward: U256::from(2_000_000_000_000_000_000u64),
        timestamp: 1_600_000_000 + number * 12,
    }
}

/// Uncle whose hash is derived from `block_height` and `position`.
pub fn make_uncle(block_height: u64, position: u8, miner: AddressId) -> Uncle {
    let mut hash = [0xe0u8; 32];
    hash[..8].copy_from_slice(&block_height.to_be_bytes());
    hash[31] = position;
    Uncle {
        position,
        hash: B256::from(hash),
        uncle_height: block_height.saturating_sub(1),
        block_height,
        parent_hash: B256::ZERO,
        miner_address_id: miner,
        difficulty: U256::from(1u64),
        gas_limit: 1,
        gas_used: 0,
        timestamp: 10,
        reward: U256::from(3u64),
    }
}

/// Transaction whose hash is derived from `block_number` and `index`.
pub fn make_transaction(
    block_number: u64,
    index: u64,
    from: AddressId,
    to: Option<AddressId>,
) -> Transaction {
    let mut hash = [0u8; 32];
    hash[..8].copy_from_slice(&block_number.to_be_bytes());
    hash[24..].copy_from_slice(&index.to_be_bytes());
    Transaction {
        block_number,
        hash: B256::from(hash),
        nonce: index,
        index,
        from_address_id: from,
        to_address_id: to,
        value: U256::from(1_000u64),
        gas: 21_000,
        gas_price: U256::from(1_000_000_000u64),
        gas_tip_cap: None,
        gas_fee_cap: None,
        input: Bytes::new(),
        tx_type: 0,
    }
}

pub fn make_receipt(transaction_id: TransactionId) -> Receipt {
    Receipt {
        transaction_id,
        cumulative_gas_used: 21_000,
        gas_used: 21_000,
        contract_address_id: None,
        post_state: B256::ZERO,
        status: ReceiptStatus::Success,
        effective_gas_price: U256::from(1_000_000_000u64),
    }
}

pub fn make_log(transaction_id: TransactionId, log_index: u64, emitter: AddressId) -> Log {
    Log {
        id: LogId {
            transaction_id,
            log_index,
        },
        address_id: emitter,
        topic0_id: None,
        topic1: Some(B256::repeat_byte(0x01)),
        topic2: None,
        topic3: None,
        data: Bytes::from_static(&[0xde, 0xad]),
    }
}

pub fn make_trace(transaction_id: TransactionId, index: u16, addr: AddressId) -> TraceAction {
    TraceAction {
        transaction_id,
        index,
        trace_type: "call".to_string(),
        input: Bytes::new(),
        from_address_id: addr,
        to_address_id: addr,
        value: U256::ZERO,
        gas: 50_000,
        error: None,
    }
}
