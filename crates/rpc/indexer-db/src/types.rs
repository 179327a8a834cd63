//! Domain types for indexed chain data.
//!
//! Hash identities (addresses, event signatures, bytecode) are referenced through
//! typed surrogate keys assigned by the database, so an `AddressId` can never be
//! passed where a `TransactionId` is expected.

use alloy_primitives::{Bloom, Bytes, B256, U256};
use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

/// Block height.
pub type BlockNumber = u64;

/// Position of a log within its transaction.
pub type LogIndex = u64;

/// Raw contract bytecode.
pub type Bytecode = Bytes;

macro_rules! surrogate_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
            Deserialize,
        )]
        pub struct $name(pub i64);

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                self.0.to_sql()
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                i64::column_result(value).map(Self)
            }
        }
    };
}

surrogate_id!(
    /// Surrogate key of a 20-byte account address.
    AddressId
);
surrogate_id!(
    /// Surrogate key of a stored transaction.
    TransactionId
);
surrogate_id!(
    /// Surrogate key of a content-addressed bytecode blob.
    BytecodeId
);
surrogate_id!(
    /// Surrogate key of an event signature (first log topic).
    EventTypeId
);

/// Identifies a log: the transaction that emitted it and its index within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogId {
    pub transaction_id: TransactionId,
    pub log_index: LogIndex,
}

/// Offset based pagination.
///
/// `limit` is the number of records to return, `offset` the position to start
/// listing from. A `limit` of zero skips fetching rows; totals are still reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OffsetPagination {
    pub limit: u32,
    pub offset: u64,
}

impl OffsetPagination {
    pub fn new(limit: u32, offset: u64) -> Self {
        Self { limit, offset }
    }

    /// Pagination by page number instead of raw offset.
    pub fn page(limit: u32, page: u64) -> Self {
        Self {
            limit,
            offset: u64::from(limit).saturating_mul(page),
        }
    }
}

/// A slice of a listing plus the number of records matching it overall.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
        }
    }
}

/// Stored block header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub number: BlockNumber,
    pub hash: B256,
    pub nonce: u64,
    pub sha3_uncles: B256,
    pub logs_bloom: Bloom,
    pub state_root: B256,
    pub receipts_root: B256,
    pub miner_address_id: AddressId,
    pub difficulty: U256,
    pub total_difficulty: U256,
    pub size: u64,
    pub extra_data: Bytes,
    pub gas_limit: u64,
    pub gas_used: u64,
    /// Zero for pre-London blocks.
    pub base_fee_per_gas: U256,
    pub mix_hash: B256,
    pub static_reward: U256,
    /// Unix seconds.
    pub timestamp: u64,
}

/// Uncle (ommer) header included by a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Uncle {
    /// Position within the including block's uncle list.
    pub position: u8,
    pub hash: B256,
    pub uncle_height: BlockNumber,
    /// Height of the block that includes this uncle.
    pub block_height: BlockNumber,
    pub parent_hash: B256,
    pub miner_address_id: AddressId,
    pub difficulty: U256,
    pub gas_limit: u64,
    pub gas_used: u64,
    pub timestamp: u64,
    pub reward: U256,
}

/// Stored transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub block_number: BlockNumber,
    pub hash: B256,
    pub nonce: u64,
    /// Index within the block.
    pub index: u64,
    pub from_address_id: AddressId,
    /// `None` for contract creation.
    pub to_address_id: Option<AddressId>,
    pub value: U256,
    pub gas: u64,
    pub gas_price: U256,
    /// EIP-1559 priority fee cap, absent for legacy transactions.
    pub gas_tip_cap: Option<U256>,
    /// EIP-1559 fee cap, absent for legacy transactions.
    pub gas_fee_cap: Option<U256>,
    pub input: Bytes,
    pub tx_type: u8,
}

/// Outcome of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReceiptStatus {
    Failure,
    Success,
}

impl ReceiptStatus {
    pub fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

impl From<bool> for ReceiptStatus {
    fn from(success: bool) -> Self {
        if success {
            Self::Success
        } else {
            Self::Failure
        }
    }
}

/// Stored transaction receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub transaction_id: TransactionId,
    pub cumulative_gas_used: u64,
    pub gas_used: u64,
    /// Address of the contract created by this transaction, if any.
    pub contract_address_id: Option<AddressId>,
    pub post_state: B256,
    pub status: ReceiptStatus,
    pub effective_gas_price: U256,
}

impl Receipt {
    /// Fee paid by the sender: gas used times effective gas price.
    pub fn transaction_fee(&self) -> U256 {
        U256::from(self.gas_used).saturating_mul(self.effective_gas_price)
    }
}

/// Stored log/event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Log {
    pub id: LogId,
    /// Contract that emitted the log.
    pub address_id: AddressId,
    /// Dictionary-encoded first topic.
    pub topic0_id: Option<EventTypeId>,
    pub topic1: Option<B256>,
    pub topic2: Option<B256>,
    pub topic3: Option<B256>,
    pub data: Bytes,
}

/// ERC-20 `Transfer` decoded from a log; shares the log's key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Erc20TokenTransfer {
    pub log_id: LogId,
    pub token_address_id: AddressId,
    pub from_address_id: AddressId,
    pub to_address_id: AddressId,
    pub value: U256,
}

/// ERC-20 token metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Erc20Token {
    pub address_id: AddressId,
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
    pub total_supply: U256,
}

/// Deployed contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    pub address_id: AddressId,
    /// Transaction that created the contract.
    pub transaction_id: TransactionId,
    pub bytecode_id: BytecodeId,
}

/// Event signature keyed by its hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventType {
    pub hash: B256,
    /// Human readable signature, e.g. `Transfer(address,address,uint256)`.
    pub signature: Option<String>,
}

/// Storage slot touched by a transaction at an address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageKey {
    pub transaction_id: TransactionId,
    pub address_id: AddressId,
    pub storage_key: U256,
}

/// Call-trace action of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceAction {
    pub transaction_id: TransactionId,
    /// Position in the transaction's trace list.
    pub index: u16,
    pub trace_type: String,
    pub input: Bytes,
    pub from_address_id: AddressId,
    pub to_address_id: AddressId,
    pub value: U256,
    pub gas: u64,
    pub error: Option<String>,
}

/// Trace action together with the block it was executed in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEntry {
    pub block_number: BlockNumber,
    pub timestamp: u64,
    pub trace: TraceAction,
}

/// Ether balance snapshot of an address at a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EtherBalance {
    pub block_number: BlockNumber,
    pub address_id: AddressId,
    pub balance: U256,
}

/// ERC-20 balance snapshot of a holder for a token at a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Erc20TokenBalance {
    pub block_number: BlockNumber,
    pub address_id: AddressId,
    pub token_address_id: AddressId,
    pub balance: U256,
}

/// Account diff produced by a transaction.
///
/// Each of the four fields is independently optional: a missing `*_before`
/// value means the account was observed for the first time.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StateChange {
    pub transaction_id: TransactionId,
    pub address_id: AddressId,
    pub balance_before: Option<U256>,
    pub balance_after: Option<U256>,
    pub nonce_before: Option<u64>,
    pub nonce_after: Option<u64>,
    pub storage_changes: Vec<StorageChange>,
}

/// Storage slot diff belonging to a [`StateChange`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StorageChange {
    pub transaction_id: TransactionId,
    pub address_id: AddressId,
    pub storage_address: U256,
    pub value_before: U256,
    pub value_after: U256,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_offset() {
        assert_eq!(OffsetPagination::page(25, 0).offset, 0);
        assert_eq!(OffsetPagination::page(25, 3).offset, 75);
        assert_eq!(OffsetPagination::page(0, 7).offset, 0);
        assert_eq!(OffsetPagination::page(u32::MAX, u64::MAX).offset, u64::MAX);
    }

    #[test]
    fn test_transaction_fee() {
        let receipt = Receipt {
            transaction_id: TransactionId(1),
            cumulative_gas_used: 42_000,
            gas_used: 21_000,
            contract_address_id: None,
            post_state: B256::ZERO,
            status: ReceiptStatus::Success,
            effective_gas_price: U256::from(2_000_000_000u64),
        };
        assert_eq!(
            receipt.transaction_fee(),
            U256::from(42_000_000_000_000u64)
        );
    }

    #[test]
    fn test_receipt_status_from_bool() {
        assert!(ReceiptStatus::from(true).is_success());
        assert!(!ReceiptStatus::from(false).is_success());
    }
}
