//! Repository contract and its SQLite implementation.
//!
//! The contract is split by capability so callers can ask for only what they
//! use: ingestion needs [`Storage`], query serving usually only [`Reader`].
//! Every data operation runs inside the repository's open transaction and
//! never commits on its own.

use std::time::Duration;

use alloy_primitives::{Address, B256, U256};

use crate::config::{DatabaseConfig, IndexerDbConfig};
use crate::content;
use crate::deleter;
use crate::error::IndexerDbResult;
use crate::identity;
use crate::query::{balances, getters, listers};
use crate::types::{
    AddressId, Block, BlockNumber, Bytecode, BytecodeId, Contract, Erc20Token, Erc20TokenBalance,
    Erc20TokenTransfer, EtherBalance, EventType, EventTypeId, Log, LogId, OffsetPagination, Page,
    Receipt, StateChange, StorageChange, StorageKey, TraceAction, TraceEntry, Transaction,
    TransactionId, Uncle,
};
use crate::unit_of_work::{Phase, UnitOfWork};

/// Lifecycle of the repository's unit of work.
pub trait Loader {
    /// Open the database and begin the first transaction.
    fn load(&mut self) -> IndexerDbResult<()>;

    /// Make the current batch durable and begin the next one.
    fn commit(&mut self) -> IndexerDbResult<()>;

    /// Commit, waiting at most `timeout` to begin the next transaction.
    ///
    /// The bound only applies when transactions begin immediately; deferred
    /// transactions take no lock when they begin.
    fn commit_within(&mut self, timeout: Duration) -> IndexerDbResult<()>;

    /// Discard the current batch and begin a new one.
    fn rollback(&mut self) -> IndexerDbResult<()>;
}

/// Idempotent writes. Replaying a batch inserts nothing new.
pub trait Inserter {
    fn store_addresses(&self, addresses: &[Address]) -> IndexerDbResult<Vec<AddressId>>;
    fn store_event_types(&self, event_types: &[EventType]) -> IndexerDbResult<Vec<EventTypeId>>;
    /// Accepts at most one blob per call.
    fn store_bytecode(&self, bytecodes: &[Bytecode]) -> IndexerDbResult<Vec<BytecodeId>>;
    fn store_blocks(&self, blocks: &[Block]) -> IndexerDbResult<usize>;
    fn store_uncles(&self, uncles: &[Uncle]) -> IndexerDbResult<usize>;
    fn store_transactions(&self, txs: &[Transaction]) -> IndexerDbResult<Vec<TransactionId>>;
    fn store_receipts(&self, receipts: &[Receipt]) -> IndexerDbResult<usize>;
    fn store_logs(&self, logs: &[Log]) -> IndexerDbResult<usize>;
    fn store_erc20_tokens(&self, tokens: &[Erc20Token]) -> IndexerDbResult<usize>;
    fn store_erc20_token_transfers(
        &self,
        transfers: &[Erc20TokenTransfer],
    ) -> IndexerDbResult<usize>;
    fn store_contracts(&self, contracts: &[Contract]) -> IndexerDbResult<usize>;
    fn store_storage_keys(&self, keys: &[StorageKey]) -> IndexerDbResult<usize>;
    fn store_traces(&self, traces: &[TraceAction]) -> IndexerDbResult<usize>;
    fn store_ether_balances(&self, balances: &[EtherBalance]) -> IndexerDbResult<usize>;
    fn store_erc20_token_balances(&self, balances: &[Erc20TokenBalance])
        -> IndexerDbResult<usize>;
    /// Also stores the nested storage changes.
    fn store_state_changes(&self, changes: &[StateChange]) -> IndexerDbResult<usize>;
    fn store_storage_changes(&self, changes: &[StorageChange]) -> IndexerDbResult<usize>;
}

/// Point lookups, listings and balance queries. Absence is `None`, an empty
/// page or zero.
pub trait Reader {
    fn get_address_by_id(&self, id: AddressId) -> IndexerDbResult<Option<Address>>;
    fn get_address_id_by_hash(&self, address: &Address) -> IndexerDbResult<Option<AddressId>>;
    fn get_block_by_number(&self, number: BlockNumber) -> IndexerDbResult<Option<Block>>;
    fn get_block_by_hash(&self, hash: &B256) -> IndexerDbResult<Option<Block>>;
    fn get_latest_block_number(&self) -> IndexerDbResult<Option<BlockNumber>>;
    fn get_uncle_by_uncle_hash(&self, hash: &B256) -> IndexerDbResult<Option<Uncle>>;
    fn get_transaction_by_id(&self, id: TransactionId) -> IndexerDbResult<Option<Transaction>>;
    fn get_transaction_by_hash(
        &self,
        hash: &B256,
    ) -> IndexerDbResult<Option<(TransactionId, Transaction)>>;
    fn get_receipt_by_transaction_id(&self, id: TransactionId)
        -> IndexerDbResult<Option<Receipt>>;
    fn get_bytecode(&self, id: BytecodeId) -> IndexerDbResult<Option<Bytecode>>;
    fn get_log_by_id(&self, id: LogId) -> IndexerDbResult<Option<Log>>;
    fn get_erc20_token_by_address_id(&self, id: AddressId) -> IndexerDbResult<Option<Erc20Token>>;
    fn get_contract_by_address_id(&self, id: AddressId) -> IndexerDbResult<Option<Contract>>;
    fn get_event_type_by_id(&self, id: EventTypeId) -> IndexerDbResult<Option<EventType>>;
    fn get_first_tx_sent(&self, sender: AddressId) -> IndexerDbResult<Option<Transaction>>;
    fn get_last_tx_sent(&self, sender: AddressId) -> IndexerDbResult<Option<Transaction>>;

    fn list_blocks(&self, pagination: OffsetPagination) -> IndexerDbResult<Page<Block>>;
    fn list_uncles_by_block_number(&self, number: BlockNumber) -> IndexerDbResult<Vec<Uncle>>;
    fn list_transactions(
        &self,
        pagination: OffsetPagination,
    ) -> IndexerDbResult<Page<(TransactionId, Transaction)>>;
    fn list_transactions_by_block_number(
        &self,
        number: BlockNumber,
        pagination: Option<OffsetPagination>,
    ) -> IndexerDbResult<Page<(TransactionId, Transaction)>>;
    fn list_transactions_by_address(
        &self,
        address: &Address,
        pagination: OffsetPagination,
    ) -> IndexerDbResult<Page<(TransactionId, Transaction)>>;
    fn list_storage_keys_by_transaction_id(
        &self,
        id: TransactionId,
    ) -> IndexerDbResult<Vec<StorageKey>>;
    fn list_logs_by_transaction_id(&self, id: TransactionId) -> IndexerDbResult<Vec<Log>>;
    fn list_erc20_token_transfers(
        &self,
        token: Option<&Address>,
        from_or_to: Option<&Address>,
        pagination: Option<OffsetPagination>,
    ) -> IndexerDbResult<Page<Erc20TokenTransfer>>;
    fn list_traces(&self, pagination: Option<OffsetPagination>)
        -> IndexerDbResult<Page<TraceEntry>>;
    fn list_traces_by_transaction_hash(&self, hash: &B256) -> IndexerDbResult<Vec<TraceEntry>>;
    fn list_traces_by_block_number(
        &self,
        number: BlockNumber,
        pagination: Option<OffsetPagination>,
    ) -> IndexerDbResult<Page<TraceEntry>>;
    fn list_state_changes_by_transaction_hash(
        &self,
        hash: &B256,
    ) -> IndexerDbResult<Vec<StateChange>>;

    fn get_wei_balance_at_block(
        &self,
        address: AddressId,
        block: BlockNumber,
    ) -> IndexerDbResult<U256>;
    fn get_erc20_token_balance_at_block(
        &self,
        holder: AddressId,
        token: AddressId,
        block: BlockNumber,
    ) -> IndexerDbResult<U256>;
    fn get_last_stored_ether_balance(
        &self,
        address: AddressId,
    ) -> IndexerDbResult<Option<EtherBalance>>;
    fn get_last_stored_erc20_token_balance(
        &self,
        holder: AddressId,
        token: AddressId,
    ) -> IndexerDbResult<Option<Erc20TokenBalance>>;
    fn list_erc20_token_balances_at_block(
        &self,
        holder: AddressId,
        block: BlockNumber,
    ) -> IndexerDbResult<Vec<Erc20TokenBalance>>;
    fn get_erc20_token_holders(&self, token: AddressId) -> IndexerDbResult<u64>;
}

/// Reorg rollback.
pub trait Deleter {
    /// Delete blocks and every row referencing them. Returns blocks deleted.
    fn delete_blocks_and_all_references(&self, numbers: &[BlockNumber]) -> IndexerDbResult<usize>;
}

/// Everything except lifecycle control.
pub trait DataStore: Reader + Inserter + Deleter {}

impl<T: Reader + Inserter + Deleter> DataStore for T {}

/// Full repository contract.
pub trait Storage: Loader + DataStore {}

impl<T: Loader + DataStore> Storage for T {}

/// Repository backed by one SQLite connection.
///
/// `Send` but not `Sync`: share it across threads behind a `Mutex`.
#[derive(Debug)]
pub struct SqliteRepository {
    uow: UnitOfWork,
}

impl SqliteRepository {
    /// Repository for `config`; nothing is opened until [`Loader::load`].
    pub fn new(config: DatabaseConfig) -> Self {
        Self {
            uow: UnitOfWork::new(config),
        }
    }

    /// Private in-memory database, mostly for tests.
    pub fn in_memory() -> Self {
        Self::new(DatabaseConfig::in_memory())
    }

    pub fn from_config(config: &IndexerDbConfig) -> Self {
        Self::new(config.database.clone())
    }

    pub fn phase(&self) -> Phase {
        self.uow.phase()
    }

    pub fn config(&self) -> &DatabaseConfig {
        self.uow.config()
    }
}

impl Loader for SqliteRepository {
    fn load(&mut self) -> IndexerDbResult<()> {
        self.uow.load()
    }

    fn commit(&mut self) -> IndexerDbResult<()> {
        self.uow.commit()
    }

    fn commit_within(&mut self, timeout: Duration) -> IndexerDbResult<()> {
        self.uow.commit_within(timeout)
    }

    fn rollback(&mut self) -> IndexerDbResult<()> {
        self.uow.rollback()
    }
}

impl Inserter for SqliteRepository {
    fn store_addresses(&self, addresses: &[Address]) -> IndexerDbResult<Vec<AddressId>> {
        identity::resolve_addresses(self.uow.connection()?, addresses)
    }

    fn store_event_types(&self, event_types: &[EventType]) -> IndexerDbResult<Vec<EventTypeId>> {
        identity::resolve_event_types(self.uow.connection()?, event_types)
    }

    fn store_bytecode(&self, bytecodes: &[Bytecode]) -> IndexerDbResult<Vec<BytecodeId>> {
        content::store_batch(self.uow.connection()?, bytecodes)
    }

    fn store_blocks(&self, blocks: &[Block]) -> IndexerDbResult<usize> {
        crate::writer::store_blocks(self.uow.connection()?, blocks)
    }

    fn store_uncles(&self, uncles: &[Uncle]) -> IndexerDbResult<usize> {
        crate::writer::store_uncles(self.uow.connection()?, uncles)
    }

    fn store_transactions(&self, txs: &[Transaction]) -> IndexerDbResult<Vec<TransactionId>> {
        crate::writer::store_transactions(self.uow.connection()?, txs)
    }

    fn store_receipts(&self, receipts: &[Receipt]) -> IndexerDbResult<usize> {
        crate::writer::store_receipts(self.uow.connection()?, receipts)
    }

    fn store_logs(&self, logs: &[Log]) -> IndexerDbResult<usize> {
        crate::writer::store_logs(self.uow.connection()?, logs)
    }

    fn store_erc20_tokens(&self, tokens: &[Erc20Token]) -> IndexerDbResult<usize> {
        crate::writer::store_erc20_tokens(self.uow.connection()?, tokens)
    }

    fn store_erc20_token_transfers(
        &self,
        transfers: &[Erc20TokenTransfer],
    ) -> IndexerDbResult<usize> {
        crate::writer::store_erc20_token_transfers(self.uow.connection()?, transfers)
    }

    fn store_contracts(&self, contracts: &[Contract]) -> IndexerDbResult<usize> {
        crate::writer::store_contracts(self.uow.connection()?, contracts)
    }

    fn store_storage_keys(&self, keys: &[StorageKey]) -> IndexerDbResult<usize> {
        crate::writer::store_storage_keys(self.uow.connection()?, keys)
    }

    fn store_traces(&self, traces: &[TraceAction]) -> IndexerDbResult<usize> {
        crate::writer::store_traces(self.uow.connection()?, traces)
    }

    fn store_ether_balances(&self, balances: &[EtherBalance]) -> IndexerDbResult<usize> {
        crate::writer::store_ether_balances(self.uow.connection()?, balances)
    }

    fn store_erc20_token_balances(
        &self,
        balances: &[Erc20TokenBalance],
    ) -> IndexerDbResult<usize> {
        crate::writer::store_erc20_token_balances(self.uow.connection()?, balances)
    }

    fn store_state_changes(&self, changes: &[StateChange]) -> IndexerDbResult<usize> {
        crate::writer::store_state_changes(self.uow.connection()?, changes)
    }

    fn store_storage_changes(&self, changes: &[StorageChange]) -> IndexerDbResult<usize> {
        crate::writer::store_storage_changes(self.uow.connection()?, changes)
    }
}

impl Reader for SqliteRepository {
    fn get_address_by_id(&self, id: AddressId) -> IndexerDbResult<Option<Address>> {
        getters::get_address_by_id(self.uow.connection()?, id)
    }

    fn get_address_id_by_hash(&self, address: &Address) -> IndexerDbResult<Option<AddressId>> {
        getters::get_address_id_by_hash(self.uow.connection()?, address)
    }

    fn get_block_by_number(&self, number: BlockNumber) -> IndexerDbResult<Option<Block>> {
        getters::get_block_by_number(self.uow.connection()?, number)
    }

    fn get_block_by_hash(&self, hash: &B256) -> IndexerDbResult<Option<Block>> {
        getters::get_block_by_hash(self.uow.connection()?, hash)
    }

    fn get_latest_block_number(&self) -> IndexerDbResult<Option<BlockNumber>> {
        getters::get_latest_block_number(self.uow.connection()?)
    }

    fn get_uncle_by_uncle_hash(&self, hash: &B256) -> IndexerDbResult<Option<Uncle>> {
        getters::get_uncle_by_uncle_hash(self.uow.connection()?, hash)
    }

    fn get_transaction_by_id(&self, id: TransactionId) -> IndexerDbResult<Option<Transaction>> {
        getters::get_transaction_by_id(self.uow.connection()?, id)
    }

    fn get_transaction_by_hash(
        &self,
        hash: &B256,
    ) -> IndexerDbResult<Option<(TransactionId, Transaction)>> {
        getters::get_transaction_by_hash(self.uow.connection()?, hash)
    }

    fn get_receipt_by_transaction_id(
        &self,
        id: TransactionId,
    ) -> IndexerDbResult<Option<Receipt>> {
        getters::get_receipt_by_transaction_id(self.uow.connection()?, id)
    }

    fn get_bytecode(&self, id: BytecodeId) -> IndexerDbResult<Option<Bytecode>> {
        getters::get_bytecode(self.uow.connection()?, id)
    }

    fn get_log_by_id(&self, id: LogId) -> IndexerDbResult<Option<Log>> {
        getters::get_log_by_id(self.uow.connection()?, id)
    }

    fn get_erc20_token_by_address_id(&self, id: AddressId) -> IndexerDbResult<Option<Erc20Token>> {
        getters::get_erc20_token_by_address_id(self.uow.connection()?, id)
    }

    fn get_contract_by_address_id(&self, id: AddressId) -> IndexerDbResult<Option<Contract>> {
        getters::get_contract_by_address_id(self.uow.connection()?, id)
    }

    fn get_event_type_by_id(&self, id: EventTypeId) -> IndexerDbResult<Option<EventType>> {
        getters::get_event_type_by_id(self.uow.connection()?, id)
    }

    fn get_first_tx_sent(&self, sender: AddressId) -> IndexerDbResult<Option<Transaction>> {
        getters::get_first_tx_sent(self.uow.connection()?, sender)
    }

    fn get_last_tx_sent(&self, sender: AddressId) -> IndexerDbResult<Option<Transaction>> {
        getters::get_last_tx_sent(self.uow.connection()?, sender)
    }

    fn list_blocks(&self, pagination: OffsetPagination) -> IndexerDbResult<Page<Block>> {
        listers::list_blocks(self.uow.connection()?, pagination)
    }

    fn list_uncles_by_block_number(&self, number: BlockNumber) -> IndexerDbResult<Vec<Uncle>> {
        listers::list_uncles_by_block_number(self.uow.connection()?, number)
    }

    fn list_transactions(
        &self,
        pagination: OffsetPagination,
    ) -> IndexerDbResult<Page<(TransactionId, Transaction)>> {
        listers::list_transactions(self.uow.connection()?, pagination)
    }

    fn list_transactions_by_block_number(
        &self,
        number: BlockNumber,
        pagination: Option<OffsetPagination>,
    ) -> IndexerDbResult<Page<(TransactionId, Transaction)>> {
        listers::list_transactions_by_block_number(self.uow.connection()?, number, pagination)
    }

    fn list_transactions_by_address(
        &self,
        address: &Address,
        pagination: OffsetPagination,
    ) -> IndexerDbResult<Page<(TransactionId, Transaction)>> {
        listers::list_transactions_by_address(self.uow.connection()?, address, pagination)
    }

    fn list_storage_keys_by_transaction_id(
        &self,
        id: TransactionId,
    ) -> IndexerDbResult<Vec<StorageKey>> {
        listers::list_storage_keys_by_transaction_id(self.uow.connection()?, id)
    }

    fn list_logs_by_transaction_id(&self, id: TransactionId) -> IndexerDbResult<Vec<Log>> {
        listers::list_logs_by_transaction_id(self.uow.connection()?, id)
    }

    fn list_erc20_token_transfers(
        &self,
        token: Option<&Address>,
        from_or_to: Option<&Address>,
        pagination: Option<OffsetPagination>,
    ) -> IndexerDbResult<Page<Erc20TokenTransfer>> {
        listers::list_erc20_token_transfers(self.uow.connection()?, token, from_or_to, pagination)
    }

    fn list_traces(
        &self,
        pagination: Option<OffsetPagination>,
    ) -> IndexerDbResult<Page<TraceEntry>> {
        listers::list_traces(self.uow.connection()?, pagination)
    }

    fn list_traces_by_transaction_hash(&self, hash: &B256) -> IndexerDbResult<Vec<TraceEntry>> {
        listers::list_traces_by_transaction_hash(self.uow.connection()?, hash)
    }

    fn list_traces_by_block_number(
        &self,
        number: BlockNumber,
        pagination: Option<OffsetPagination>,
    ) -> IndexerDbResult<Page<TraceEntry>> {
        listers::list_traces_by_block_number(self.uow.connection()?, number, pagination)
    }

    fn list_state_changes_by_transaction_hash(
        &self,
        hash: &B256,
    ) -> IndexerDbResult<Vec<StateChange>> {
        listers::list_state_changes_by_transaction_hash(self.uow.connection()?, hash)
    }

    fn get_wei_balance_at_block(
        &self,
        address: AddressId,
        block: BlockNumber,
    ) -> IndexerDbResult<U256> {
        balances::get_wei_balance_at_block(self.uow.connection()?, address, block)
    }

    fn get_erc20_token_balance_at_block(
        &self,
        holder: AddressId,
        token: AddressId,
        block: BlockNumber,
    ) -> IndexerDbResult<U256> {
        balances::get_erc20_token_balance_at_block(self.uow.connection()?, holder, token, block)
    }

    fn get_last_stored_ether_balance(
        &self,
        address: AddressId,
    ) -> IndexerDbResult<Option<EtherBalance>> {
        balances::get_last_stored_ether_balance(self.uow.connection()?, address)
    }

    fn get_last_stored_erc20_token_balance(
        &self,
        holder: AddressId,
        token: AddressId,
    ) -> IndexerDbResult<Option<Erc20TokenBalance>> {
        balances::get_last_stored_erc20_token_balance(self.uow.connection()?, holder, token)
    }

    fn list_erc20_token_balances_at_block(
        &self,
        holder: AddressId,
        block: BlockNumber,
    ) -> IndexerDbResult<Vec<Erc20TokenBalance>> {
        balances::list_erc20_token_balances_at_block(self.uow.connection()?, holder, block)
    }

    fn get_erc20_token_holders(&self, token: AddressId) -> IndexerDbResult<u64> {
        balances::get_erc20_token_holders(self.uow.connection()?, token)
    }
}

impl Deleter for SqliteRepository {
    fn delete_blocks_and_all_references(&self, numbers: &[BlockNumber]) -> IndexerDbResult<usize> {
        deleter::delete_blocks_and_all_references(self.uow.connection()?, numbers)
    }
}
