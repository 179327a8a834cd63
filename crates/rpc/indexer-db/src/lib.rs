//! Relational persistence for decoded chain data.
//!
//! Stores blocks, uncles, transactions, receipts, logs, traces, contracts,
//! balances, token transfers and state diffs in SQLite, and serves them back
//! through point lookups, paginated listings and point-in-time balance queries.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────┐
//! │        ingestion pipeline / query serving          │
//! └──────────────────────────┬─────────────────────────┘
//!                            │
//!              ┌─────────────▼─────────────┐
//!              │     SqliteRepository      │
//!              │ Loader Inserter Reader    │
//!              │ Deleter                   │
//!              └─────────────┬─────────────┘
//!                            │ UnitOfWork (one connection,
//!                            │ one open transaction)
//!      ┌──────────┬──────────┼──────────┬─────────────┐
//!      ▼          ▼          ▼          ▼             ▼
//! ┌─────────┐ ┌────────┐ ┌────────┐ ┌────────┐ ┌───────────┐
//! │identity │ │content │ │ writer │ │ query  │ │  deleter  │
//! └─────────┘ └────────┘ └────────┘ └────────┘ └───────────┘
//!                            │
//!                  codec · rows · schema.sql
//! ```
//!
//! Hashes that repeat across rows (addresses, event signatures) are stored
//! once and referenced by surrogate ids; bytecode is stored once per SHA-256
//! digest. Writes are idempotent, so a batch can be replayed after a crash.
//! Nothing is durable until [`Loader::commit`].

pub mod codec;
pub mod config;
pub mod content;
pub mod deleter;
pub mod error;
pub mod identity;
pub mod load;
pub mod logging;
pub mod query;
pub mod repository;
mod rows;
pub mod schema;
pub mod types;
pub mod unit_of_work;
pub mod writer;

#[cfg(test)]
mod fixtures;

pub use config::{load_config, ConfigError, DatabaseConfig, IndexerDbConfig};
pub use error::{IndexerDbError, IndexerDbResult};
pub use load::{load_repository, load_with_retry};
pub use logging::init_logging;
pub use repository::{DataStore, Deleter, Inserter, Loader, Reader, SqliteRepository, Storage};
pub use types::*;
pub use unit_of_work::Phase;
