//! Error types for indexer database operations.

use std::io::ErrorKind;

use rusqlite::ErrorCode;
use thiserror::Error;

use crate::codec::CodecError;

/// Errors that can occur while loading, writing or querying the indexer database.
///
/// Absent records are not errors: getters return `Ok(None)` and temporal
/// balance queries return zero.
#[derive(Debug, Error)]
pub enum IndexerDbError {
    /// An operation was issued before `load` succeeded.
    #[error("repository is not loaded")]
    NotLoaded,

    /// The previous commit succeeded but no new transaction could be opened.
    #[error("no active transaction; call commit to open one")]
    NoActiveTransaction,

    /// A dictionary key was inserted but could not be read back.
    #[error("lost write: {table} has no row for key 0x{key}")]
    LostWrite { table: &'static str, key: String },

    /// Bytecode can only be stored one blob per call.
    #[error("bulk bytecode insertion is not supported (got {0} records)")]
    UnsupportedBulkBytecode(usize),

    /// Stored data does not fit the declared type.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// A value does not fit an SQL integer column.
    #[error("{field} value {value} does not fit a signed 64-bit column")]
    IntegerOutOfRange { field: &'static str, value: u64 },

    /// The engine was built without foreign key support; cascading deletes
    /// would silently leave orphaned rows.
    #[error("foreign key enforcement is unavailable on this connection")]
    ForeignKeysUnavailable,

    /// SQLite database error.
    #[error("sqlite error: {0}")]
    Sqlite(rusqlite::Error),

    /// Filesystem error while preparing the database location.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl IndexerDbError {
    /// Whether retrying the failed operation later may succeed.
    ///
    /// Covers a database that cannot be opened yet and lock contention.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Io(err) => matches!(
                err.kind(),
                ErrorKind::NotFound
                    | ErrorKind::Interrupted
                    | ErrorKind::WouldBlock
                    | ErrorKind::TimedOut
            ),
            Self::Sqlite(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.code,
                ErrorCode::CannotOpen | ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }

    /// Whether the error reveals a logic or data-corruption bug.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::LostWrite { .. }
                | Self::UnsupportedBulkBytecode(_)
                | Self::Codec(_)
                | Self::ForeignKeysUnavailable
        )
    }
}

impl From<rusqlite::Error> for IndexerDbError {
    fn from(err: rusqlite::Error) -> Self {
        // Row mappers report codec failures as conversion failures; unwrap them
        // so they keep their classification.
        match err {
            rusqlite::Error::FromSqlConversionFailure(col, ty, source) => {
                match source.downcast::<CodecError>() {
                    Ok(codec) => IndexerDbError::Codec(*codec),
                    Err(source) => IndexerDbError::Sqlite(
                        rusqlite::Error::FromSqlConversionFailure(col, ty, source),
                    ),
                }
            }
            other => IndexerDbError::Sqlite(other),
        }
    }
}

/// Result type for indexer database operations.
pub type IndexerDbResult<T> = Result<T, IndexerDbError>;
