//! Unit of work: one connection, one open transaction.
//!
//! Every read and write issued through a repository runs inside the transaction
//! held here. Only [`UnitOfWork::commit`] ends it, and it opens the next one
//! straight away, so ingestion gets all-or-nothing batches while reads in the
//! same batch see its uncommitted writes.
//!
//! ```text
//! Uninitialized --load--> Ready --commit--> Committed --(begin)--> Ready
//! ```
//!
//! `Committed` is only observable when the commit succeeded but opening the
//! next transaction failed; the next `commit` (or `load`) call only re-opens.

use std::path::Path;
use std::time::Duration;

use rusqlite::{Connection, ErrorCode, OpenFlags};

use crate::config::DatabaseConfig;
use crate::error::{IndexerDbError, IndexerDbResult};
use crate::schema;

/// Lifecycle state of a [`UnitOfWork`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    /// A transaction is open.
    Ready,
    /// The last batch is durable; no transaction is open.
    Committed,
}

/// Owner of the repository's connection and its open transaction.
#[derive(Debug)]
pub struct UnitOfWork {
    config: DatabaseConfig,
    conn: Option<Connection>,
    phase: Phase,
}

impl UnitOfWork {
    pub fn new(config: DatabaseConfig) -> Self {
        Self {
            config,
            conn: None,
            phase: Phase::Uninitialized,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Open the database, apply the schema and begin the first transaction.
    ///
    /// Calling it again once loaded is a no-op. A failed load leaves nothing
    /// behind, so callers simply retry.
    pub fn load(&mut self) -> IndexerDbResult<()> {
        if self.phase == Phase::Ready {
            return Ok(());
        }

        if self.conn.is_none() {
            let conn = open_connection(&self.config)?;
            configure_connection(&conn, &self.config)?;
            schema::apply(&conn)?;
            self.conn = Some(conn);
            self.phase = Phase::Committed;
            tracing::info!(path = %self.config.path, "indexer database opened");
        }

        self.begin(self.config.busy_timeout())
    }

    /// The connection, provided a transaction is open.
    pub fn connection(&self) -> IndexerDbResult<&Connection> {
        match (self.phase, &self.conn) {
            (Phase::Ready, Some(conn)) => Ok(conn),
            (Phase::Committed, Some(_)) => Err(IndexerDbError::NoActiveTransaction),
            _ => Err(IndexerDbError::NotLoaded),
        }
    }

    /// Commit the current batch and open the next transaction.
    pub fn commit(&mut self) -> IndexerDbResult<()> {
        self.commit_within(self.config.busy_timeout())
    }

    /// Like [`commit`](Self::commit), but waits at most `timeout` for the lock
    /// needed to open the next transaction. The commit itself is not bounded.
    ///
    /// Only [`BeginMode::Immediate`](crate::config::BeginMode::Immediate) takes
    /// a lock when beginning. Under the default deferred mode the timeout has
    /// no effect here and lock waits surface on the first write instead.
    pub fn commit_within(&mut self, timeout: Duration) -> IndexerDbResult<()> {
        let conn = self.conn.as_ref().ok_or(IndexerDbError::NotLoaded)?;

        if self.phase == Phase::Ready {
            if let Err(err) = conn.execute_batch("COMMIT") {
                // The engine may have rolled the batch back on its own; then
                // there is nothing left to commit.
                if conn.is_autocommit() {
                    self.phase = Phase::Committed;
                }
                return Err(err.into());
            }
            self.phase = Phase::Committed;
            tracing::debug!("batch committed");
        }

        self.begin(timeout)
    }

    /// Discard the current batch and open a new transaction.
    pub fn rollback(&mut self) -> IndexerDbResult<()> {
        let conn = self.conn.as_ref().ok_or(IndexerDbError::NotLoaded)?;

        if self.phase == Phase::Ready {
            if !conn.is_autocommit() {
                conn.execute_batch("ROLLBACK")?;
            }
            self.phase = Phase::Committed;
            tracing::info!("batch rolled back");
        }

        self.begin(self.config.busy_timeout())
    }

    fn begin(&mut self, timeout: Duration) -> IndexerDbResult<()> {
        let conn = self.conn.as_ref().ok_or(IndexerDbError::NotLoaded)?;

        conn.busy_timeout(timeout)?;
        let begun = conn.execute_batch(self.config.begin_mode.as_sql());
        conn.busy_timeout(self.config.busy_timeout())?;
        begun?;

        self.phase = Phase::Ready;
        Ok(())
    }
}

fn open_connection(config: &DatabaseConfig) -> IndexerDbResult<Connection> {
    if config.is_in_memory() {
        return Ok(Connection::open_in_memory()?);
    }

    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_URI
        | OpenFlags::SQLITE_OPEN_NO_MUTEX;

    match Connection::open_with_flags(&config.path, flags) {
        Ok(conn) => Ok(conn),
        Err(err) if config.create_if_missing && is_cannot_open(&err) => {
            tracing::warn!(path = %config.path, "indexer database missing, creating it");
            if let Some(parent) = Path::new(&config.path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            Ok(Connection::open_with_flags(
                &config.path,
                flags | OpenFlags::SQLITE_OPEN_CREATE,
            )?)
        }
        Err(err) => Err(err.into()),
    }
}

fn is_cannot_open(err: &rusqlite::Error) -> bool {
    err.sqlite_error_code() == Some(ErrorCode::CannotOpen)
}

/// Configure a connection: lock waits, journal, durability and foreign keys.
fn configure_connection(conn: &Connection, config: &DatabaseConfig) -> IndexerDbResult<()> {
    conn.busy_timeout(config.busy_timeout())?;
    conn.execute_batch(&format!(
        "PRAGMA journal_mode={};
         PRAGMA synchronous={};",
        config.journal_mode.as_pragma(),
        config.synchronous.as_pragma(),
    ))?;
    schema::enable_foreign_keys(conn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BeginMode;

    fn count_addresses(conn: &Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM addresses", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_connection_before_load() {
        let uow = UnitOfWork::new(DatabaseConfig::in_memory());
        assert_eq!(uow.phase(), Phase::Uninitialized);
        assert!(matches!(uow.connection(), Err(IndexerDbError::NotLoaded)));
    }

    #[test]
    fn test_commit_before_load() {
        let mut uow = UnitOfWork::new(DatabaseConfig::in_memory());
        assert!(matches!(uow.commit(), Err(IndexerDbError::NotLoaded)));
        assert!(matches!(uow.rollback(), Err(IndexerDbError::NotLoaded)));
    }

    #[test]
    fn test_load_opens_transaction() {
        let mut uow = UnitOfWork::new(DatabaseConfig::in_memory());
        uow.load().unwrap();
        assert_eq!(uow.phase(), Phase::Ready);
        assert!(!uow.connection().unwrap().is_autocommit());

        // Loading again keeps the same transaction.
        uow.connection()
            .unwrap()
            .execute("INSERT INTO addresses (hash) VALUES (x'01')", [])
            .unwrap();
        uow.load().unwrap();
        assert_eq!(count_addresses(uow.connection().unwrap()), 1);
    }

    #[test]
    fn test_commit_reopens_and_is_repeatable() {
        let mut uow = UnitOfWork::new(DatabaseConfig::in_memory());
        uow.load().unwrap();
        uow.connection()
            .unwrap()
            .execute("INSERT INTO addresses (hash) VALUES (x'01')", [])
            .unwrap();

        uow.commit().unwrap();
        assert_eq!(uow.phase(), Phase::Ready);
        assert!(!uow.connection().unwrap().is_autocommit());

        uow.commit().unwrap();
        assert_eq!(count_addresses(uow.connection().unwrap()), 1);
    }

    #[test]
    fn test_rollback_discards_batch() {
        let mut uow = UnitOfWork::new(DatabaseConfig::in_memory());
        uow.load().unwrap();
        uow.connection()
            .unwrap()
            .execute("INSERT INTO addresses (hash) VALUES (x'01')", [])
            .unwrap();
        uow.commit().unwrap();
        uow.connection()
            .unwrap()
            .execute("INSERT INTO addresses (hash) VALUES (x'02')", [])
            .unwrap();

        uow.rollback().unwrap();
        assert_eq!(uow.phase(), Phase::Ready);
        assert_eq!(count_addresses(uow.connection().unwrap()), 1);
    }

    #[test]
    fn test_commit_within_restores_busy_timeout() {
        let mut uow = UnitOfWork::new(DatabaseConfig::in_memory());
        uow.load().unwrap();
        uow.commit_within(Duration::from_millis(10)).unwrap();

        let timeout: i64 = uow
            .connection()
            .unwrap()
            .query_row("PRAGMA busy_timeout", [], |row| row.get(0))
            .unwrap();
        assert_eq!(timeout, 5000);
    }

    #[test]
    fn test_commit_within_bounds_immediate_begin() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("indexer.sqlite");
        let mut config = DatabaseConfig::at_path(path.to_string_lossy().into_owned());
        config.busy_timeout_ms = 10;

        let mut deferred = UnitOfWork::new(config.clone());
        deferred.load().unwrap();
        deferred.commit().unwrap();

        let writer = Connection::open(&path).unwrap();
        writer.execute_batch("BEGIN IMMEDIATE").unwrap();

        // Deferred begins take no lock, so the held write lock is not seen.
        deferred.commit_within(Duration::from_millis(20)).unwrap();
        assert_eq!(deferred.phase(), Phase::Ready);

        config.begin_mode = BeginMode::Immediate;
        let mut immediate = UnitOfWork::new(config);
        assert!(immediate.load().unwrap_err().is_transient());
        assert_eq!(immediate.phase(), Phase::Committed);

        let err = immediate
            .commit_within(Duration::from_millis(20))
            .unwrap_err();
        assert!(err.is_transient(), "unexpected error: {err}");
        assert_eq!(immediate.phase(), Phase::Committed);

        writer.execute_batch("COMMIT").unwrap();
        immediate.commit_within(Duration::from_millis(20)).unwrap();
        assert_eq!(immediate.phase(), Phase::Ready);
    }

    #[test]
    fn test_missing_database_without_create_is_transient() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = DatabaseConfig::at_path(
            dir.path().join("absent.sqlite").to_string_lossy().into_owned(),
        );
        config.create_if_missing = false;

        let mut uow = UnitOfWork::new(config);
        let err = uow.load().unwrap_err();
        assert!(err.is_transient(), "unexpected error: {err}");
        assert_eq!(uow.phase(), Phase::Uninitialized);
    }

    #[test]
    fn test_missing_database_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("dirs").join("indexer.sqlite");
        let mut config = DatabaseConfig::at_path(path.to_string_lossy().into_owned());
        config.begin_mode = BeginMode::Immediate;

        let mut uow = UnitOfWork::new(config);
        uow.load().unwrap();
        assert!(path.exists());
        assert_eq!(count_addresses(uow.connection().unwrap()), 0);
    }

    #[test]
    fn test_committed_data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("indexer.sqlite");
        let config = DatabaseConfig::at_path(path.to_string_lossy().into_owned());

        {
            let mut uow = UnitOfWork::new(config.clone());
            uow.load().unwrap();
            uow.connection()
                .unwrap()
                .execute("INSERT INTO addresses (hash) VALUES (x'01')", [])
                .unwrap();
            uow.commit().unwrap();
            uow.connection()
                .unwrap()
                .execute("INSERT INTO addresses (hash) VALUES (x'02')", [])
                .unwrap();
            // dropped with the second batch uncommitted
        }

        let mut uow = UnitOfWork::new(config);
        uow.load().unwrap();
        assert_eq!(count_addresses(uow.connection().unwrap()), 1);
    }
}
