//! Configuration types for the indexer database.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndexerDbConfig {
    /// Database file and connection settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Startup retry policy.
    #[serde(default)]
    pub load: LoadConfig,

    /// Log output.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Database file and connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file. `:memory:` opens a private in-memory
    /// database. Default: "./data/indexer.sqlite".
    #[serde(default = "DatabaseConfig::default_path")]
    pub path: String,

    /// Create the database (and its parent directories) when missing.
    #[serde(default = "DatabaseConfig::default_create_if_missing")]
    pub create_if_missing: bool,

    /// How long a statement waits on a locked database. Default: 5000ms.
    #[serde(default = "DatabaseConfig::default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    #[serde(default)]
    pub journal_mode: JournalMode,

    #[serde(default)]
    pub synchronous: Synchronous,

    /// Locking mode of the transactions opened by the unit of work.
    #[serde(default)]
    pub begin_mode: BeginMode,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: Self::default_path(),
            create_if_missing: Self::default_create_if_missing(),
            busy_timeout_ms: Self::default_busy_timeout_ms(),
            journal_mode: JournalMode::default(),
            synchronous: Synchronous::default(),
            begin_mode: BeginMode::default(),
        }
    }
}

impl DatabaseConfig {
    fn default_path() -> String {
        "./data/indexer.sqlite".to_string()
    }

    const fn default_create_if_missing() -> bool {
        true
    }

    const fn default_busy_timeout_ms() -> u64 {
        5000
    }

    /// Settings for a private in-memory database.
    pub fn in_memory() -> Self {
        Self {
            path: ":memory:".to_string(),
            journal_mode: JournalMode::Memory,
            ..Self::default()
        }
    }

    /// Settings for a database file at `path`.
    pub fn at_path(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn is_in_memory(&self) -> bool {
        self.path == ":memory:"
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

/// SQLite journal mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JournalMode {
    /// Readers on other connections see committed data while a batch is open.
    #[default]
    Wal,
    Delete,
    Memory,
}

impl JournalMode {
    pub(crate) fn as_pragma(self) -> &'static str {
        match self {
            Self::Wal => "WAL",
            Self::Delete => "DELETE",
            Self::Memory => "MEMORY",
        }
    }
}

/// SQLite `synchronous` setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Synchronous {
    Off,
    #[default]
    Normal,
    Full,
}

impl Synchronous {
    pub(crate) fn as_pragma(self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::Normal => "NORMAL",
            Self::Full => "FULL",
        }
    }
}

/// How the unit of work opens its transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BeginMode {
    /// Take the write lock on the first write.
    #[default]
    Deferred,
    /// Take the write lock when the transaction opens.
    Immediate,
}

impl BeginMode {
    pub(crate) fn as_sql(self) -> &'static str {
        match self {
            Self::Deferred => "BEGIN DEFERRED",
            Self::Immediate => "BEGIN IMMEDIATE",
        }
    }
}

/// Retry policy of [`crate::load_repository`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoadConfig {
    /// Pause before the first retry. Default: 1000ms.
    #[serde(default = "LoadConfig::default_retry_interval_ms")]
    pub retry_interval_ms: u64,

    /// The pause doubles after each failed attempt up to this ceiling.
    /// Default: 30000ms.
    #[serde(default = "LoadConfig::default_max_retry_interval_ms")]
    pub max_retry_interval_ms: u64,

    /// Give up after this many attempts. Unlimited when absent.
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            retry_interval_ms: Self::default_retry_interval_ms(),
            max_retry_interval_ms: Self::default_max_retry_interval_ms(),
            max_attempts: None,
        }
    }
}

impl LoadConfig {
    const fn default_retry_interval_ms() -> u64 {
        1000
    }

    const fn default_max_retry_interval_ms() -> u64 {
        30_000
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    pub fn max_retry_interval(&self) -> Duration {
        Duration::from_millis(self.max_retry_interval_ms)
    }
}

/// Log output configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset. Default: "info".
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}
