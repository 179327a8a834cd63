//! Configuration loading and validation.
//!
//! This module provides:
//! - Configuration types with serde support
//! - Layered loading: defaults, YAML file, environment
//! - Fail-fast validation that collects all errors

mod loader;
pub mod types;
mod validation;

use thiserror::Error;

pub use loader::{load_config, load_config_from_str, ENV_PREFIX};
pub use types::{
    BeginMode, DatabaseConfig, IndexerDbConfig, JournalMode, LoadConfig, LoggingConfig,
    Synchronous,
};
pub use validation::validate_config;

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The given config file does not exist.
    #[error("config file '{0}' not found")]
    FileNotFound(String),

    /// A source could not be read or deserialised.
    #[error("failed to load config from '{path}': {source}")]
    Parse {
        path: String,
        source: Box<figment::Error>,
    },

    /// Validation failed with one or more errors.
    #[error("config validation failed:\n{}", .0.join("\n"))]
    ValidationFailed(Vec<String>),
}
