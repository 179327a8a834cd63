//! Configuration validation.
//!
//! Collects every problem before returning so they can be fixed in one pass.

use tracing_subscriber::EnvFilter;

use crate::config::types::{DatabaseConfig, IndexerDbConfig, LoadConfig, LoggingConfig};
use crate::config::ConfigError;

/// Maximum busy timeout: 10 minutes.
const MAX_BUSY_TIMEOUT_MS: u64 = 10 * 60 * 1000;

/// Maximum pause between load attempts: 5 minutes.
const MAX_RETRY_INTERVAL_MS: u64 = 5 * 60 * 1000;

/// Validate the entire configuration.
pub fn validate_config(config: &IndexerDbConfig) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    validate_database_config(&config.database, &mut errors);
    validate_load_config(&config.load, &mut errors);
    validate_logging_config(&config.logging, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationFailed(errors))
    }
}

fn validate_database_config(config: &DatabaseConfig, errors: &mut Vec<String>) {
    if config.path.trim().is_empty() {
        errors.push("database.path cannot be empty".to_string());
    }

    if config.busy_timeout_ms > MAX_BUSY_TIMEOUT_MS {
        errors.push(format!(
            "database.busy_timeout_ms must be at most {MAX_BUSY_TIMEOUT_MS}"
        ));
    }
}

fn validate_load_config(config: &LoadConfig, errors: &mut Vec<String>) {
    if config.retry_interval_ms == 0 {
        errors.push("load.retry_interval_ms must be greater than 0".to_string());
    }

    if config.retry_interval_ms > MAX_RETRY_INTERVAL_MS {
        errors.push(format!(
            "load.retry_interval_ms must be at most {MAX_RETRY_INTERVAL_MS}"
        ));
    }

    if config.max_retry_interval_ms > MAX_RETRY_INTERVAL_MS {
        errors.push(format!(
            "load.max_retry_interval_ms must be at most {MAX_RETRY_INTERVAL_MS}"
        ));
    }

    if config.max_retry_interval_ms < config.retry_interval_ms {
        errors.push(
            "load.max_retry_interval_ms must not be below load.retry_interval_ms".to_string(),
        );
    }

    if config.max_attempts == Some(0) {
        errors.push("load.max_attempts must be greater than 0 when set".to_string());
    }
}

fn validate_logging_config(config: &LoggingConfig, errors: &mut Vec<String>) {
    if let Err(e) = EnvFilter::try_new(&config.level) {
        errors.push(format!(
            "logging.level '{}' is not a valid filter: {e}",
            config.level
        ));
    }
}
