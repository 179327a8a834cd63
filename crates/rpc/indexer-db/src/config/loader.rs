//! Configuration loading.
//!
//! Sources, lowest priority first:
//!
//! | source | notes |
//! |---|---|
//! | built-in defaults | [`IndexerDbConfig::default`] |
//! | YAML file | optional |
//! | `INDEXER_DB_*` env vars | `__` separates nesting, e.g. `INDEXER_DB_DATABASE__PATH` |

use std::path::Path;

use figment::providers::{Env, Format as _, Serialized, Yaml};
use figment::Figment;

use crate::config::types::IndexerDbConfig;
use crate::config::validation::validate_config;
use crate::config::ConfigError;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "INDEXER_DB_";

/// Load and validate configuration from an optional YAML file and the environment.
///
/// A missing file is only an error when `path` is given and does not exist.
pub fn load_config(path: Option<&Path>) -> Result<IndexerDbConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(IndexerDbConfig::default()));
    let source = match path {
        Some(path) => {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.display().to_string()));
            }
            figment = figment.merge(Yaml::file(path));
            path.display().to_string()
        }
        None => "environment".to_string(),
    };
    extract(figment.merge(Env::prefixed(ENV_PREFIX).split("__")), &source)
}

/// Load and validate configuration from a YAML string, without consulting the
/// environment.
pub fn load_config_from_str(
    content: &str,
    source_name: &str,
) -> Result<IndexerDbConfig, ConfigError> {
    let figment =
        Figment::from(Serialized::defaults(IndexerDbConfig::default())).merge(Yaml::string(content));
    extract(figment, source_name)
}

fn extract(figment: Figment, source_name: &str) -> Result<IndexerDbConfig, ConfigError> {
    let config: IndexerDbConfig = figment.extract().map_err(|e| ConfigError::Parse {
        path: source_name.to_string(),
        source: Box::new(e),
    })?;

    validate_config(&config)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::{BeginMode, JournalMode, Synchronous};

    const VALID_CONFIG: &str = r#"
database:
  path: "/var/lib/indexer/db.sqlite"
  create_if_missing: false
  busy_timeout_ms: 250
  journal_mode: delete
  synchronous: full
  begin_mode: immediate

load:
  retry_interval_ms: 10
  max_retry_interval_ms: 80
  max_attempts: 3

logging:
  level: debug
"#;

    #[test]
    fn test_load_valid_config() {
        let config = load_config_from_str(VALID_CONFIG, "config.yaml").unwrap();
        assert_eq!(config.database.path, "/var/lib/indexer/db.sqlite");
        assert!(!config.database.create_if_missing);
        assert_eq!(config.database.busy_timeout_ms, 250);
        assert_eq!(config.database.journal_mode, JournalMode::Delete);
        assert_eq!(config.database.synchronous, Synchronous::Full);
        assert_eq!(config.database.begin_mode, BeginMode::Immediate);
        assert_eq!(config.load.max_retry_interval_ms, 80);
        assert_eq!(config.load.max_attempts, Some(3));
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_defaults_fill_missing_sections() {
        let config = load_config_from_str("database:\n  path: db.sqlite\n", "inline").unwrap();
        assert_eq!(config.database.path, "db.sqlite");
        assert!(config.database.create_if_missing);
        assert_eq!(config.database.busy_timeout_ms, 5000);
        assert_eq!(config.database.journal_mode, JournalMode::Wal);
        assert_eq!(config.load.retry_interval_ms, 1000);
        assert_eq!(config.load.max_retry_interval_ms, 30_000);
        assert_eq!(config.load.max_attempts, None);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result = load_config_from_str("database:\n  pth: typo.sqlite\n", "inline");
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_invalid_enum_rejected() {
        let result = load_config_from_str("database:\n  journal_mode: truncate\n", "inline");
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_validation_runs_after_parse() {
        let result = load_config_from_str("database:\n  path: \"\"\n", "inline");
        assert!(matches!(result, Err(ConfigError::ValidationFailed(_))));
    }

    #[test]
    fn test_missing_file_reported() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_config(Some(&dir.path().join("absent.yaml")));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("indexer.yaml");
        std::fs::write(&path, VALID_CONFIG).unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.load.retry_interval_ms, 10);
    }
}
