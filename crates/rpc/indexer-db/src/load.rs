//! Startup loading with retries.
//!
//! A database that is locked by another process or sits on a volume that is
//! not mounted yet is retried; anything else fails the load immediately.

use std::time::Duration;

use backon::{BlockingRetryable, ExponentialBuilder};

use crate::config::{IndexerDbConfig, LoadConfig};
use crate::error::{IndexerDbError, IndexerDbResult};
use crate::repository::{Loader, SqliteRepository};

/// Call [`Loader::load`] until it succeeds, retrying transient failures.
///
/// The pause starts at `retry_interval` and doubles up to
/// `max_retry_interval`. Gives up after `max_attempts` when set, returning
/// the last error.
pub fn load_with_retry<L: Loader>(loader: &mut L, config: &LoadConfig) -> IndexerDbResult<()> {
    let mut retries: u32 = 0;
    let notify_retry = |err: &IndexerDbError, dur: Duration| {
        retries = retries.saturating_add(1);
        tracing::warn!(
            attempt = retries,
            error = %err,
            "failed to load indexer database. Retrying in {:.1}s",
            dur.as_secs_f32()
        );
    };

    let result = (|| loader.load())
        .retry(retry_policy(config))
        .sleep(std::thread::sleep)
        .when(IndexerDbError::is_transient)
        .notify(notify_retry)
        .call();

    match result {
        Ok(()) => {
            if retries > 0 {
                tracing::info!(retries, "indexer database loaded after retrying");
            }
            Ok(())
        }
        Err(err) => {
            tracing::error!(retries, error = %err, "failed to load indexer database");
            Err(err)
        }
    }
}

/// `max_attempts` counts the first call, the builder counts retries only.
fn retry_policy(config: &LoadConfig) -> ExponentialBuilder {
    let builder = ExponentialBuilder::default()
        .with_min_delay(config.retry_interval())
        .with_max_delay(config.max_retry_interval());
    match config.max_attempts {
        Some(max) => builder.with_max_times(max.saturating_sub(1) as usize),
        None => builder.without_max_times(),
    }
}

/// Build a repository from `config` and load it.
pub fn load_repository(config: &IndexerDbConfig) -> IndexerDbResult<SqliteRepository> {
    let mut repo = SqliteRepository::from_config(config);
    load_with_retry(&mut repo, &config.load)?;
    Ok(repo)
}
