//! Queue configuration.
//!
//! Defaults suit a single process talking to a nearby store. Every value can
//! be overridden through `QueueBuilder` setters or, for deployments, through
//! `LEASEQ_*` environment variables.

use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::domain::QueueError;

pub const ENV_POLL_INTERVAL_MS: &str = "LEASEQ_POLL_INTERVAL_MS";
pub const ENV_PROCESSING_TIMEOUT_MS: &str = "LEASEQ_PROCESSING_TIMEOUT_MS";
pub const ENV_MAX_CONCURRENCY: &str = "LEASEQ_MAX_CONCURRENCY";
pub const ENV_COLLECTION: &str = "LEASEQ_COLLECTION";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Delay between timer-driven poll cycles.
    pub poll_interval_ms: u64,
    /// Visibility timeout: how long a claimed item stays hidden.
    pub processing_timeout_ms: u64,
    /// Upper bound on poll cycles in flight at once.
    pub max_concurrency: usize,
    pub collection_name: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1_000,
            processing_timeout_ms: 30_000,
            max_concurrency: 5,
            collection_name: "queue".to_string(),
        }
    }
}

impl QueueConfig {
    /// Defaults overridden by whichever `LEASEQ_*` variables are set.
    pub fn from_env() -> Result<Self, QueueError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, QueueError> {
        let mut config = Self::default();
        if let Some(value) = lookup(ENV_POLL_INTERVAL_MS) {
            config.poll_interval_ms = parse_var(ENV_POLL_INTERVAL_MS, &value)?;
        }
        if let Some(value) = lookup(ENV_PROCESSING_TIMEOUT_MS) {
            config.processing_timeout_ms = parse_var(ENV_PROCESSING_TIMEOUT_MS, &value)?;
        }
        if let Some(value) = lookup(ENV_MAX_CONCURRENCY) {
            config.max_concurrency = parse_var(ENV_MAX_CONCURRENCY, &value)?;
        }
        if let Some(value) = lookup(ENV_COLLECTION) {
            if value.trim().is_empty() {
                return Err(QueueError::Config(format!("{ENV_COLLECTION} must not be empty")));
            }
            config.collection_name = value;
        }
        Ok(config)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn processing_timeout(&self) -> chrono::Duration {
        // saturates
        chrono::Duration::milliseconds(i64::try_from(self.processing_timeout_ms).unwrap_or(i64::MAX))
    }
}

fn parse_var<T: FromStr>(name: &str, value: &str) -> Result<T, QueueError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| QueueError::Config(format!("{name}={value:?}: {e}")))
}
