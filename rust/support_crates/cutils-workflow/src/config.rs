//! Thread pool configuration.

use std::time::Duration;

use cutils_common::{Result, verify_arg};
use serde::{Deserialize, Serialize};

/// How long an idle worker above `min_threads` waits for work before it exits.
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(60);

pub const DEFAULT_THREAD_NAME_PREFIX: &str = "cutils-worker";

/// Sizing and naming of a [`ThreadPool`](crate::thread_pool::ThreadPool).
///
/// Workers are started on demand. A pool never runs more than `max_threads`
/// workers (`None` means unbounded) and keeps at least `min_threads` of them
/// alive once started; the rest retire after `keep_alive` without work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub min_threads: usize,
    pub max_threads: Option<usize>,
    pub keep_alive: Duration,
    /// Worker threads are named `{prefix}-{index}`; an empty prefix leaves them unnamed.
    pub thread_name_prefix: String,
}

impl PoolConfig {
    /// Unbounded pool that grows with demand and reuses idle workers.
    pub fn cached() -> PoolConfig {
        PoolConfig {
            min_threads: 0,
            max_threads: None,
            keep_alive: DEFAULT_KEEP_ALIVE,
            thread_name_prefix: DEFAULT_THREAD_NAME_PREFIX.to_string(),
        }
    }

    /// Pool of exactly `num_threads` long-lived workers.
    pub fn fixed(num_threads: usize) -> PoolConfig {
        PoolConfig {
            min_threads: num_threads,
            max_threads: Some(num_threads),
            ..PoolConfig::cached()
        }
    }

    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> PoolConfig {
        self.thread_name_prefix = prefix.into();
        self
    }

    pub fn with_keep_alive(mut self, keep_alive: Duration) -> PoolConfig {
        self.keep_alive = keep_alive;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(max_threads) = self.max_threads {
            verify_arg!(max_threads, max_threads > 0);
            verify_arg!(min_threads, self.min_threads <= max_threads);
        }
        verify_arg!(keep_alive, !self.keep_alive.is_zero());
        Ok(())
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig::cached()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cutils_common::error::ErrorKind;

    #[test]
    fn test_presets_are_valid() {
        assert!(PoolConfig::cached().validate().is_ok());
        assert!(PoolConfig::fixed(4).validate().is_ok());
        assert_eq!(PoolConfig::default(), PoolConfig::cached());
    }

    #[test]
    fn test_zero_fixed_pool_is_rejected() {
        let err = PoolConfig::fixed(0).validate().unwrap_err();
        assert!(matches!(
            err.kind(),
            ErrorKind::InvalidArgument { name, .. } if name == "max_threads"
        ));
    }

    #[test]
    fn test_min_above_max_is_rejected() {
        let config = PoolConfig {
            min_threads: 8,
            max_threads: Some(2),
            ..PoolConfig::cached()
        };
        assert!(matches!(
            config.validate().unwrap_err().kind(),
            ErrorKind::InvalidArgument { name, .. } if name == "min_threads"
        ));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: PoolConfig =
            serde_json::from_str(r#"{ "max_threads": 3, "thread_name_prefix": "batch" }"#)
                .unwrap();
        assert_eq!(config.max_threads, Some(3));
        assert_eq!(config.min_threads, 0);
        assert_eq!(config.keep_alive, DEFAULT_KEEP_ALIVE);
        assert_eq!(config.thread_name_prefix, "batch");
    }
}
