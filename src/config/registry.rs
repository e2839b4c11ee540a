//! Registry API, retry and pruning configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ConfigError;

/// Quay API connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// API base URL (e.g., "https://quay.io/api/v1")
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Tags requested per listing page
    #[serde(default = "default_page_limit")]
    pub page_limit: u32,

    /// Whole-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Connect timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_api_url() -> String {
    "https://quay.io/api/v1".to_string()
}

fn default_page_limit() -> u32 {
    100
}

fn default_request_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            page_limit: default_page_limit(),
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

/// Bounded retry on transient gateway errors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per request, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Fixed delay between attempts (humantime, e.g. "2s", "500ms")
    #[serde(default = "default_backoff")]
    pub backoff: String,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_backoff() -> String {
    "2s".to_string()
}

impl RetryConfig {
    pub fn backoff_duration(&self) -> Result<Duration, ConfigError> {
        humantime::parse_duration(&self.backoff).map_err(|e| ConfigError::InvalidValue {
            field: "retry.backoff".to_string(),
            value: format!("{} ({})", self.backoff, e),
        })
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff: default_backoff(),
        }
    }
}

/// Tag pruning settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PruneConfig {
    /// Concurrent manifest existence checks per repository
    #[serde(default = "default_verify_concurrency")]
    pub verify_concurrency: usize,

    /// Stop paging a repository's tags once a tag older than the time window
    /// shows up. Only valid if the registry lists tags newest first.
    #[serde(default)]
    pub assume_newest_first: bool,
}

fn default_verify_concurrency() -> usize {
    4
}

impl Default for PruneConfig {
    fn default() -> Self {
        Self {
            verify_concurrency: default_verify_concurrency(),
            assume_newest_first: false,
        }
    }
}
