//! Bounded retry for transient registry failures
//!
//! Only [`RegistryError::Transient`] is retried. Everything else (including
//! not-found and authorization failures) is returned on the first attempt.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::config::RetryConfig;
use crate::error::{ConfigError, RegistryError};

/// Fixed-backoff retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Duration,
}

impl RetryPolicy {
    /// `max_attempts` counts the first attempt; it is clamped to at least 1.
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(config.max_attempts, config.backoff_duration()?))
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run `call` until it succeeds, fails permanently, or the attempts run out
    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, RegistryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RegistryError>>,
    {
        let mut attempts = 0;

        loop {
            attempts += 1;

            match call().await {
                Err(RegistryError::Transient { message, .. }) if attempts < self.max_attempts => {
                    warn!(
                        operation = %operation,
                        attempt = attempts,
                        max_attempts = self.max_attempts,
                        error = %message,
                        "Transient registry failure, retrying..."
                    );
                    tokio::time::sleep(self.backoff).await;
                }
                Err(RegistryError::Transient { message, .. }) => {
                    return Err(RegistryError::Transient { attempts, message });
                }
                other => return other,
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(2))
    }
}
