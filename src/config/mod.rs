//! # Janitor Configuration
//!
//! Optional YAML file plus environment overrides.
//!
//! ## Configuration File
//!
//! Passed with `--config FILE`. Every field has a default, so an empty file
//! (or no file) is valid:
//!
//! ```yaml
//! registry:
//!   api_url: https://quay.io/api/v1
//!   page_limit: 100
//! retry:
//!   max_attempts: 5
//!   backoff: 2s
//! prune:
//!   verify_concurrency: 4
//!   assume_newest_first: false
//! ```
//!
//! ## Environment
//!
//! - `QUAY_TOKEN` - API token (required, also accepted as `--token`)
//! - `QUAY_API_URL` - overrides `registry.api_url`

mod registry;

pub use registry::{PruneConfig, RegistryConfig, RetryConfig};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;

/// Complete janitor configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct JanitorConfig {
    /// Registry API configuration
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Transport retry configuration
    #[serde(default)]
    pub retry: RetryConfig,

    /// Tag pruning configuration
    #[serde(default)]
    pub prune: PruneConfig,
}

impl JanitorConfig {
    /// Load configuration from an optional file, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        if let Ok(url) = std::env::var("QUAY_API_URL") {
            if !url.is_empty() {
                config.registry.api_url = url;
            }
        }

        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.display().to_string(),
            }
            .into());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.registry.page_limit == 0 {
            return Err(invalid("registry.page_limit", "0"));
        }
        if self.retry.max_attempts == 0 {
            return Err(invalid("retry.max_attempts", "0"));
        }
        if self.prune.verify_concurrency == 0 {
            return Err(invalid("prune.verify_concurrency", "0"));
        }
        reqwest::Url::parse(&self.registry.api_url)
            .map_err(|_| invalid("registry.api_url", &self.registry.api_url))?;
        self.retry.backoff_duration()?;
        Ok(())
    }
}

fn invalid(field: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    }
}

/// Resolve the API token from the command line or `QUAY_TOKEN`
pub fn resolve_token(token: Option<String>) -> Result<String, ConfigError> {
    token
        .or_else(|| std::env::var("QUAY_TOKEN").ok())
        .filter(|t| !t.trim().is_empty())
        .ok_or(ConfigError::MissingToken)
}
