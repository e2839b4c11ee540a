//! Centralized error types for registry-janitor
//!
//! Uses thiserror for typed errors that can be matched on,
//! while still being compatible with anyhow for propagation.

use thiserror::Error;

/// Quay API errors
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Gateway or connection failure that outlived the retry policy
    #[error("Transient registry failure after {attempts} attempts: {message}")]
    Transient { attempts: u32, message: String },

    #[error("Registry rejected the credentials (HTTP {status}). Check QUAY_TOKEN")]
    Unauthorized { status: u16 },

    #[error("Unexpected response HTTP {status} from {url}: {body}")]
    UnexpectedResponse {
        status: u16,
        url: String,
        body: String,
    },

    #[error("Failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },
}

impl RegistryError {
    /// Authorization failures are never repository-specific.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("The token required for access to the Quay API is missing. Set QUAY_TOKEN or pass --token")]
    MissingToken,

    #[error("Invalid configuration value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Config file not found: {path}")]
    FileNotFound { path: String },

    #[error("Failed to parse config: {message}")]
    ParseError { message: String },
}
