//! Command implementations

pub mod notifications;
pub mod prune;

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::debug;

use crate::config::{resolve_token, JanitorConfig};
use crate::infrastructure::{QuayClient, RetryPolicy};

/// Options shared by every subcommand
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    pub config: Option<PathBuf>,
    pub token: Option<String>,
}

/// Load configuration and build an authenticated registry client
fn connect(global: GlobalOptions) -> Result<(JanitorConfig, QuayClient)> {
    let config = JanitorConfig::load(global.config.as_deref())?;
    let token = resolve_token(global.token)?;
    let retry = RetryPolicy::from_config(&config.retry)?;
    let max_attempts = retry.max_attempts();
    let client = QuayClient::new(&config.registry, retry, token)
        .context("Failed to create registry client")?;
    debug!(api_url = %client.base_url(), max_attempts, "Registry client ready");
    Ok((config, client))
}
