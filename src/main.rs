use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;
mod config;
mod domain;
mod error;
mod infrastructure;
mod services;
mod shutdown;
mod ui;

use cli::{Cli, Commands};
use commands::{notifications, prune, GlobalOptions};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // LOGGING=debug,info,warn,error or just LOGGING=debug
    let log_level = std::env::var("LOGGING")
        .or_else(|_| std::env::var("LOG_LEVEL"))
        .unwrap_or_else(|_| {
            if cli.verbose {
                "debug".to_string()
            } else {
                "info".to_string()
            }
        });

    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_ansi(false)
        .init();

    let global = GlobalOptions {
        config: cli.config,
        token: cli.token,
    };

    match cli.command {
        Commands::PruneTags {
            namespace,
            dry_run,
            days,
        } => {
            prune::execute(global, namespace, dry_run, days).await?;
        }
        Commands::ResetNotifications { namespace, dry_run } => {
            notifications::execute(global, namespace, dry_run).await?;
        }
    }

    Ok(())
}
