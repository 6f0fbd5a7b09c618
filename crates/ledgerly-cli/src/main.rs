//! Ledgerly CLI - Personal finance tracker
//!
//! Usage:
//!   ledgerly init                  Initialize database
//!   ledgerly serve --port 3000     Start web server and background jobs
//!   ledgerly accounts --user 1     List a user's accounts
//!   ledgerly jobs scan             Run a background job once

mod cli;
mod commands;

#[cfg(test)]
mod tests;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db),
        Commands::Serve {
            port,
            host,
            no_scheduler,
        } => commands::cmd_serve(&cli.db, &host, port, no_scheduler).await,
        Commands::Accounts { user } => {
            let db = commands::open_db(&cli.db)?;
            commands::cmd_accounts(&db, user)
        }
        Commands::Transactions { user, limit } => {
            let db = commands::open_db(&cli.db)?;
            commands::cmd_transactions(&db, user, limit)
        }
        Commands::Jobs { job } => {
            let db = commands::open_db(&cli.db)?;
            commands::cmd_jobs(&db, job).await
        }
    }
}
