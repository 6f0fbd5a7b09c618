//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI
//! arguments. The actual command implementations are in the `commands`
//! module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Ledgerly - Personal finance tracker
#[derive(Parser)]
#[command(name = "ledgerly")]
#[command(about = "Self-hosted personal finance tracker", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "ledgerly.db", global = true)]
    pub db: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Start the web server and background jobs
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Do not start the background job scheduler
        ///
        /// Use this when several server instances share one database and
        /// another instance already runs the jobs.
        #[arg(long)]
        no_scheduler: bool,
    },

    /// List a user's accounts
    Accounts {
        /// User id
        #[arg(short, long)]
        user: i64,
    },

    /// List a user's transactions
    Transactions {
        /// User id
        #[arg(short, long)]
        user: i64,

        /// Maximum number of transactions to show
        #[arg(short, long, default_value = "20")]
        limit: i64,
    },

    /// Run a background job once and exit
    Jobs {
        #[command(subcommand)]
        job: JobsAction,
    },
}

#[derive(Subcommand)]
pub enum JobsAction {
    /// Scan and process due recurring transactions
    Scan,
    /// Evaluate budget alerts
    Alerts,
    /// Generate prior-month reports
    Reports,
}
