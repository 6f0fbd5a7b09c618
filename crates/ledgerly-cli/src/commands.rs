//! CLI command implementations

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;

use ledgerly_core::models::format_cents;
use ledgerly_core::{Database, Mailer, ModelClient, TransactionType};
use ledgerly_server::scheduler::{run_budget_alerts, run_monthly_reports, run_scan_once};

use crate::cli::JobsAction;

/// Open the database, running migrations if needed
pub fn open_db(db_path: &Path) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .context("Database path is not valid UTF-8")?;
    Database::new(path_str).context("Failed to open database")
}

pub fn cmd_init(db_path: &Path) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    open_db(db_path)?;

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Start the server: ledgerly serve");
    println!("  2. Create a user: curl -X POST localhost:3000/api/users \\");
    println!("       -H 'content-type: application/json' \\");
    println!("       -d '{{\"email\": \"you@example.com\", \"name\": \"You\"}}'");

    Ok(())
}

pub async fn cmd_serve(db_path: &Path, host: &str, port: u16, no_scheduler: bool) -> Result<()> {
    println!("🚀 Starting Ledgerly server...");
    println!("   Database: {}", db_path.display());
    println!("   Listening: http://{}:{}", host, port);
    if no_scheduler {
        println!("   Background jobs: disabled (--no-scheduler)");
    }

    let db = open_db(db_path)?;
    ledgerly_server::serve(db, host, port, !no_scheduler).await
}

pub fn cmd_accounts(db: &Database, user_id: i64) -> Result<()> {
    let accounts = db.list_accounts(user_id)?;

    if accounts.is_empty() {
        println!("No accounts for user {}.", user_id);
        return Ok(());
    }

    println!();
    println!("📁 Accounts");
    println!("   ─────────────────────────────────────────");

    for account in accounts {
        let default_marker = if account.is_default { " (default)" } else { "" };
        println!(
            "   {:>4} │ {:<20} │ {:>12} │ {}{}",
            account.id,
            account.name,
            format!("${}", format_cents(account.balance_cents)),
            account.account_type,
            default_marker
        );
    }

    Ok(())
}

pub fn cmd_transactions(db: &Database, user_id: i64, limit: i64) -> Result<()> {
    let transactions = db.list_transactions(user_id, limit)?;

    if transactions.is_empty() {
        println!("No transactions for user {}.", user_id);
        return Ok(());
    }

    println!();
    println!("📝 Recent Transactions");
    println!("   ─────────────────────────────────────────────────────────────");

    for tx in transactions {
        let amount_str = match tx.tx_type {
            TransactionType::Expense => {
                format!("\x1b[31m${}\x1b[0m", format_cents(tx.amount_cents)) // Red for expenses
            }
            TransactionType::Income => {
                format!("\x1b[32m+${}\x1b[0m", format_cents(tx.amount_cents)) // Green for income
            }
        };
        let recurring_marker = if tx.is_recurring { " ↻" } else { "" };

        println!(
            "   {} │ {:>12} │ {}{}",
            tx.date,
            amount_str,
            truncate(&tx.description, 40),
            recurring_marker
        );
    }

    Ok(())
}

pub async fn cmd_jobs(db: &Database, job: JobsAction) -> Result<()> {
    let now = Utc::now();

    match job {
        JobsAction::Scan => {
            println!("🔁 Scanning for due recurring transactions...");
            let stats = run_scan_once(db, now).await;
            println!(
                "   Processed: {}, skipped: {}, failed: {}",
                stats.processed, stats.skipped, stats.failed
            );
        }
        JobsAction::Alerts => {
            println!("📣 Evaluating budget alerts...");
            let mailer = Mailer::from_env();
            let stats = run_budget_alerts(db, &mailer, now).await;
            println!("   Checked: {}, alerts sent: {}", stats.checked, stats.sent);
        }
        JobsAction::Reports => {
            println!("📊 Generating prior-month reports...");
            let model = ModelClient::from_env();
            let mailer = Mailer::from_env();
            let stats = run_monthly_reports(db, model.as_ref(), &mailer, now).await;
            println!("   Sent: {}, failed: {}", stats.sent, stats.failed);
        }
    }

    Ok(())
}

/// Truncate a string for display, appending an ellipsis when cut
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}
