//! Background job scheduler
//!
//! Runs the periodic jobs as independent tokio tasks:
//!
//! - due-transaction scanner (daily) feeding the recurrence processor over
//!   an in-process channel
//! - recurrence processor consuming work items behind a per-user rate limit
//! - budget alert evaluator (every 6 hours)
//! - monthly report generator (daily tick, acts on the first of the month)
//!
//! Jobs share no state beyond the scanner channel; cross-run coordination
//! happens through the cursor columns on templates, budgets, and users, so
//! every loop is safe to run immediately at startup and safe to miss a
//! cycle.
//!
//! Set `LEDGERLY_SCHEDULER=0` to disable job startup (e.g. when multiple
//! server instances share one database and only one should run jobs).

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{error, info, warn};

use ledgerly_core::summary::{self, FALLBACK_INSIGHTS};
use ledgerly_core::{Database, Mailer, ModelBackend, ModelClient, RecurrenceOutcome, WorkItem};

/// Scanner channel capacity. Deferred items are re-queued on the same
/// channel, so this also bounds the deferral backlog.
const WORK_QUEUE_CAPACITY: usize = 256;

/// Per-user activation cap within the rate limiter window
const RATE_LIMIT_CAPACITY: usize = 10;

/// Delay before a rate-limited item is re-queued
const DEFER_DELAY: Duration = Duration::from_secs(10);

/// Base delay for processor retries; doubles per attempt
const RETRY_BASE_DELAY: Duration = Duration::from_millis(200);

/// Maximum processor attempts per work item
const RETRY_ATTEMPTS: u32 = 2;

/// Whether background jobs should start in this process.
///
/// Defaults to enabled; `LEDGERLY_SCHEDULER=0` (or "false"/"off") disables.
pub fn scheduler_enabled() -> bool {
    match std::env::var("LEDGERLY_SCHEDULER") {
        Ok(v) => !matches!(v.to_lowercase().as_str(), "0" | "false" | "off"),
        Err(_) => true,
    }
}

/// Start all background jobs.
pub fn start_scheduler(db: Database, model: Option<ModelClient>, mailer: Mailer) {
    info!("Starting background scheduler");

    let (work_tx, work_rx) = mpsc::channel::<WorkItem>(WORK_QUEUE_CAPACITY);

    // Scanner: daily tick. The interval's immediate first tick drains any
    // templates that came due while the server was down.
    {
        let db = db.clone();
        let work_tx = work_tx.clone();
        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(24 * 3600));
            loop {
                ticker.tick().await;
                let today = Utc::now().date_naive();
                match scan_due_templates(&db, today, &work_tx).await {
                    Ok(count) if count > 0 => {
                        info!(count, "Queued due recurring transactions");
                    }
                    Ok(_) => {}
                    Err(e) => error!(error = %e, "Recurring-transaction scan failed"),
                }
            }
        });
    }

    // Processor: consumes the channel for the life of the server.
    {
        let db = db.clone();
        tokio::spawn(run_processor(db, work_rx, work_tx));
    }

    // Budget alerts: every 6 hours. The dedup cursor makes the immediate
    // first run safe.
    {
        let db = db.clone();
        let mailer = mailer.clone();
        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(6 * 3600));
            loop {
                ticker.tick().await;
                let stats = run_budget_alerts(&db, &mailer, Utc::now()).await;
                if stats.sent > 0 {
                    info!(checked = stats.checked, sent = stats.sent, "Budget alerts dispatched");
                }
            }
        });
    }

    // Monthly reports: daily tick, acts only on the first of the month.
    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(24 * 3600));
        loop {
            ticker.tick().await;
            let now = Utc::now();
            if now.day() != 1 {
                continue;
            }
            let stats = run_monthly_reports(&db, model.as_ref(), &mailer, now).await;
            info!(sent = stats.sent, failed = stats.failed, "Monthly reports dispatched");
        }
    });
}

/// Scan for due templates and emit one work item per row.
///
/// Read-only; at-least-once emission is fine because the processor
/// re-validates due-ness before acting.
pub async fn scan_due_templates(
    db: &Database,
    today: NaiveDate,
    work_tx: &mpsc::Sender<WorkItem>,
) -> ledgerly_core::Result<usize> {
    let items = db.due_templates(today)?;
    let count = items.len();
    for item in items {
        if work_tx.send(item).await.is_err() {
            warn!("Processor channel closed, dropping remaining scan results");
            break;
        }
    }
    Ok(count)
}

/// Processor loop: rate-limit per user, process with retry, defer overflow.
async fn run_processor(
    db: Database,
    mut work_rx: mpsc::Receiver<WorkItem>,
    work_tx: mpsc::Sender<WorkItem>,
) {
    let mut limiter = RateLimiter::new(RATE_LIMIT_CAPACITY, chrono::Duration::minutes(1));

    while let Some(item) = work_rx.recv().await {
        if !limiter.try_acquire(item.user_id, Utc::now()) {
            // Over the per-user cap: defer, never drop.
            let work_tx = work_tx.clone();
            tokio::spawn(async move {
                tokio::time::sleep(DEFER_DELAY).await;
                let _ = work_tx.send(item).await;
            });
            continue;
        }

        match process_work_item(&db, item, Utc::now()).await {
            Ok(RecurrenceOutcome::Processed { occurrence_id }) => {
                info!(
                    transaction_id = item.transaction_id,
                    occurrence_id, "Materialized recurring transaction"
                );
            }
            Ok(RecurrenceOutcome::NotDue) => {
                // Another run already advanced the cursor; expected under
                // at-least-once emission.
            }
            Ok(RecurrenceOutcome::NotFound) => {
                warn!(
                    transaction_id = item.transaction_id,
                    "Work item no longer matches a recurring template"
                );
            }
            Err(e) => {
                error!(
                    transaction_id = item.transaction_id,
                    error = %e,
                    "Failed to process recurring transaction"
                );
            }
        }
    }
}

/// Process one work item, retrying transient failures.
///
/// The database operation is all-or-nothing, so a retry after a rollback
/// starts from a clean slate.
pub async fn process_work_item(
    db: &Database,
    item: WorkItem,
    now: DateTime<Utc>,
) -> ledgerly_core::Result<RecurrenceOutcome> {
    let db = db.clone();
    with_retry(RETRY_BASE_DELAY, RETRY_ATTEMPTS, move || {
        let db = db.clone();
        async move { db.process_recurring_transaction(item.transaction_id, item.user_id, now) }
    })
    .await
}

/// Run one scan-and-process pass synchronously (operator trigger, CLI).
pub async fn run_scan_once(db: &Database, now: DateTime<Utc>) -> ScanStats {
    let mut stats = ScanStats::default();

    let items = match db.due_templates(now.date_naive()) {
        Ok(items) => items,
        Err(e) => {
            error!(error = %e, "Recurring-transaction scan failed");
            return stats;
        }
    };

    for item in items {
        match process_work_item(db, item, now).await {
            Ok(RecurrenceOutcome::Processed { .. }) => stats.processed += 1,
            Ok(_) => stats.skipped += 1,
            Err(e) => {
                error!(
                    transaction_id = item.transaction_id,
                    error = %e,
                    "Failed to process recurring transaction"
                );
                stats.failed += 1;
            }
        }
    }

    stats
}

#[derive(Debug, Default, Clone, Copy, serde::Serialize)]
pub struct ScanStats {
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Debug, Default, Clone, Copy, serde::Serialize)]
pub struct AlertStats {
    pub checked: usize,
    pub sent: usize,
}

/// Evaluate every budget against its user's default account.
///
/// Alerts fire at 80% usage, at most once per calendar month per budget.
/// Per-budget failures are logged and do not stop the run.
pub async fn run_budget_alerts(db: &Database, mailer: &Mailer, now: DateTime<Utc>) -> AlertStats {
    let mut stats = AlertStats::default();

    let budgets = match db.list_budgets() {
        Ok(budgets) => budgets,
        Err(e) => {
            error!(error = %e, "Failed to list budgets");
            return stats;
        }
    };

    for budget in budgets {
        stats.checked += 1;
        match check_budget_alert(db, mailer, &budget, now).await {
            Ok(true) => stats.sent += 1,
            Ok(false) => {}
            Err(e) => {
                error!(budget_id = budget.id, error = %e, "Budget alert check failed");
            }
        }
    }

    stats
}

async fn check_budget_alert(
    db: &Database,
    mailer: &Mailer,
    budget: &ledgerly_core::Budget,
    now: DateTime<Utc>,
) -> ledgerly_core::Result<bool> {
    if budget.amount_cents <= 0 {
        return Ok(false);
    }

    // Only the default account counts toward the budget
    let Some(account) = db.get_default_account(budget.user_id)? else {
        return Ok(false);
    };

    let today = now.date_naive();
    let (start, end) = summary::month_bounds(today);
    let spent = db.sum_account_expenses(account.id, start, end)?;
    let percentage_used = spent as f64 / budget.amount_cents as f64 * 100.0;

    if percentage_used < 80.0 {
        return Ok(false);
    }

    // One alert per calendar month
    if let Some(last) = budget.last_alert_sent {
        if !summary::is_new_month(last.date_naive(), today) {
            return Ok(false);
        }
    }

    let user = db
        .get_user(budget.user_id)?
        .ok_or_else(|| ledgerly_core::Error::NotFound(format!("User {}", budget.user_id)))?;

    let subject = format!("Budget Alert for {}", account.name);
    let body = summary::render_budget_alert(
        &user.name,
        &account.name,
        percentage_used,
        budget.amount_cents,
        spent,
    );

    let outcome = mailer.send(&user.email, &subject, &body).await;
    if !outcome.success {
        warn!(
            budget_id = budget.id,
            error = outcome.error.as_deref().unwrap_or("unknown"),
            "Budget alert email failed; will retry next evaluation"
        );
        return Ok(false);
    }

    db.mark_budget_alert_sent(budget.id, now)?;
    info!(
        budget_id = budget.id,
        user = %user.email,
        percentage_used = format!("{:.1}", percentage_used),
        "Budget alert sent"
    );
    Ok(true)
}

#[derive(Debug, Default, Clone, Copy, serde::Serialize)]
pub struct ReportStats {
    pub sent: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Generate and dispatch the prior-month report for every user.
///
/// The scheduled loop calls this only on the first of the month; operator
/// triggers may call it any day. Each user receives at most one report per
/// calendar month, deduplicated through the user's report cursor, so a
/// restart or repeated trigger does not re-send. Model failures degrade to
/// the fixed fallback insights; per-user failures are isolated.
pub async fn run_monthly_reports(
    db: &Database,
    model: Option<&ModelClient>,
    mailer: &Mailer,
    now: DateTime<Utc>,
) -> ReportStats {
    let mut stats = ReportStats::default();

    let users = match db.list_users() {
        Ok(users) => users,
        Err(e) => {
            error!(error = %e, "Failed to list users");
            return stats;
        }
    };

    for user in users {
        match send_monthly_report(db, model, mailer, &user, now).await {
            Ok(true) => stats.sent += 1,
            Ok(false) => stats.skipped += 1,
            Err(e) => {
                error!(user_id = user.id, error = %e, "Monthly report failed");
                stats.failed += 1;
            }
        }
    }

    stats
}

async fn send_monthly_report(
    db: &Database,
    model: Option<&ModelClient>,
    mailer: &Mailer,
    user: &ledgerly_core::User,
    now: DateTime<Utc>,
) -> ledgerly_core::Result<bool> {
    // One report per calendar month
    if let Some(last) = user.last_report_sent {
        if !summary::is_new_month(last.date_naive(), now.date_naive()) {
            return Ok(false);
        }
    }

    let (start, end) = summary::prior_month_bounds(now.date_naive());
    let month_label = summary::month_label(start);
    let monthly = db.monthly_summary(user.id, start, end)?;

    let insights = match model {
        Some(client) => match client.monthly_insights(&monthly, &month_label).await {
            Ok(insights) => insights,
            Err(e) => {
                warn!(user_id = user.id, error = %e, "Insight generation failed, using fallbacks");
                fallback_insights()
            }
        },
        None => fallback_insights(),
    };

    let subject = format!("Your Monthly Financial Report - {}", month_label);
    let body = summary::render_monthly_report(&user.name, &month_label, &monthly, &insights);

    let outcome = mailer.send(&user.email, &subject, &body).await;
    if !outcome.success {
        return Err(ledgerly_core::Error::ExternalService(
            outcome.error.unwrap_or_else(|| "email send failed".to_string()),
        ));
    }

    // Cursor advances only after a successful send, so a failed user is
    // retried on the next run
    db.mark_report_sent(user.id, now)?;
    Ok(true)
}

fn fallback_insights() -> Vec<String> {
    FALLBACK_INSIGHTS.iter().map(|s| s.to_string()).collect()
}

/// Sliding-window rate limiter keyed by user id.
///
/// Tracks activation timestamps per user and admits a new activation only
/// while fewer than `capacity` fall within the window.
pub struct RateLimiter {
    capacity: usize,
    window: chrono::Duration,
    activations: HashMap<i64, Vec<DateTime<Utc>>>,
}

impl RateLimiter {
    pub fn new(capacity: usize, window: chrono::Duration) -> Self {
        Self {
            capacity,
            window,
            activations: HashMap::new(),
        }
    }

    /// Record an activation for `user_id` if under the cap. Returns false
    /// when the caller should defer.
    pub fn try_acquire(&mut self, user_id: i64, now: DateTime<Utc>) -> bool {
        let slots = self.activations.entry(user_id).or_default();
        slots.retain(|t| now.signed_duration_since(*t) < self.window);

        if slots.len() < self.capacity {
            slots.push(now);
            true
        } else {
            false
        }
    }
}

/// Retry an async operation with a doubling backoff.
///
/// Only retryable errors are retried; validation-class failures return
/// immediately.
pub async fn with_retry<T, F, Fut>(
    base_delay: Duration,
    max_attempts: u32,
    mut op: F,
) -> ledgerly_core::Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = ledgerly_core::Result<T>>,
{
    let mut delay = base_delay;
    let mut attempt = 0;

    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_attempts && e.is_retryable() => {
                warn!(attempt, error = %e, "Retrying after transient failure");
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_rate_limiter_caps_per_user() {
        let mut limiter = RateLimiter::new(10, chrono::Duration::minutes(1));

        for i in 0..10 {
            assert!(limiter.try_acquire(1, ts(i)));
        }
        assert!(!limiter.try_acquire(1, ts(10)));

        // Another user has an independent budget
        assert!(limiter.try_acquire(2, ts(10)));
    }

    #[test]
    fn test_rate_limiter_window_slides() {
        let mut limiter = RateLimiter::new(10, chrono::Duration::minutes(1));

        for i in 0..10 {
            assert!(limiter.try_acquire(1, ts(i)));
        }
        assert!(!limiter.try_acquire(1, ts(30)));

        // 61 seconds after the first activation, one slot has expired
        assert!(limiter.try_acquire(1, ts(61)));
    }

    #[tokio::test]
    async fn test_with_retry_recovers_from_transient_failure() {
        let mut calls = 0;
        let result: ledgerly_core::Result<i32> =
            with_retry(Duration::from_millis(1), 2, || {
                calls += 1;
                let attempt = calls;
                async move {
                    if attempt == 1 {
                        Err(ledgerly_core::Error::ExternalService("flaky".into()))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls, 2);
    }

    #[tokio::test]
    async fn test_with_retry_gives_up_after_max_attempts() {
        let mut calls = 0;
        let result: ledgerly_core::Result<i32> =
            with_retry(Duration::from_millis(1), 2, || {
                calls += 1;
                async { Err(ledgerly_core::Error::ExternalService("down".into())) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls, 2);
    }

    #[tokio::test]
    async fn test_with_retry_does_not_retry_validation_errors() {
        let mut calls = 0;
        let result: ledgerly_core::Result<i32> =
            with_retry(Duration::from_millis(1), 2, || {
                calls += 1;
                async { Err(ledgerly_core::Error::Validation("bad input".into())) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls, 1);
    }
}
