//! Operator one-shot job triggers
//!
//! Each endpoint runs one pass of a periodic job synchronously and returns
//! its stats. Useful for catch-up after downtime and for testing a
//! deployment without waiting for the next scheduled tick.

use std::sync::Arc;

use axum::{extract::State, Json};
use chrono::Utc;

use crate::scheduler::{run_budget_alerts, run_monthly_reports, run_scan_once};
use crate::scheduler::{AlertStats, ReportStats, ScanStats};
use crate::{AppError, AppState};

/// POST /api/jobs/scan - Scan and process due recurring transactions
pub async fn trigger_scan(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ScanStats>, AppError> {
    let stats = run_scan_once(&state.db, Utc::now()).await;
    Ok(Json(stats))
}

/// POST /api/jobs/alerts - Evaluate budget alerts now
pub async fn trigger_alerts(
    State(state): State<Arc<AppState>>,
) -> Result<Json<AlertStats>, AppError> {
    let stats = run_budget_alerts(&state.db, &state.mailer, Utc::now()).await;
    Ok(Json(stats))
}

/// POST /api/jobs/reports - Generate prior-month reports now
///
/// Unlike the scheduled loop this runs regardless of the day of month.
pub async fn trigger_reports(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ReportStats>, AppError> {
    let stats =
        run_monthly_reports(&state.db, state.model.as_ref(), &state.mailer, Utc::now()).await;
    Ok(Json(stats))
}
