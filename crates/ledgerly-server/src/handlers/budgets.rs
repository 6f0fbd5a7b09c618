//! Budget handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::{AppError, AppState};
use ledgerly_core::{summary, Budget};

/// Budget with the current month's spending against it
#[derive(Debug, Serialize)]
pub struct BudgetStatus {
    #[serde(flatten)]
    pub budget: Budget,
    /// COMPLETED expenses on the default account this calendar month
    pub current_expenses_cents: i64,
    pub percentage_used: f64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateBudgetRequest {
    pub amount_cents: i64,
}

/// GET /api/users/:id/budget - Get the user's budget with current usage
pub async fn get_budget(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
) -> Result<Json<BudgetStatus>, AppError> {
    let budget = state
        .db
        .get_budget(user_id)?
        .ok_or_else(|| AppError::not_found(&format!("No budget for user {}", user_id)))?;

    Ok(Json(budget_status(&state, budget)?))
}

/// PUT /api/users/:id/budget - Create or update the user's budget
///
/// Upserts on user id; the monthly alert-dedup cursor survives amount
/// changes.
pub async fn update_budget(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
    Json(req): Json<UpdateBudgetRequest>,
) -> Result<Json<BudgetStatus>, AppError> {
    state
        .db
        .get_user(user_id)?
        .ok_or_else(|| AppError::not_found(&format!("User {} not found", user_id)))?;

    if req.amount_cents <= 0 {
        return Err(AppError::bad_request("Budget amount must be positive"));
    }

    state.db.upsert_budget(user_id, req.amount_cents)?;
    let budget = state
        .db
        .get_budget(user_id)?
        .ok_or_else(|| AppError::internal("Budget not found after upsert"))?;

    Ok(Json(budget_status(&state, budget)?))
}

fn budget_status(state: &AppState, budget: Budget) -> Result<BudgetStatus, AppError> {
    let (start, end) = summary::month_bounds(Utc::now().date_naive());

    let current_expenses_cents = match state.db.get_default_account(budget.user_id)? {
        Some(account) => state.db.sum_account_expenses(account.id, start, end)?,
        None => 0,
    };

    let percentage_used = if budget.amount_cents > 0 {
        current_expenses_cents as f64 / budget.amount_cents as f64 * 100.0
    } else {
        0.0
    };

    Ok(BudgetStatus {
        budget,
        current_expenses_cents,
        percentage_used,
    })
}
