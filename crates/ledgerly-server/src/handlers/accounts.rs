//! Account handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;

use crate::{AppError, AppState, SuccessResponse};
use ledgerly_core::{Account, AccountType};

/// Request body for creating an account
#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    pub name: String,
    pub account_type: String,
    /// Opening balance in cents (defaults to 0)
    #[serde(default)]
    pub balance_cents: i64,
}

/// GET /api/users/:id/accounts - List a user's accounts
pub async fn list_accounts(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
) -> Result<Json<Vec<Account>>, AppError> {
    state
        .db
        .get_user(user_id)?
        .ok_or_else(|| AppError::not_found(&format!("User {} not found", user_id)))?;

    let accounts = state.db.list_accounts(user_id)?;
    Ok(Json(accounts))
}

/// POST /api/users/:id/accounts - Create an account
pub async fn create_account(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
    Json(req): Json<CreateAccountRequest>,
) -> Result<Json<Account>, AppError> {
    state
        .db
        .get_user(user_id)?
        .ok_or_else(|| AppError::not_found(&format!("User {} not found", user_id)))?;

    if req.name.trim().is_empty() {
        return Err(AppError::bad_request("Account name must not be empty"));
    }

    let account_type: AccountType = req
        .account_type
        .parse()
        .map_err(|_| AppError::bad_request(&format!("Unknown account type: {}", req.account_type)))?;

    let account_id =
        state
            .db
            .create_account(user_id, req.name.trim(), account_type, req.balance_cents)?;
    let account = state
        .db
        .get_account(account_id)?
        .ok_or_else(|| AppError::internal("Account not found after creation"))?;

    Ok(Json(account))
}

/// GET /api/accounts/:id - Get a single account
pub async fn get_account(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Account>, AppError> {
    let account = state
        .db
        .get_account(id)?
        .ok_or_else(|| AppError::not_found(&format!("Account {} not found", id)))?;

    Ok(Json(account))
}

/// POST /api/accounts/:id/default - Make this the user's default account
///
/// Clears the flag on the user's other accounts in the same database
/// transaction.
pub async fn set_default_account(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<SuccessResponse>, AppError> {
    let account = state
        .db
        .get_account(id)?
        .ok_or_else(|| AppError::not_found(&format!("Account {} not found", id)))?;

    state.db.set_default_account(id, account.user_id)?;

    Ok(Json(SuccessResponse { success: true }))
}
