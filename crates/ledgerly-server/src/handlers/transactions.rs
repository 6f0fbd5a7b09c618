//! Transaction handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use crate::{AppError, AppState, SuccessResponse, MAX_PAGE_LIMIT};
use ledgerly_core::{NewTransaction, Transaction};

#[derive(Debug, Deserialize)]
pub struct ListTransactionsQuery {
    pub limit: Option<i64>,
}

/// GET /api/users/:id/transactions - List a user's transactions (newest first)
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
    Query(query): Query<ListTransactionsQuery>,
) -> Result<Json<Vec<Transaction>>, AppError> {
    state
        .db
        .get_user(user_id)?
        .ok_or_else(|| AppError::not_found(&format!("User {} not found", user_id)))?;

    let limit = query.limit.unwrap_or(100).clamp(1, MAX_PAGE_LIMIT);
    let transactions = state.db.list_transactions(user_id, limit)?;

    Ok(Json(transactions))
}

/// POST /api/users/:id/transactions - Create a transaction
///
/// Recurring templates get their initial `next_recurring_date` computed
/// here; the account balance is adjusted in the same database transaction
/// as the insert.
pub async fn create_transaction(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
    Json(req): Json<NewTransaction>,
) -> Result<Json<Transaction>, AppError> {
    state
        .db
        .get_user(user_id)?
        .ok_or_else(|| AppError::not_found(&format!("User {} not found", user_id)))?;

    let transaction_id = state.db.create_transaction(user_id, &req)?;
    let transaction = state
        .db
        .get_transaction(transaction_id)?
        .ok_or_else(|| AppError::internal("Transaction not found after creation"))?;

    Ok(Json(transaction))
}

/// GET /api/transactions/:id - Get a single transaction
pub async fn get_transaction(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Transaction>, AppError> {
    let transaction = state
        .db
        .get_transaction(id)?
        .ok_or_else(|| AppError::not_found(&format!("Transaction {} not found", id)))?;

    Ok(Json(transaction))
}

/// DELETE /api/transactions/:id - Delete a transaction
///
/// Reverses the balance effect atomically with the row delete.
pub async fn delete_transaction(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<SuccessResponse>, AppError> {
    let transaction = state
        .db
        .get_transaction(id)?
        .ok_or_else(|| AppError::not_found(&format!("Transaction {} not found", id)))?;

    state.db.delete_transaction(id, transaction.user_id)?;

    Ok(Json(SuccessResponse { success: true }))
}
