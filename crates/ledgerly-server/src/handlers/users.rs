//! User handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;

use crate::{AppError, AppState};
use ledgerly_core::User;

/// Request body for creating (or re-registering) a user
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub name: String,
}

/// POST /api/users - Create a user (idempotent on email)
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateUserRequest>,
) -> Result<Json<User>, AppError> {
    if req.email.trim().is_empty() || !req.email.contains('@') {
        return Err(AppError::bad_request("A valid email is required"));
    }
    if req.name.trim().is_empty() {
        return Err(AppError::bad_request("Name must not be empty"));
    }

    let user_id = state.db.upsert_user(req.email.trim(), req.name.trim())?;
    let user = state
        .db
        .get_user(user_id)?
        .ok_or_else(|| AppError::internal("User not found after creation"))?;

    Ok(Json(user))
}

/// GET /api/users/:id - Get a single user
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<User>, AppError> {
    let user = state
        .db
        .get_user(id)?
        .ok_or_else(|| AppError::not_found(&format!("User {} not found", id)))?;

    Ok(Json(user))
}
