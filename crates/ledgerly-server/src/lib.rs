//! Ledgerly Web Server
//!
//! Axum-based REST API for the Ledgerly personal finance tracker, plus the
//! background job scheduler (recurring-transaction materialization, budget
//! alerts, monthly reports).
//!
//! The API has no authentication layer; it identifies callers by the user
//! id in the path and is meant to sit behind a trusted gateway. Errors are
//! sanitized: internal failures log the full chain and return a generic
//! message.

use std::sync::Arc;

use axum::{
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use ledgerly_core::{Database, Mailer, ModelBackend, ModelClient};

mod handlers;
pub mod scheduler;

pub use scheduler::{scheduler_enabled, start_scheduler};

/// Maximum receipt image size after base64 decoding (10 MB)
pub const MAX_UPLOAD_SIZE: usize = 10 * 1024 * 1024;

/// Maximum scan request body size. Base64 inflates the image by 4/3, plus
/// a little JSON framing.
pub const MAX_SCAN_BODY_SIZE: usize = MAX_UPLOAD_SIZE / 3 * 4 + 1024;

/// Maximum pagination limit
pub const MAX_PAGE_LIMIT: i64 = 1000;

/// Shared application state
pub struct AppState {
    pub db: Database,
    /// Generation-model client; None degrades receipt scanning and insights
    pub model: Option<ModelClient>,
    pub mailer: Mailer,
}

/// Success response
#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Create the application router with backends from the environment
pub fn create_router(db: Database) -> Router {
    let model = ModelClient::from_env();
    match &model {
        Some(client) => {
            info!(
                "Model backend configured: {} (model: {})",
                client.host(),
                client.model()
            );
        }
        None => {
            info!("Model backend not configured (set GEMINI_API_KEY to enable receipt scanning and insights)");
        }
    }

    let mailer = Mailer::from_env();

    create_router_with_backends(db, model, mailer)
}

/// Create the application router with explicit backends (for testing)
pub fn create_router_with_backends(
    db: Database,
    model: Option<ModelClient>,
    mailer: Mailer,
) -> Router {
    let state = Arc::new(AppState { db, model, mailer });

    let api_routes = Router::new()
        // Users
        .route("/users", post(handlers::create_user))
        .route("/users/:id", get(handlers::get_user))
        // Accounts
        .route(
            "/users/:id/accounts",
            get(handlers::list_accounts).post(handlers::create_account),
        )
        .route("/accounts/:id", get(handlers::get_account))
        .route(
            "/accounts/:id/default",
            post(handlers::set_default_account),
        )
        // Transactions
        .route(
            "/users/:id/transactions",
            get(handlers::list_transactions).post(handlers::create_transaction),
        )
        .route(
            "/transactions/:id",
            get(handlers::get_transaction).delete(handlers::delete_transaction),
        )
        // Budget (one per user)
        .route(
            "/users/:id/budget",
            get(handlers::get_budget).put(handlers::update_budget),
        )
        // Receipt scanning
        .route("/receipts/scan", post(handlers::scan_receipt))
        // Operator job triggers
        .route("/jobs/scan", post(handlers::trigger_scan))
        .route("/jobs/alerts", post(handlers::trigger_alerts))
        .route("/jobs/reports", post(handlers::trigger_reports));

    // Same-origin CORS; the API is not meant to be called cross-origin
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .nest("/api", api_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Start the server
pub async fn serve(db: Database, host: &str, port: u16, run_jobs: bool) -> anyhow::Result<()> {
    let model = ModelClient::from_env();
    let mailer = Mailer::from_env();

    if run_jobs && scheduler_enabled() {
        start_scheduler(db.clone(), model.clone(), mailer.clone());
    } else {
        warn!("Background jobs disabled; recurring transactions, alerts and reports will not run");
    }

    let app = create_router_with_backends(db, model, mailer);
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
pub struct AppError {
    status: StatusCode,
    message: String,
    internal: Option<anyhow::Error>,
}

impl AppError {
    pub fn new(status: StatusCode, msg: &str) -> Self {
        Self {
            status,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn bad_request(msg: &str) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    pub fn not_found(msg: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    pub fn internal(msg: &str) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full internal error if present
        if let Some(err) = &self.internal {
            error!(error = %err, "Internal error");
        }

        let body = Json(serde_json::json!({
            "error": self.message
        }));

        (self.status, body).into_response()
    }
}

impl From<ledgerly_core::Error> for AppError {
    fn from(err: ledgerly_core::Error) -> Self {
        use ledgerly_core::Error;

        match err {
            Error::NotFound(msg) => Self::not_found(&msg),
            Error::Validation(msg) | Error::InvalidInput(msg) => Self::bad_request(&msg),
            Error::RateLimited(msg) => Self::new(StatusCode::TOO_MANY_REQUESTS, &msg),
            Error::AuthFailed(_) | Error::MalformedResponse(_) | Error::ExternalService(_) => {
                Self {
                    status: StatusCode::BAD_GATEWAY,
                    message: "Upstream service error".to_string(),
                    internal: Some(err.into()),
                }
            }
            other => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                // Return generic message to client
                message: "An internal error occurred".to_string(),
                // Keep full error for logging
                internal: Some(other.into()),
            },
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "An internal error occurred".to_string(),
            internal: Some(err),
        }
    }
}

#[cfg(test)]
mod tests;
