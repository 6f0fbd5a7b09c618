//! Error types for Ledgerly

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// External service rejected the request due to rate limiting.
    /// Retryable after a delay.
    #[error("Rate limited by external service: {0}")]
    RateLimited(String),

    /// External service rejected the credentials. Not retryable;
    /// needs operator attention.
    #[error("External service authentication failed: {0}")]
    AuthFailed(String),

    /// External service rejected the input itself (e.g. an unreadable
    /// receipt image).
    #[error("Invalid input for external service: {0}")]
    InvalidInput(String),

    /// External service returned output we could not use. Callers with a
    /// fallback (e.g. monthly insights) degrade instead of failing the job.
    #[error("Malformed response from external service: {0}")]
    MalformedResponse(String),

    #[error("External service error: {0}")]
    ExternalService(String),
}

impl Error {
    /// Whether this error is worth retrying at the job-invocation level.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Database(_)
                | Error::Pool(_)
                | Error::Io(_)
                | Error::Http(_)
                | Error::RateLimited(_)
                | Error::ExternalService(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
