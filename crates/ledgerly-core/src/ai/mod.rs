//! Generation-model abstraction
//!
//! Backend-agnostic interface for the two model call sites Ledgerly has:
//! receipt field extraction and monthly insight generation.
//!
//! # Architecture
//!
//! - `ModelBackend` trait: defines the interface
//! - `ModelClient` enum: concrete wrapper providing Clone + compile-time
//!   dispatch
//! - Backend implementations: `GeminiBackend`, `MockModel`
//!
//! # Configuration
//!
//! Environment variables:
//! - `GEMINI_API_KEY`: API key (required for the gemini backend)
//! - `GEMINI_HOST`: API base URL override (for stub servers in tests)
//! - `GEMINI_MODEL`: Model name (default: gemini-1.5-pro)
//! - `MODEL_BACKEND`: `gemini` (default) or `mock`

mod gemini;
mod mock;
pub mod parsing;

pub use gemini::GeminiBackend;
pub use mock::MockModel;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{MonthlySummary, ReceiptFields};

/// Trait defining the interface for generation-model backends
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Extract transaction fields from a receipt image.
    ///
    /// `Ok(None)` means the model decided the image is not a receipt.
    async fn scan_receipt(&self, image: &[u8], mime_type: &str) -> Result<Option<ReceiptFields>>;

    /// Generate exactly three short, actionable insight strings for a
    /// monthly summary.
    async fn monthly_insights(
        &self,
        summary: &MonthlySummary,
        month_label: &str,
    ) -> Result<Vec<String>>;

    /// Get the model name (for logging)
    fn model(&self) -> &str;

    /// Get the host URL (for logging)
    fn host(&self) -> &str;
}

/// Concrete model client enum
///
/// Provides Clone and compile-time dispatch without Box<dyn> overhead.
#[derive(Clone)]
pub enum ModelClient {
    /// Gemini backend (HTTP API)
    Gemini(GeminiBackend),
    /// Mock backend for testing
    Mock(MockModel),
}

impl ModelClient {
    /// Create a model client from environment variables
    ///
    /// Returns None if the required environment variables are not set; the
    /// application then runs with model-dependent features degraded
    /// (receipt scanning unavailable, reports using fallback insights).
    pub fn from_env() -> Option<Self> {
        let backend = std::env::var("MODEL_BACKEND").unwrap_or_else(|_| "gemini".to_string());

        match backend.to_lowercase().as_str() {
            "gemini" => GeminiBackend::from_env().map(ModelClient::Gemini),
            "mock" => Some(ModelClient::Mock(MockModel::new())),
            _ => {
                tracing::warn!(backend = %backend, "Unknown MODEL_BACKEND, falling back to gemini");
                GeminiBackend::from_env().map(ModelClient::Gemini)
            }
        }
    }

    /// Create a mock backend for testing
    pub fn mock() -> Self {
        ModelClient::Mock(MockModel::new())
    }
}

#[async_trait]
impl ModelBackend for ModelClient {
    async fn scan_receipt(&self, image: &[u8], mime_type: &str) -> Result<Option<ReceiptFields>> {
        match self {
            ModelClient::Gemini(b) => b.scan_receipt(image, mime_type).await,
            ModelClient::Mock(b) => b.scan_receipt(image, mime_type).await,
        }
    }

    async fn monthly_insights(
        &self,
        summary: &MonthlySummary,
        month_label: &str,
    ) -> Result<Vec<String>> {
        match self {
            ModelClient::Gemini(b) => b.monthly_insights(summary, month_label).await,
            ModelClient::Mock(b) => b.monthly_insights(summary, month_label).await,
        }
    }

    fn model(&self) -> &str {
        match self {
            ModelClient::Gemini(b) => b.model(),
            ModelClient::Mock(b) => b.model(),
        }
    }

    fn host(&self) -> &str {
        match self {
            ModelClient::Gemini(b) => b.host(),
            ModelClient::Mock(b) => b.host(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_client_mock() {
        let client = ModelClient::mock();
        assert_eq!(client.model(), "mock");
        assert_eq!(client.host(), "mock://localhost");
    }

    #[tokio::test]
    async fn test_mock_scan_receipt() {
        let client = ModelClient::mock();
        let fields = client
            .scan_receipt(b"fake-image", "image/png")
            .await
            .unwrap()
            .unwrap();
        assert!(fields.amount_cents > 0);
        assert!(!fields.merchant_name.is_empty());
    }

    #[tokio::test]
    async fn test_mock_not_a_receipt() {
        let client = ModelClient::mock();
        assert!(client
            .scan_receipt(b"", "image/png")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_mock_insights_are_three() {
        let client = ModelClient::mock();
        let insights = client
            .monthly_insights(&MonthlySummary::default(), "January 2024")
            .await
            .unwrap();
        assert_eq!(insights.len(), 3);
    }
}
