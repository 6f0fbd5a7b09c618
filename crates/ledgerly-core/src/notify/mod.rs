//! Notification dispatch
//!
//! Email delivery behind an outcome-style interface: `send` reports failure
//! in its return value and never propagates an error across the boundary,
//! so a dead mail provider cannot abort a background job mid-run.
//!
//! # Configuration
//!
//! - `RESEND_API_KEY`: enables the Resend backend
//! - `RESEND_FROM`: sender address (default: "Ledgerly <onboarding@resend.dev>")

mod mock;
mod resend;

pub use mock::{MockMailer, SentEmail};
pub use resend::ResendMailer;

/// Result of one send attempt. Failures are data, not errors.
#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub success: bool,
    pub error: Option<String>,
}

impl SendOutcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Concrete mailer enum
#[derive(Clone)]
pub enum Mailer {
    /// Resend HTTP API backend
    Resend(ResendMailer),
    /// Recording mock for tests
    Mock(MockMailer),
}

impl Mailer {
    /// Create a mailer from environment variables, falling back to a mock
    /// (which logs instead of delivering) when no provider is configured.
    pub fn from_env() -> Self {
        match ResendMailer::from_env() {
            Some(mailer) => Mailer::Resend(mailer),
            None => {
                tracing::info!("RESEND_API_KEY not set, email delivery disabled");
                Mailer::Mock(MockMailer::new())
            }
        }
    }

    /// Create a recording mock for tests
    pub fn mock() -> Self {
        Mailer::Mock(MockMailer::new())
    }

    /// Send one email. Never returns Err; inspect the outcome.
    pub async fn send(&self, to: &str, subject: &str, body: &str) -> SendOutcome {
        match self {
            Mailer::Resend(m) => m.send(to, subject, body).await,
            Mailer::Mock(m) => m.send(to, subject, body).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_records_sent_mail() {
        let mock = MockMailer::new();
        let outcome = mock.send("user@example.com", "Hello", "Body text").await;
        assert!(outcome.success);

        let sent = mock.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "user@example.com");
        assert_eq!(sent[0].subject, "Hello");
    }

    #[tokio::test]
    async fn test_mock_failure_is_outcome_not_error() {
        let mock = MockMailer::new();
        mock.fail_next(true);
        let outcome = mock.send("user@example.com", "Hello", "Body").await;
        assert!(!outcome.success);
        assert!(outcome.error.is_some());
        assert!(mock.sent().is_empty());
    }
}
