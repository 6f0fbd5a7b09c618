//! Resend email backend
//!
//! Minimal client for the Resend HTTP API. All failure modes collapse into
//! a failed `SendOutcome`; callers log and continue.

use reqwest::Client;
use serde::Serialize;
use tracing::warn;

use super::SendOutcome;

const RESEND_URL: &str = "https://api.resend.com/emails";
const DEFAULT_FROM: &str = "Ledgerly <onboarding@resend.dev>";

#[derive(Clone)]
pub struct ResendMailer {
    http_client: Client,
    api_url: String,
    api_key: String,
    from: String,
}

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

impl ResendMailer {
    pub fn new(api_url: &str, api_key: &str, from: &str) -> Self {
        Self {
            http_client: Client::new(),
            api_url: api_url.to_string(),
            api_key: api_key.to_string(),
            from: from.to_string(),
        }
    }

    /// Create from environment variables. Returns None if `RESEND_API_KEY`
    /// is not set.
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("RESEND_API_KEY").ok()?;
        let api_url = std::env::var("RESEND_URL").unwrap_or_else(|_| RESEND_URL.to_string());
        let from = std::env::var("RESEND_FROM").unwrap_or_else(|_| DEFAULT_FROM.to_string());
        Some(Self::new(&api_url, &api_key, &from))
    }

    pub async fn send(&self, to: &str, subject: &str, body: &str) -> SendOutcome {
        let request = SendRequest {
            from: &self.from,
            to,
            subject,
            text: body,
        };

        let response = self
            .http_client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => SendOutcome::ok(),
            Ok(resp) => {
                let status = resp.status();
                let detail = resp.text().await.unwrap_or_default();
                warn!(%status, to, subject, "Email send rejected: {}", detail);
                SendOutcome::failed(format!("Resend returned {}: {}", status, detail))
            }
            Err(e) => {
                warn!(to, subject, "Email send failed: {}", e);
                SendOutcome::failed(e.to_string())
            }
        }
    }
}
