//! Gemini backend implementation
//!
//! HTTP client for the Google Generative Language API. Handles the two call
//! sites Ledgerly needs: receipt field extraction (vision) and monthly
//! insight generation. HTTP failure classes are mapped onto the error
//! taxonomy so callers can tell "retry later" from "fix your key".

use async_trait::async_trait;
use base64::Engine;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{format_cents, MonthlySummary, ReceiptFields};

use super::parsing::{parse_insights, parse_receipt_fields};
use super::ModelBackend;

const DEFAULT_HOST: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODEL: &str = "gemini-1.5-pro";

/// Gemini API backend
#[derive(Clone)]
pub struct GeminiBackend {
    http_client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiBackend {
    /// Create a new Gemini backend
    pub fn new(base_url: &str, model: &str, api_key: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
        }
    }

    /// Create from environment variables
    ///
    /// Requires `GEMINI_API_KEY`; `GEMINI_HOST` and `GEMINI_MODEL` override
    /// the defaults (useful for pointing tests at a stub server).
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("GEMINI_API_KEY").ok()?;
        let host = std::env::var("GEMINI_HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());
        let model = std::env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        Some(Self::new(&host, &model, &api_key))
    }

    async fn generate(&self, parts: Vec<Part>) -> Result<String> {
        let request = GenerateRequest {
            contents: vec![Content { parts }],
        };

        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let response = self.http_client.post(&url).json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::TOO_MANY_REQUESTS => Error::RateLimited(body),
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::AuthFailed(body),
                StatusCode::BAD_REQUEST => Error::InvalidInput(body),
                _ => Error::ExternalService(format!("Gemini returned {}: {}", status, body)),
            });
        }

        let parsed: GenerateResponse = response.json().await?;
        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .and_then(|p| p.text)
            .ok_or_else(|| Error::MalformedResponse("Empty Gemini response".into()))?;

        debug!(model = %self.model, "Gemini response: {}", text);
        Ok(text)
    }
}

/// Request to the generateContent endpoint
#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

impl Part {
    fn text(s: String) -> Self {
        Self {
            text: Some(s),
            inline_data: None,
        }
    }

    fn image(data: &[u8], mime_type: &str) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData {
                mime_type: mime_type.to_string(),
                data: base64::engine::general_purpose::STANDARD.encode(data),
            }),
        }
    }
}

#[derive(Debug, Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

/// Response from the generateContent endpoint
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

fn receipt_prompt() -> String {
    "Analyze this receipt image and extract the following information in JSON format:\n\
     - Total amount (just the number)\n\
     - Date (in ISO format)\n\
     - Description or items purchased (brief summary)\n\
     - Merchant/store name\n\
     - Suggested category (one of: housing, transportation, groceries, utilities, \
     entertainment, food, shopping, healthcare, education, personal, travel, insurance, \
     gifts, bills, other-expense)\n\n\
     Only respond with valid JSON in this exact format:\n\
     {\n\
       \"amount\": number,\n\
       \"date\": \"ISO date string\",\n\
       \"description\": \"string\",\n\
       \"merchantName\": \"string\",\n\
       \"category\": \"string\"\n\
     }\n\n\
     If it is not a receipt, return an empty object."
        .to_string()
}

fn insights_prompt(summary: &MonthlySummary, month_label: &str) -> String {
    let categories = summary
        .by_category
        .iter()
        .map(|(category, cents)| format!("  - {}: ${}", category, format_cents(*cents)))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Analyze this financial data for {} and provide exactly 3 concise, actionable \
         insights.\nFocus on spending patterns and practical advice.\n\n\
         Total income: ${}\nTotal expenses: ${}\nExpenses by category:\n{}\n\n\
         Respond with only a JSON array of exactly 3 strings, like:\n\
         [\"insight 1\", \"insight 2\", \"insight 3\"]",
        month_label,
        format_cents(summary.total_income_cents),
        format_cents(summary.total_expenses_cents),
        categories
    )
}

#[async_trait]
impl ModelBackend for GeminiBackend {
    async fn scan_receipt(&self, image: &[u8], mime_type: &str) -> Result<Option<ReceiptFields>> {
        let parts = vec![Part::image(image, mime_type), Part::text(receipt_prompt())];
        let text = self.generate(parts).await?;
        parse_receipt_fields(&text)
    }

    async fn monthly_insights(
        &self,
        summary: &MonthlySummary,
        month_label: &str,
    ) -> Result<Vec<String>> {
        let parts = vec![Part::text(insights_prompt(summary, month_label))];
        let text = self.generate(parts).await?;
        parse_insights(&text)
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn host(&self) -> &str {
        &self.base_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insights_prompt_includes_totals() {
        let summary = MonthlySummary {
            total_income_cents: 500_000,
            total_expenses_cents: 320_050,
            by_category: vec![("housing".into(), 200_000), ("food".into(), 120_050)],
        };
        let prompt = insights_prompt(&summary, "January 2024");
        assert!(prompt.contains("January 2024"));
        assert!(prompt.contains("$5000.00"));
        assert!(prompt.contains("housing: $2000.00"));
    }
}
