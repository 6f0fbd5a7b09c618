//! JSON parsing helpers for generation-model responses
//!
//! Model output frequently arrives wrapped in Markdown code fences or
//! surrounded by prose; these functions strip that wrapping before parsing
//! and map unusable output to `Error::MalformedResponse` so callers can
//! degrade instead of failing their job.

use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::models::ReceiptFields;

/// Strip Markdown code-fence wrapping (```json ... ```) from model output
pub fn strip_code_fences(response: &str) -> String {
    response
        .lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Raw receipt shape as the model emits it: dollar amount, ISO date,
/// camelCase merchant field
#[derive(Debug, Deserialize)]
struct RawReceipt {
    amount: f64,
    date: String,
    description: String,
    #[serde(rename = "merchantName")]
    merchant_name: String,
    category: String,
}

/// Parse receipt fields from a model response.
///
/// Returns `Ok(None)` when the model signalled "not a receipt" by returning
/// an empty object.
pub fn parse_receipt_fields(response: &str) -> Result<Option<ReceiptFields>> {
    let cleaned = strip_code_fences(response);
    let cleaned = cleaned.trim();

    let start = cleaned.find('{');
    let end = cleaned.rfind('}');

    let json_str = match (start, end) {
        (Some(s), Some(e)) if s < e => &cleaned[s..=e],
        _ => {
            return Err(Error::MalformedResponse(
                "No JSON found in receipt response".into(),
            ))
        }
    };

    // Empty object means the image was not a receipt
    let value: serde_json::Value = serde_json::from_str(json_str)
        .map_err(|e| Error::MalformedResponse(format!("Invalid receipt JSON: {}", e)))?;
    if value.as_object().map(|o| o.is_empty()).unwrap_or(false) {
        return Ok(None);
    }

    let raw: RawReceipt = serde_json::from_value(value)
        .map_err(|e| Error::MalformedResponse(format!("Invalid receipt JSON: {}", e)))?;

    let date = parse_receipt_date(&raw.date)?;

    Ok(Some(ReceiptFields {
        amount_cents: (raw.amount * 100.0).round() as i64,
        date,
        description: raw.description,
        merchant_name: raw.merchant_name,
        category: raw.category,
    }))
}

/// Accept either a bare ISO date or a full ISO datetime
fn parse_receipt_date(s: &str) -> Result<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(date);
    }
    s.parse::<chrono::DateTime<chrono::Utc>>()
        .map(|dt| dt.date_naive())
        .map_err(|_| Error::MalformedResponse(format!("Unparseable receipt date: {}", s)))
}

/// Parse the monthly-insight response: a JSON array of exactly three short
/// strings.
pub fn parse_insights(response: &str) -> Result<Vec<String>> {
    let cleaned = strip_code_fences(response);
    let cleaned = cleaned.trim();

    let start = cleaned.find('[');
    let end = cleaned.rfind(']');

    let json_str = match (start, end) {
        (Some(s), Some(e)) if s < e => &cleaned[s..=e],
        _ => {
            return Err(Error::MalformedResponse(
                "No JSON array found in insights response".into(),
            ))
        }
    };

    let insights: Vec<String> = serde_json::from_str(json_str)
        .map_err(|e| Error::MalformedResponse(format!("Invalid insights JSON: {}", e)))?;

    if insights.len() != 3 {
        return Err(Error::MalformedResponse(format!(
            "Expected 3 insights, got {}",
            insights.len()
        )));
    }

    Ok(insights)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fences() {
        let response = "```json\n{\"amount\": 12.5}\n```";
        assert_eq!(strip_code_fences(response), "{\"amount\": 12.5}");
    }

    #[test]
    fn test_strip_code_fences_plain_passthrough() {
        assert_eq!(strip_code_fences("{\"a\": 1}"), "{\"a\": 1}");
    }

    #[test]
    fn test_parse_receipt_fields() {
        let response = r#"```json
{
  "amount": 42.75,
  "date": "2024-03-10",
  "description": "Groceries and household items",
  "merchantName": "Corner Market",
  "category": "groceries"
}
```"#;
        let fields = parse_receipt_fields(response).unwrap().unwrap();
        assert_eq!(fields.amount_cents, 4275);
        assert_eq!(fields.merchant_name, "Corner Market");
        assert_eq!(
            fields.date,
            NaiveDate::from_ymd_opt(2024, 3, 10).unwrap()
        );
    }

    #[test]
    fn test_parse_receipt_fields_datetime_date() {
        let response = r#"{"amount": 5.0, "date": "2024-03-10T18:30:00Z", "description": "Coffee", "merchantName": "Cafe", "category": "food"}"#;
        let fields = parse_receipt_fields(response).unwrap().unwrap();
        assert_eq!(
            fields.date,
            NaiveDate::from_ymd_opt(2024, 3, 10).unwrap()
        );
        assert_eq!(fields.amount_cents, 500);
    }

    #[test]
    fn test_parse_receipt_fields_not_a_receipt() {
        assert!(parse_receipt_fields("{}").unwrap().is_none());
        assert!(parse_receipt_fields("```json\n{}\n```").unwrap().is_none());
    }

    #[test]
    fn test_parse_receipt_fields_malformed() {
        assert!(matches!(
            parse_receipt_fields("the receipt shows a total of $42"),
            Err(Error::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_receipt_fields(r#"{"amount": "a lot"}"#),
            Err(Error::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_parse_insights() {
        let response = r#"```json
["Trim dining out", "Automate savings transfers", "Review subscriptions"]
```"#;
        let insights = parse_insights(response).unwrap();
        assert_eq!(insights.len(), 3);
        assert_eq!(insights[0], "Trim dining out");
    }

    #[test]
    fn test_parse_insights_with_prose() {
        let response = "Here are your insights:\n[\"One\", \"Two\", \"Three\"]\nHope that helps!";
        assert_eq!(parse_insights(response).unwrap().len(), 3);
    }

    #[test]
    fn test_parse_insights_wrong_count() {
        assert!(matches!(
            parse_insights(r#"["only", "two"]"#),
            Err(Error::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_parse_insights_not_json() {
        assert!(matches!(
            parse_insights("no array here"),
            Err(Error::MalformedResponse(_))
        ));
    }
}
