//! Mock model backend for testing
//!
//! Returns canned responses without network access, with optional failure
//! injection so jobs' degradation paths can be exercised.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::{Error, Result};
use crate::models::{MonthlySummary, ReceiptFields};

use super::ModelBackend;

#[derive(Clone, Default)]
pub struct MockModel {
    fail_insights: Arc<AtomicBool>,
    fail_receipts: Arc<AtomicBool>,
}

impl MockModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent insight calls fail with a malformed-response error
    pub fn fail_insights(&self, fail: bool) {
        self.fail_insights.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent receipt scans fail with a rate-limit error
    pub fn fail_receipts(&self, fail: bool) {
        self.fail_receipts.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ModelBackend for MockModel {
    async fn scan_receipt(&self, image: &[u8], _mime_type: &str) -> Result<Option<ReceiptFields>> {
        if self.fail_receipts.load(Ordering::SeqCst) {
            return Err(Error::RateLimited("mock rate limit".into()));
        }
        // An empty image models "not a receipt"
        if image.is_empty() {
            return Ok(None);
        }
        Ok(Some(ReceiptFields {
            amount_cents: 4275,
            date: NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
            description: "Groceries and household items".into(),
            merchant_name: "Corner Market".into(),
            category: "groceries".into(),
        }))
    }

    async fn monthly_insights(
        &self,
        _summary: &MonthlySummary,
        _month_label: &str,
    ) -> Result<Vec<String>> {
        if self.fail_insights.load(Ordering::SeqCst) {
            return Err(Error::MalformedResponse("mock parse failure".into()));
        }
        Ok(vec![
            "Your largest expense category deserves a second look.".into(),
            "Set aside a fixed amount at the start of each month.".into(),
            "Review recurring charges you no longer use.".into(),
        ])
    }

    fn model(&self) -> &str {
        "mock"
    }

    fn host(&self) -> &str {
        "mock://localhost"
    }
}
