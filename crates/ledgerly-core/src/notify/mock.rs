//! Recording mock mailer for tests

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::info;

use super::SendOutcome;

/// A captured email
#[derive(Debug, Clone)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Clone, Default)]
pub struct MockMailer {
    sent: Arc<Mutex<Vec<SentEmail>>>,
    fail_next: Arc<AtomicBool>,
}

impl MockMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next send attempt fail (once)
    pub fn fail_next(&self, fail: bool) {
        self.fail_next.store(fail, Ordering::SeqCst);
    }

    /// Snapshot of everything sent so far
    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().expect("mailer lock poisoned").clone()
    }

    pub async fn send(&self, to: &str, subject: &str, body: &str) -> SendOutcome {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return SendOutcome::failed("mock send failure");
        }

        info!(to, subject, "Mock email (delivery disabled)");
        self.sent
            .lock()
            .expect("mailer lock poisoned")
            .push(SentEmail {
                to: to.to_string(),
                subject: subject.to_string(),
                body: body.to_string(),
            });
        SendOutcome::ok()
    }
}
