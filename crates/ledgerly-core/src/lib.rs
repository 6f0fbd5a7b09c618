//! Ledgerly Core Library
//!
//! Shared functionality for the Ledgerly personal finance tracker:
//! - Database access and migrations (users, accounts, transactions, budgets)
//! - Recurrence date arithmetic for template transactions
//! - Atomic occurrence materialization with cursor-based idempotence
//! - Generation-model backends (Gemini, mock) for receipt scanning and
//!   monthly insights
//! - Outcome-style email dispatch (Resend, mock)
//! - Monthly summary assembly and notification rendering

pub mod ai;
pub mod db;
pub mod error;
pub mod models;
pub mod notify;
pub mod recurrence;
pub mod summary;

pub use ai::{GeminiBackend, MockModel, ModelBackend, ModelClient};
pub use db::{Database, RecurrenceOutcome};
pub use error::{Error, Result};
pub use models::{
    Account, AccountType, Budget, MonthlySummary, NewTransaction, ReceiptFields,
    RecurringInterval, Transaction, TransactionStatus, TransactionType, User, WorkItem,
};
pub use notify::{Mailer, MockMailer, ResendMailer, SendOutcome};
