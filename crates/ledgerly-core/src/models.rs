//! Domain models for Ledgerly
//!
//! Monetary amounts are fixed-point: integer cents (`i64`). Transaction
//! amounts are stored positive; the sign is applied through the transaction
//! type when a balance is adjusted.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A registered user. Authentication is handled upstream; users here are
/// just the owners of accounts, transactions, and budgets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: String,
    /// When the last monthly report went out; dedups report sends per
    /// calendar month
    pub last_report_sent: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A money account belonging to a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub account_type: AccountType,
    /// Current balance in cents. Mutated only by transaction creation,
    /// deletion, and recurrence materialization.
    pub balance_cents: i64,
    /// At most one default account per user
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

/// Account types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Current,
    Savings,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Current => "current",
            Self::Savings => "savings",
        }
    }
}

impl std::str::FromStr for AccountType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "current" | "checking" => Ok(Self::Current),
            "savings" => Ok(Self::Savings),
            _ => Err(format!("Unknown account type: {}", s)),
        }
    }
}

impl std::fmt::Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Signed direction of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    Income,
    Expense,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "INCOME",
            Self::Expense => "EXPENSE",
        }
    }

    /// Signed balance delta for an amount of this type
    pub fn signed_cents(&self, amount_cents: i64) -> i64 {
        match self {
            Self::Income => amount_cents,
            Self::Expense => -amount_cents,
        }
    }
}

impl std::str::FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "INCOME" => Ok(Self::Income),
            "EXPENSE" => Ok(Self::Expense),
            _ => Err(format!("Unknown transaction type: {}", s)),
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Transaction posting status. Only COMPLETED templates are eligible for
/// recurrence materialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionStatus {
    Pending,
    #[default]
    Completed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Completed => "COMPLETED",
        }
    }
}

impl std::str::FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "COMPLETED" => Ok(Self::Completed),
            _ => Err(format!("Unknown transaction status: {}", s)),
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Interval between recurring occurrences
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecurringInterval {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl RecurringInterval {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "DAILY",
            Self::Weekly => "WEEKLY",
            Self::Monthly => "MONTHLY",
            Self::Yearly => "YEARLY",
        }
    }
}

impl std::str::FromStr for RecurringInterval {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "DAILY" => Ok(Self::Daily),
            "WEEKLY" => Ok(Self::Weekly),
            "MONTHLY" => Ok(Self::Monthly),
            "YEARLY" => Ok(Self::Yearly),
            _ => Err(format!("Unknown recurring interval: {}", s)),
        }
    }
}

impl std::fmt::Display for RecurringInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A ledger entry. A row flagged recurring is a *template*: its
/// `next_recurring_date` and `last_processed` cursors advance as occurrences
/// are materialized from it. Materialized occurrences are ordinary
/// non-recurring rows and never carry cursor fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub user_id: i64,
    pub account_id: i64,
    pub tx_type: TransactionType,
    /// Always positive; sign is applied via `tx_type`
    pub amount_cents: i64,
    pub description: String,
    pub date: NaiveDate,
    pub category: String,
    pub status: TransactionStatus,
    pub is_recurring: bool,
    pub recurring_interval: Option<RecurringInterval>,
    /// Due-ness cursor: the next date this template should fire
    pub next_recurring_date: Option<NaiveDate>,
    /// Last time this template fired
    pub last_processed: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a transaction
#[derive(Debug, Clone, Deserialize)]
pub struct NewTransaction {
    pub account_id: i64,
    pub tx_type: TransactionType,
    pub amount_cents: i64,
    pub description: String,
    pub date: NaiveDate,
    pub category: String,
    #[serde(default)]
    pub status: TransactionStatus,
    #[serde(default)]
    pub is_recurring: bool,
    #[serde(default)]
    pub recurring_interval: Option<RecurringInterval>,
}

impl NewTransaction {
    /// Validate the template/occurrence field split before any write.
    ///
    /// A recurring transaction must name an interval; a non-recurring one
    /// must not. Amounts must be positive.
    pub fn validate(&self) -> Result<()> {
        if self.amount_cents <= 0 {
            return Err(Error::Validation(
                "Transaction amount must be positive".into(),
            ));
        }
        match (self.is_recurring, self.recurring_interval) {
            (true, None) => Err(Error::Validation(
                "Recurring transactions require a recurring interval".into(),
            )),
            (false, Some(_)) => Err(Error::Validation(
                "Non-recurring transactions cannot have a recurring interval".into(),
            )),
            _ => Ok(()),
        }
    }
}

/// A monthly budget. One per user, evaluated against the user's default
/// account. `last_alert_sent` dedups threshold alerts to one per calendar
/// month.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Budget {
    pub id: i64,
    pub user_id: i64,
    pub amount_cents: i64,
    pub last_alert_sent: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// Work item emitted by the due-transaction scanner and consumed by the
/// recurrence processor. Ephemeral: it is a hint, not ground truth; the
/// processor re-reads the transaction before acting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    pub transaction_id: i64,
    pub user_id: i64,
}

/// Fields extracted from a receipt image by the generation model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptFields {
    pub amount_cents: i64,
    pub date: NaiveDate,
    pub description: String,
    pub merchant_name: String,
    pub category: String,
}

/// Prior-month aggregate used for the monthly report
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonthlySummary {
    pub total_income_cents: i64,
    pub total_expenses_cents: i64,
    /// Expense totals keyed by category, sorted descending by amount
    pub by_category: Vec<(String, i64)>,
}

impl MonthlySummary {
    pub fn net_cents(&self) -> i64 {
        self.total_income_cents - self.total_expenses_cents
    }
}

/// Format cents as a dollar string, e.g. 12345 -> "123.45"
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}
