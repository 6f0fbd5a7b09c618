//! HTTP request handlers organized by domain
//!
//! Each submodule contains handlers for a specific API area.

pub mod accounts;
pub mod budgets;
pub mod jobs;
pub mod receipts;
pub mod transactions;
pub mod users;

// Re-export all handlers for use in router
pub use accounts::*;
pub use budgets::*;
pub use jobs::*;
pub use receipts::*;
pub use transactions::*;
pub use users::*;
