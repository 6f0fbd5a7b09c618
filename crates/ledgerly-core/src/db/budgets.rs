//! Budget operations

use chrono::{DateTime, Utc};
use rusqlite::params;

use super::{datetime_str, parse_datetime, Database};
use crate::error::Result;
use crate::models::Budget;

fn row_to_budget(row: &rusqlite::Row<'_>) -> rusqlite::Result<Budget> {
    let last_alert_str: Option<String> = row.get(3)?;
    let updated_at_str: String = row.get(4)?;
    Ok(Budget {
        id: row.get(0)?,
        user_id: row.get(1)?,
        amount_cents: row.get(2)?,
        last_alert_sent: last_alert_str.map(|s| parse_datetime(&s)),
        updated_at: parse_datetime(&updated_at_str),
    })
}

const BUDGET_COLUMNS: &str = "id, user_id, amount_cents, last_alert_sent, updated_at";

impl Database {
    /// Create or update a user's budget. Updating the target amount keeps
    /// the alert cursor so a raised budget does not immediately re-alert.
    pub fn upsert_budget(&self, user_id: i64, amount_cents: i64) -> Result<i64> {
        let conn = self.conn()?;

        conn.execute(
            "INSERT INTO budgets (user_id, amount_cents) VALUES (?, ?)
             ON CONFLICT(user_id) DO UPDATE SET
                 amount_cents = excluded.amount_cents,
                 updated_at = CURRENT_TIMESTAMP",
            params![user_id, amount_cents],
        )?;

        let id: i64 = conn.query_row(
            "SELECT id FROM budgets WHERE user_id = ?",
            params![user_id],
            |row| row.get(0),
        )?;

        Ok(id)
    }

    /// Get a user's budget, if set
    pub fn get_budget(&self, user_id: i64) -> Result<Option<Budget>> {
        let conn = self.conn()?;
        let budget = conn
            .query_row(
                &format!("SELECT {} FROM budgets WHERE user_id = ?", BUDGET_COLUMNS),
                params![user_id],
                row_to_budget,
            )
            .ok();

        Ok(budget)
    }

    /// List every budget (for the alert evaluator)
    pub fn list_budgets(&self) -> Result<Vec<Budget>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM budgets ORDER BY user_id",
            BUDGET_COLUMNS
        ))?;

        let budgets = stmt
            .query_map([], row_to_budget)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(budgets)
    }

    /// Record that a threshold alert was sent, advancing the monthly dedup
    /// cursor. Mutated only by the alert evaluator.
    pub fn mark_budget_alert_sent(&self, budget_id: i64, at: DateTime<Utc>) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE budgets SET last_alert_sent = ? WHERE id = ?",
            params![datetime_str(at), budget_id],
        )?;
        Ok(())
    }
}
