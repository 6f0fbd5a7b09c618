//! Recurring-template operations
//!
//! The scanner query and the processor's atomic materialization unit. All
//! cross-run coordination happens through the cursor columns on the template
//! row (`next_recurring_date`, `last_processed`), so both operations are safe
//! to re-run.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, OptionalExtension};

use super::transactions::{row_to_transaction, TX_COLUMNS};
use super::{datetime_str, Database};
use crate::error::{Error, Result};
use crate::models::WorkItem;
use crate::recurrence;

/// Result of one recurrence-processor invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecurrenceOutcome {
    /// A new occurrence was materialized and the template cursor advanced
    Processed { occurrence_id: i64 },
    /// The template's cursor has already moved past now; a duplicate or
    /// stale work item. Not an error.
    NotDue,
    /// No matching template for this id/owner pair. Treated as a silent
    /// no-op so forged or stale work items cannot touch other users' data.
    NotFound,
}

impl Database {
    /// Find templates due for materialization: recurring, COMPLETED, and
    /// with a due date at or before `today`.
    ///
    /// Read-only, so the scanner can crash and re-run freely; duplicate
    /// emission is absorbed by the processor's due-ness re-check.
    pub fn due_templates(&self, today: NaiveDate) -> Result<Vec<WorkItem>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id FROM transactions
             WHERE is_recurring = 1 AND status = 'COMPLETED'
               AND next_recurring_date IS NOT NULL AND next_recurring_date <= ?
             ORDER BY next_recurring_date, id",
        )?;

        let items = stmt
            .query_map(params![today.format("%Y-%m-%d").to_string()], |row| {
                Ok(WorkItem {
                    transaction_id: row.get(0)?,
                    user_id: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(items)
    }

    /// Materialize one occurrence from a due template, atomically.
    ///
    /// In a single SQLite transaction: re-fetch the template by id and owner,
    /// re-validate due-ness, insert the occurrence, apply the balance delta,
    /// and advance the template cursors. Any failure rolls back all of it;
    /// a retry after a successful run lands on the advanced cursor and
    /// no-ops, which is what makes at-least-once work-item delivery safe.
    pub fn process_recurring_transaction(
        &self,
        transaction_id: i64,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<RecurrenceOutcome> {
        let today = now.date_naive();
        let conn = self.conn()?;

        conn.execute("BEGIN IMMEDIATE TRANSACTION", [])?;

        let result = (|| {
            // Step 1: re-fetch, scoped to the owner. A mismatch is "not
            // found", never an error.
            let template = match conn
                .query_row(
                    &format!(
                        "SELECT {} FROM transactions WHERE id = ? AND user_id = ?",
                        TX_COLUMNS
                    ),
                    params![transaction_id, user_id],
                    row_to_transaction,
                )
                .optional()?
            {
                Some(t) => t,
                None => return Ok(RecurrenceOutcome::NotFound),
            };

            let interval = match (template.is_recurring, template.recurring_interval) {
                (true, Some(interval)) => interval,
                // Not a template (or a malformed one); nothing to fire
                _ => return Ok(RecurrenceOutcome::NotFound),
            };

            // Step 2: re-validate due-ness. This is the idempotence guard: a
            // second work item for the same occurrence arrives after the
            // first run advanced the cursor, and stops here.
            let due = template.last_processed.is_none()
                || template
                    .next_recurring_date
                    .map(|d| d <= today)
                    .unwrap_or(false);
            if !due {
                return Ok(RecurrenceOutcome::NotDue);
            }

            // Step 3: materialize the occurrence (non-recurring, no cursors)
            conn.execute(
                "INSERT INTO transactions (user_id, account_id, tx_type, amount_cents, \
                 description, date, category, status, is_recurring)
                 VALUES (?, ?, ?, ?, ?, ?, ?, 'COMPLETED', 0)",
                params![
                    template.user_id,
                    template.account_id,
                    template.tx_type.as_str(),
                    template.amount_cents,
                    format!("{} (Recurring)", template.description),
                    today.format("%Y-%m-%d").to_string(),
                    template.category,
                ],
            )?;
            let occurrence_id = conn.last_insert_rowid();

            // Step 4: apply the balance delta
            let updated = conn.execute(
                "UPDATE accounts SET balance_cents = balance_cents + ? WHERE id = ?",
                params![
                    template.tx_type.signed_cents(template.amount_cents),
                    template.account_id
                ],
            )?;
            if updated == 0 {
                return Err(Error::NotFound(format!(
                    "Account {} not found",
                    template.account_id
                )));
            }

            // Step 5: advance the template cursors
            let next = recurrence::next_date(today, interval);
            conn.execute(
                "UPDATE transactions SET last_processed = ?, next_recurring_date = ? WHERE id = ?",
                params![
                    datetime_str(now),
                    next.format("%Y-%m-%d").to_string(),
                    template.id
                ],
            )?;

            Ok(RecurrenceOutcome::Processed { occurrence_id })
        })();

        match result {
            Ok(outcome) => {
                conn.execute("COMMIT", [])?;
                Ok(outcome)
            }
            Err(e) => {
                let _ = conn.execute("ROLLBACK", []);
                Err(e)
            }
        }
    }
}
