//! Transaction CRUD and month-window aggregates

use chrono::NaiveDate;
use rusqlite::params;

use super::{parse_date, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{
    MonthlySummary, NewTransaction, Transaction, TransactionStatus, TransactionType,
};
use crate::recurrence;

pub(crate) const TX_COLUMNS: &str = "id, user_id, account_id, tx_type, amount_cents, description, \
     date, category, status, is_recurring, recurring_interval, next_recurring_date, \
     last_processed, created_at";

pub(crate) fn row_to_transaction(row: &rusqlite::Row<'_>) -> rusqlite::Result<Transaction> {
    let tx_type_str: String = row.get(3)?;
    let date_str: String = row.get(6)?;
    let status_str: String = row.get(8)?;
    let interval_str: Option<String> = row.get(10)?;
    let next_date_str: Option<String> = row.get(11)?;
    let last_processed_str: Option<String> = row.get(12)?;
    let created_at_str: String = row.get(13)?;

    Ok(Transaction {
        id: row.get(0)?,
        user_id: row.get(1)?,
        account_id: row.get(2)?,
        tx_type: tx_type_str.parse().unwrap_or(TransactionType::Expense),
        amount_cents: row.get(4)?,
        description: row.get(5)?,
        date: parse_date(&date_str),
        category: row.get(7)?,
        status: status_str.parse().unwrap_or(TransactionStatus::Completed),
        is_recurring: row.get(9)?,
        recurring_interval: interval_str.and_then(|s| s.parse().ok()),
        next_recurring_date: next_date_str.map(|s| parse_date(&s)),
        last_processed: last_processed_str.map(|s| parse_datetime(&s)),
        created_at: parse_datetime(&created_at_str),
    })
}

impl Database {
    /// Create a transaction and apply its effect to the account balance.
    ///
    /// For recurring templates the initial `next_recurring_date` is computed
    /// from the transaction date. Insert and balance update commit together.
    pub fn create_transaction(&self, user_id: i64, new: &NewTransaction) -> Result<i64> {
        new.validate()?;

        let conn = self.conn()?;

        conn.execute("BEGIN TRANSACTION", [])?;

        let result = (|| {
            let owned: i64 = conn.query_row(
                "SELECT COUNT(*) FROM accounts WHERE id = ? AND user_id = ?",
                params![new.account_id, user_id],
                |row| row.get(0),
            )?;
            if owned == 0 {
                return Err(Error::NotFound(format!(
                    "Account {} not found",
                    new.account_id
                )));
            }

            let next_recurring = new
                .recurring_interval
                .filter(|_| new.is_recurring)
                .map(|interval| recurrence::next_date(new.date, interval));

            conn.execute(
                "INSERT INTO transactions (user_id, account_id, tx_type, amount_cents, \
                 description, date, category, status, is_recurring, recurring_interval, \
                 next_recurring_date) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    user_id,
                    new.account_id,
                    new.tx_type.as_str(),
                    new.amount_cents,
                    new.description,
                    new.date.format("%Y-%m-%d").to_string(),
                    new.category,
                    new.status.as_str(),
                    new.is_recurring,
                    new.recurring_interval.map(|i| i.as_str()),
                    next_recurring.map(|d| d.format("%Y-%m-%d").to_string()),
                ],
            )?;
            let id = conn.last_insert_rowid();

            conn.execute(
                "UPDATE accounts SET balance_cents = balance_cents + ? WHERE id = ?",
                params![new.tx_type.signed_cents(new.amount_cents), new.account_id],
            )?;

            Ok(id)
        })();

        match result {
            Ok(id) => {
                conn.execute("COMMIT", [])?;
                Ok(id)
            }
            Err(e) => {
                let _ = conn.execute("ROLLBACK", []);
                Err(e)
            }
        }
    }

    /// Get a transaction by ID
    pub fn get_transaction(&self, id: i64) -> Result<Option<Transaction>> {
        let conn = self.conn()?;
        let tx = conn
            .query_row(
                &format!("SELECT {} FROM transactions WHERE id = ?", TX_COLUMNS),
                params![id],
                row_to_transaction,
            )
            .ok();

        Ok(tx)
    }

    /// Get a transaction by ID scoped to its owner
    pub fn get_user_transaction(&self, id: i64, user_id: i64) -> Result<Option<Transaction>> {
        let conn = self.conn()?;
        let tx = conn
            .query_row(
                &format!(
                    "SELECT {} FROM transactions WHERE id = ? AND user_id = ?",
                    TX_COLUMNS
                ),
                params![id, user_id],
                row_to_transaction,
            )
            .ok();

        Ok(tx)
    }

    /// List a user's transactions, most recent first
    pub fn list_transactions(&self, user_id: i64, limit: i64) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM transactions WHERE user_id = ? ORDER BY date DESC, id DESC LIMIT ?",
            TX_COLUMNS
        ))?;

        let txs = stmt
            .query_map(params![user_id, limit], row_to_transaction)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(txs)
    }

    /// Delete a transaction and reverse its balance effect. Both writes
    /// commit together.
    pub fn delete_transaction(&self, id: i64, user_id: i64) -> Result<()> {
        let conn = self.conn()?;

        conn.execute("BEGIN TRANSACTION", [])?;

        let result = (|| {
            let tx = conn
                .query_row(
                    &format!(
                        "SELECT {} FROM transactions WHERE id = ? AND user_id = ?",
                        TX_COLUMNS
                    ),
                    params![id, user_id],
                    row_to_transaction,
                )
                .map_err(|_| Error::NotFound(format!("Transaction {} not found", id)))?;

            conn.execute(
                "UPDATE accounts SET balance_cents = balance_cents - ? WHERE id = ?",
                params![tx.tx_type.signed_cents(tx.amount_cents), tx.account_id],
            )?;
            conn.execute("DELETE FROM transactions WHERE id = ?", params![id])?;
            Ok(())
        })();

        match result {
            Ok(()) => {
                conn.execute("COMMIT", [])?;
                Ok(())
            }
            Err(e) => {
                let _ = conn.execute("ROLLBACK", []);
                Err(e)
            }
        }
    }

    /// Sum of COMPLETED expenses on one account within a date window
    /// (inclusive bounds)
    pub fn sum_account_expenses(
        &self,
        account_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<i64> {
        let conn = self.conn()?;
        let total: i64 = conn.query_row(
            "SELECT COALESCE(SUM(amount_cents), 0) FROM transactions
             WHERE account_id = ? AND tx_type = 'EXPENSE' AND status = 'COMPLETED'
               AND date >= ? AND date <= ?",
            params![
                account_id,
                start.format("%Y-%m-%d").to_string(),
                end.format("%Y-%m-%d").to_string()
            ],
            |row| row.get(0),
        )?;

        Ok(total)
    }

    /// Aggregate a user's COMPLETED transactions over a date window
    /// (inclusive bounds): total income, total expenses, and expenses by
    /// category sorted descending.
    pub fn monthly_summary(
        &self,
        user_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<MonthlySummary> {
        let conn = self.conn()?;
        let start_str = start.format("%Y-%m-%d").to_string();
        let end_str = end.format("%Y-%m-%d").to_string();

        let (income, expenses): (i64, i64) = conn.query_row(
            "SELECT
                COALESCE(SUM(CASE WHEN tx_type = 'INCOME' THEN amount_cents ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN tx_type = 'EXPENSE' THEN amount_cents ELSE 0 END), 0)
             FROM transactions
             WHERE user_id = ? AND status = 'COMPLETED' AND date >= ? AND date <= ?",
            params![user_id, start_str, end_str],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let mut stmt = conn.prepare(
            "SELECT category, SUM(amount_cents) AS total FROM transactions
             WHERE user_id = ? AND tx_type = 'EXPENSE' AND status = 'COMPLETED'
               AND date >= ? AND date <= ?
             GROUP BY category ORDER BY total DESC",
        )?;
        let by_category = stmt
            .query_map(params![user_id, start_str, end_str], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(MonthlySummary {
            total_income_cents: income,
            total_expenses_cents: expenses,
            by_category,
        })
    }
}
