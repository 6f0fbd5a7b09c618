//! Account operations

use rusqlite::params;

use super::{parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{Account, AccountType};

fn row_to_account(row: &rusqlite::Row<'_>) -> rusqlite::Result<Account> {
    let type_str: String = row.get(3)?;
    let created_at_str: String = row.get(6)?;
    Ok(Account {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        account_type: type_str.parse().unwrap_or(AccountType::Current),
        balance_cents: row.get(4)?,
        is_default: row.get(5)?,
        created_at: parse_datetime(&created_at_str),
    })
}

const ACCOUNT_COLUMNS: &str =
    "id, user_id, name, account_type, balance_cents, is_default, created_at";

impl Database {
    /// Create an account for a user
    ///
    /// The first account a user creates becomes their default automatically.
    /// The count read and the insert run in one write transaction so two
    /// concurrent first-account creates cannot both claim the default flag.
    pub fn create_account(
        &self,
        user_id: i64,
        name: &str,
        account_type: AccountType,
        opening_balance_cents: i64,
    ) -> Result<i64> {
        let conn = self.conn()?;

        conn.execute("BEGIN IMMEDIATE TRANSACTION", [])?;

        let result = (|| -> Result<i64> {
            let existing: i64 = conn.query_row(
                "SELECT COUNT(*) FROM accounts WHERE user_id = ?",
                params![user_id],
                |row| row.get(0),
            )?;

            conn.execute(
                "INSERT INTO accounts (user_id, name, account_type, balance_cents, is_default)
                 VALUES (?, ?, ?, ?, ?)",
                params![
                    user_id,
                    name,
                    account_type.as_str(),
                    opening_balance_cents,
                    existing == 0
                ],
            )?;

            Ok(conn.last_insert_rowid())
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

    /// Get an account by ID
    pub fn get_account(&self, id: i64) -> Result<Option<Account>> {
        let conn = self.conn()?;
        let account = conn
            .query_row(
                &format!("SELECT {} FROM accounts WHERE id = ?", ACCOUNT_COLUMNS),
                params![id],
                row_to_account,
            )
            .ok();

        Ok(account)
    }

    /// Get an account by ID scoped to its owner. A mismatched owner reads
    /// as "not found", not an error.
    pub fn get_user_account(&self, id: i64, user_id: i64) -> Result<Option<Account>> {
        let conn = self.conn()?;
        let account = conn
            .query_row(
                &format!(
                    "SELECT {} FROM accounts WHERE id = ? AND user_id = ?",
                    ACCOUNT_COLUMNS
                ),
                params![id, user_id],
                row_to_account,
            )
            .ok();

        Ok(account)
    }

    /// List a user's accounts
    pub fn list_accounts(&self, user_id: i64) -> Result<Vec<Account>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM accounts WHERE user_id = ? ORDER BY name",
            ACCOUNT_COLUMNS
        ))?;

        let accounts = stmt
            .query_map(params![user_id], row_to_account)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(accounts)
    }

    /// Get a user's default account, if they have one
    pub fn get_default_account(&self, user_id: i64) -> Result<Option<Account>> {
        let conn = self.conn()?;
        let account = conn
            .query_row(
                &format!(
                    "SELECT {} FROM accounts WHERE user_id = ? AND is_default = 1",
                    ACCOUNT_COLUMNS
                ),
                params![user_id],
                row_to_account,
            )
            .ok();

        Ok(account)
    }

    /// Make an account the user's default, clearing the flag on their other
    /// accounts. Both writes commit together.
    pub fn set_default_account(&self, account_id: i64, user_id: i64) -> Result<()> {
        let conn = self.conn()?;

        conn.execute("BEGIN TRANSACTION", [])?;

        let result = (|| {
            conn.execute(
                "UPDATE accounts SET is_default = 0 WHERE user_id = ? AND is_default = 1",
                params![user_id],
            )?;
            let updated = conn.execute(
                "UPDATE accounts SET is_default = 1 WHERE id = ? AND user_id = ?",
                params![account_id, user_id],
            )?;
            if updated == 0 {
                return Err(Error::NotFound(format!("Account {} not found", account_id)));
            }
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
}
