//! CLI command tests

use chrono::NaiveDate;

use ledgerly_core::{AccountType, Database, NewTransaction, TransactionStatus, TransactionType};

use crate::commands::{self, truncate};

fn setup_test_db() -> Database {
    Database::in_memory().unwrap()
}

/// Create a test user with one account, returning (user_id, account_id)
fn seed_user(db: &Database) -> (i64, i64) {
    let user_id = db.upsert_user("cli@example.com", "CLI User").unwrap();
    let account_id = db
        .create_account(user_id, "Everyday", AccountType::Current, 50_000)
        .unwrap();
    (user_id, account_id)
}

#[test]
fn test_cmd_accounts_with_and_without_accounts() {
    let db = setup_test_db();
    let (user_id, _) = seed_user(&db);

    commands::cmd_accounts(&db, user_id).unwrap();

    // A user with no accounts is not an error
    let empty_user = db.upsert_user("empty@example.com", "Empty").unwrap();
    commands::cmd_accounts(&db, empty_user).unwrap();
}

#[test]
fn test_cmd_transactions_lists_rows() {
    let db = setup_test_db();
    let (user_id, account_id) = seed_user(&db);

    db.create_transaction(
        user_id,
        &NewTransaction {
            account_id,
            tx_type: TransactionType::Expense,
            amount_cents: 1_250,
            description: "Coffee".into(),
            date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            category: "food".into(),
            status: TransactionStatus::Completed,
            is_recurring: false,
            recurring_interval: None,
        },
    )
    .unwrap();

    commands::cmd_transactions(&db, user_id, 20).unwrap();
}

#[test]
fn test_cmd_init_creates_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledgerly.db");

    commands::cmd_init(&path).unwrap();
    assert!(path.exists());

    // Re-running init against an existing database is fine
    commands::cmd_init(&path).unwrap();
}

#[test]
fn test_truncate() {
    assert_eq!(truncate("short", 10), "short");
    assert_eq!(truncate("exactly ten", 11), "exactly ten");
    let cut = truncate("a very long description indeed", 10);
    assert!(cut.chars().count() <= 10);
    assert!(cut.ends_with('…'));
}
