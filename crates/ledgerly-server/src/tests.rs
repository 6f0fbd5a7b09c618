//! Server API tests

use super::*;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use base64::Engine;
use chrono::{NaiveDate, TimeZone, Utc};
use http_body_util::BodyExt;
use tokio::sync::mpsc;
use tower::ServiceExt;

use ledgerly_core::summary::FALLBACK_INSIGHTS;
use ledgerly_core::{
    AccountType, Database, MockMailer, MockModel, NewTransaction, RecurringInterval,
    TransactionStatus, TransactionType, WorkItem,
};

/// Router plus handles on the backends for assertions
struct TestApp {
    app: Router,
    db: Database,
    mailer: MockMailer,
    model: MockModel,
}

fn setup_test_app() -> TestApp {
    let db = Database::in_memory().unwrap();
    let mailer = MockMailer::new();
    let model = MockModel::new();
    let app = create_router_with_backends(
        db.clone(),
        Some(ModelClient::Mock(model.clone())),
        Mailer::Mock(mailer.clone()),
    );
    TestApp {
        app,
        db,
        mailer,
        model,
    }
}

async fn get_body_json(response: axum::response::Response) -> serde_json::Value {
    let body = response.into_body();
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn put_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("PUT")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

/// Seed a user with a default account directly through the db
fn seed_user(db: &Database, email: &str, balance_cents: i64) -> (i64, i64) {
    let user_id = db.upsert_user(email, "Test User").unwrap();
    let account_id = db
        .create_account(user_id, "Everyday", AccountType::Current, balance_cents)
        .unwrap();
    (user_id, account_id)
}

fn expense(account_id: i64, amount_cents: i64, date: NaiveDate) -> NewTransaction {
    NewTransaction {
        account_id,
        tx_type: TransactionType::Expense,
        amount_cents,
        description: "Seeded expense".into(),
        date,
        category: "other".into(),
        status: TransactionStatus::Completed,
        is_recurring: false,
        recurring_interval: None,
    }
}

// ========== User API ==========

#[tokio::test]
async fn test_create_and_get_user() {
    let t = setup_test_app();

    let response = t
        .app
        .clone()
        .oneshot(post_json(
            "/api/users",
            serde_json::json!({"email": "ada@example.com", "name": "Ada"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    assert_eq!(json["email"], "ada@example.com");
    let user_id = json["id"].as_i64().unwrap();

    let response = t
        .app
        .oneshot(get(&format!("/api/users/{}", user_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["name"], "Ada");
}

#[tokio::test]
async fn test_create_user_rejects_bad_email() {
    let t = setup_test_app();

    let response = t
        .app
        .oneshot(post_json(
            "/api/users",
            serde_json::json!({"email": "not-an-email", "name": "Ada"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_user_not_found() {
    let t = setup_test_app();

    let response = t.app.oneshot(get("/api/users/9999")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ========== Account API ==========

#[tokio::test]
async fn test_create_account_first_is_default() {
    let t = setup_test_app();
    let user_id = t.db.upsert_user("ada@example.com", "Ada").unwrap();

    let response = t
        .app
        .clone()
        .oneshot(post_json(
            &format!("/api/users/{}/accounts", user_id),
            serde_json::json!({"name": "Everyday", "account_type": "current", "balance_cents": 50000}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["is_default"], true);
    assert_eq!(json["balance_cents"], 50000);

    let response = t
        .app
        .oneshot(post_json(
            &format!("/api/users/{}/accounts", user_id),
            serde_json::json!({"name": "Rainy Day", "account_type": "savings"}),
        ))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json["is_default"], false);
}

#[tokio::test]
async fn test_create_account_rejects_unknown_type() {
    let t = setup_test_app();
    let user_id = t.db.upsert_user("ada@example.com", "Ada").unwrap();

    let response = t
        .app
        .oneshot(post_json(
            &format!("/api/users/{}/accounts", user_id),
            serde_json::json!({"name": "Bad", "account_type": "offshore"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_set_default_account_switches() {
    let t = setup_test_app();
    let (user_id, first) = seed_user(&t.db, "ada@example.com", 0);
    let second = t
        .db
        .create_account(user_id, "Rainy Day", AccountType::Savings, 0)
        .unwrap();

    let response = t
        .app
        .clone()
        .oneshot(post_json(
            &format!("/api/accounts/{}/default", second),
            serde_json::json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = t
        .app
        .oneshot(get(&format!("/api/accounts/{}", first)))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json["is_default"], false);
}

// ========== Transaction API ==========

#[tokio::test]
async fn test_create_transaction_updates_balance() {
    let t = setup_test_app();
    let (user_id, account_id) = seed_user(&t.db, "ada@example.com", 50_000);

    let response = t
        .app
        .clone()
        .oneshot(post_json(
            &format!("/api/users/{}/transactions", user_id),
            serde_json::json!({
                "account_id": account_id,
                "tx_type": "EXPENSE",
                "amount_cents": 10000,
                "description": "Rent",
                "date": "2024-01-15",
                "category": "housing"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["amount_cents"], 10000);
    assert_eq!(json["status"], "COMPLETED");

    let response = t
        .app
        .oneshot(get(&format!("/api/accounts/{}", account_id)))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json["balance_cents"], 40000);
}

#[tokio::test]
async fn test_create_recurring_transaction_computes_cursor() {
    let t = setup_test_app();
    let (user_id, account_id) = seed_user(&t.db, "ada@example.com", 0);

    let response = t
        .app
        .oneshot(post_json(
            &format!("/api/users/{}/transactions", user_id),
            serde_json::json!({
                "account_id": account_id,
                "tx_type": "EXPENSE",
                "amount_cents": 120000,
                "description": "Rent",
                "date": "2024-01-31",
                "category": "housing",
                "is_recurring": true,
                "recurring_interval": "MONTHLY"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    // Month-end clamp: Jan 31 + 1 month = Feb 29 (2024 is a leap year)
    assert_eq!(json["next_recurring_date"], "2024-02-29");
}

#[tokio::test]
async fn test_create_transaction_rejects_recurring_without_interval() {
    let t = setup_test_app();
    let (user_id, account_id) = seed_user(&t.db, "ada@example.com", 0);

    let response = t
        .app
        .oneshot(post_json(
            &format!("/api/users/{}/transactions", user_id),
            serde_json::json!({
                "account_id": account_id,
                "tx_type": "EXPENSE",
                "amount_cents": 1000,
                "description": "Bad",
                "date": "2024-01-15",
                "category": "other",
                "is_recurring": true
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_transaction_reverses_balance() {
    let t = setup_test_app();
    let (user_id, account_id) = seed_user(&t.db, "ada@example.com", 50_000);
    let tx_id = t
        .db
        .create_transaction(user_id, &expense(account_id, 10_000, d(2024, 1, 15)))
        .unwrap();

    let response = t
        .app
        .clone()
        .oneshot(delete(&format!("/api/transactions/{}", tx_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = t
        .app
        .oneshot(get(&format!("/api/accounts/{}", account_id)))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json["balance_cents"], 50000);
}

#[tokio::test]
async fn test_list_transactions_newest_first() {
    let t = setup_test_app();
    let (user_id, account_id) = seed_user(&t.db, "ada@example.com", 0);
    t.db.create_transaction(user_id, &expense(account_id, 1_000, d(2024, 1, 1)))
        .unwrap();
    t.db.create_transaction(user_id, &expense(account_id, 2_000, d(2024, 1, 20)))
        .unwrap();

    let response = t
        .app
        .oneshot(get(&format!("/api/users/{}/transactions?limit=10", user_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    let txs = json.as_array().unwrap();
    assert_eq!(txs.len(), 2);
    assert_eq!(txs[0]["amount_cents"], 2000);
}

// ========== Budget API ==========

#[tokio::test]
async fn test_budget_upsert_and_status() {
    let t = setup_test_app();
    let (user_id, account_id) = seed_user(&t.db, "ada@example.com", 0);
    let today = Utc::now().date_naive();
    t.db.create_transaction(user_id, &expense(account_id, 25_000, today))
        .unwrap();

    let response = t
        .app
        .clone()
        .oneshot(put_json(
            &format!("/api/users/{}/budget", user_id),
            serde_json::json!({"amount_cents": 100000}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["amount_cents"], 100000);
    assert_eq!(json["current_expenses_cents"], 25000);
    assert_eq!(json["percentage_used"], 25.0);

    // Raising the amount keeps the same budget row
    let response = t
        .app
        .clone()
        .oneshot(put_json(
            &format!("/api/users/{}/budget", user_id),
            serde_json::json!({"amount_cents": 200000}),
        ))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json["amount_cents"], 200000);

    let response = t
        .app
        .oneshot(get(&format!("/api/users/{}/budget", user_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_budget_rejects_nonpositive_amount() {
    let t = setup_test_app();
    let (user_id, _) = seed_user(&t.db, "ada@example.com", 0);

    let response = t
        .app
        .oneshot(put_json(
            &format!("/api/users/{}/budget", user_id),
            serde_json::json!({"amount_cents": 0}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_budget_not_found() {
    let t = setup_test_app();
    let (user_id, _) = seed_user(&t.db, "ada@example.com", 0);

    let response = t
        .app
        .oneshot(get(&format!("/api/users/{}/budget", user_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ========== Receipt scanning ==========

#[tokio::test]
async fn test_scan_receipt_returns_fields() {
    let t = setup_test_app();
    let image = base64::engine::general_purpose::STANDARD.encode(b"fake image bytes");

    let response = t
        .app
        .oneshot(post_json(
            "/api/receipts/scan",
            serde_json::json!({"image_base64": image, "mime_type": "image/jpeg"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["merchant_name"], "Corner Market");
    assert_eq!(json["amount_cents"], 4275);
}

#[tokio::test]
async fn test_scan_receipt_accepts_multi_megabyte_image() {
    let t = setup_test_app();
    // A typical phone photo is well over the stock 2 MB extractor limit
    let image = base64::engine::general_purpose::STANDARD.encode(vec![0xAB; 3 * 1024 * 1024]);

    let response = t
        .app
        .oneshot(post_json(
            "/api/receipts/scan",
            serde_json::json!({"image_base64": image, "mime_type": "image/jpeg"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["merchant_name"], "Corner Market");
}

#[tokio::test]
async fn test_scan_receipt_rejects_oversized_image() {
    let t = setup_test_app();
    let image =
        base64::engine::general_purpose::STANDARD.encode(vec![0xAB; MAX_UPLOAD_SIZE + 1024]);

    let response = t
        .app
        .oneshot(post_json(
            "/api/receipts/scan",
            serde_json::json!({"image_base64": image, "mime_type": "image/jpeg"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_scan_receipt_not_a_receipt() {
    let t = setup_test_app();

    // The mock treats an empty image as "not a receipt"
    let response = t
        .app
        .oneshot(post_json(
            "/api/receipts/scan",
            serde_json::json!({"image_base64": "", "mime_type": "image/png"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_scan_receipt_invalid_base64() {
    let t = setup_test_app();

    let response = t
        .app
        .oneshot(post_json(
            "/api/receipts/scan",
            serde_json::json!({"image_base64": "!!!not base64!!!", "mime_type": "image/png"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_scan_receipt_rate_limited_maps_to_429() {
    let t = setup_test_app();
    t.model.fail_receipts(true);
    let image = base64::engine::general_purpose::STANDARD.encode(b"fake image bytes");

    let response = t
        .app
        .oneshot(post_json(
            "/api/receipts/scan",
            serde_json::json!({"image_base64": image, "mime_type": "image/jpeg"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_scan_receipt_unavailable_without_model() {
    let db = Database::in_memory().unwrap();
    let app = create_router_with_backends(db, None, Mailer::mock());
    let image = base64::engine::general_purpose::STANDARD.encode(b"fake image bytes");

    let response = app
        .oneshot(post_json(
            "/api/receipts/scan",
            serde_json::json!({"image_base64": image, "mime_type": "image/jpeg"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

// ========== Recurring transaction jobs ==========

/// The full monthly-template scenario: an EXPENSE 100.00 template due
/// 2024-01-01 against a 500.00 balance materializes exactly once.
#[tokio::test]
async fn test_scan_job_materializes_due_template() {
    let t = setup_test_app();
    let (user_id, account_id) = seed_user(&t.db, "ada@example.com", 50_000);

    t.db.create_transaction(
        user_id,
        &NewTransaction {
            is_recurring: true,
            recurring_interval: Some(RecurringInterval::Monthly),
            ..expense(account_id, 10_000, d(2023, 12, 1))
        },
    )
    .unwrap();
    // Template creation spent 100.00; top the account back up to 500.00
    t.db.create_transaction(
        user_id,
        &NewTransaction {
            tx_type: TransactionType::Income,
            ..expense(account_id, 10_000, d(2023, 12, 1))
        },
    )
    .unwrap();

    let response = t
        .app
        .clone()
        .oneshot(post_json("/api/jobs/scan", serde_json::json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["processed"], 1);
    assert_eq!(json["failed"], 0);

    let response = t
        .app
        .clone()
        .oneshot(get(&format!("/api/accounts/{}", account_id)))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json["balance_cents"], 40000);

    // A second pass finds nothing due: the cursor advanced
    let response = t
        .app
        .oneshot(post_json("/api/jobs/scan", serde_json::json!({})))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json["processed"], 0);
}

#[tokio::test]
async fn test_scanner_emits_work_items_to_channel() {
    let db = Database::in_memory().unwrap();
    let (user_id, account_id) = seed_user(&db, "ada@example.com", 0);
    let template_id = db
        .create_transaction(
            user_id,
            &NewTransaction {
                is_recurring: true,
                recurring_interval: Some(RecurringInterval::Daily),
                ..expense(account_id, 1_000, d(2024, 1, 1))
            },
        )
        .unwrap();

    let (tx, mut rx) = mpsc::channel(16);
    let count = scheduler::scan_due_templates(&db, d(2024, 1, 2), &tx)
        .await
        .unwrap();
    assert_eq!(count, 1);

    let item = rx.recv().await.unwrap();
    assert_eq!(
        item,
        WorkItem {
            transaction_id: template_id,
            user_id,
        }
    );
}

// ========== Budget alert job ==========

fn at(y: i32, m: u32, day: u32) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, day, 9, 0, 0).unwrap()
}

#[tokio::test]
async fn test_budget_alert_fires_at_85_percent() {
    let t = setup_test_app();
    let (user_id, account_id) = seed_user(&t.db, "ada@example.com", 0);
    t.db.upsert_budget(user_id, 100_000).unwrap();
    t.db.create_transaction(user_id, &expense(account_id, 85_000, d(2024, 1, 10)))
        .unwrap();

    let mailer = Mailer::Mock(t.mailer.clone());
    let stats = scheduler::run_budget_alerts(&t.db, &mailer, at(2024, 1, 20)).await;
    assert_eq!(stats.sent, 1);

    let sent = t.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "ada@example.com");
    assert!(sent[0].body.contains("85.0%"));
    assert!(sent[0].body.contains("Everyday"));

    // Cursor recorded
    let budget = t.db.get_budget(user_id).unwrap().unwrap();
    assert_eq!(budget.last_alert_sent, Some(at(2024, 1, 20)));
}

#[tokio::test]
async fn test_budget_alert_dedup_within_month() {
    let t = setup_test_app();
    let (user_id, account_id) = seed_user(&t.db, "ada@example.com", 0);
    t.db.upsert_budget(user_id, 100_000).unwrap();
    t.db.create_transaction(user_id, &expense(account_id, 90_000, d(2024, 1, 10)))
        .unwrap();

    let mailer = Mailer::Mock(t.mailer.clone());
    assert_eq!(
        scheduler::run_budget_alerts(&t.db, &mailer, at(2024, 1, 20)).await.sent,
        1
    );
    // Same month, still over threshold: no second alert
    assert_eq!(
        scheduler::run_budget_alerts(&t.db, &mailer, at(2024, 1, 25)).await.sent,
        0
    );
    assert_eq!(t.mailer.sent().len(), 1);

    // New month with fresh overspend: fires again
    t.db.create_transaction(user_id, &expense(account_id, 95_000, d(2024, 2, 3)))
        .unwrap();
    assert_eq!(
        scheduler::run_budget_alerts(&t.db, &mailer, at(2024, 2, 5)).await.sent,
        1
    );
    assert_eq!(t.mailer.sent().len(), 2);
}

#[tokio::test]
async fn test_budget_alert_below_threshold_is_silent() {
    let t = setup_test_app();
    let (user_id, account_id) = seed_user(&t.db, "ada@example.com", 0);
    t.db.upsert_budget(user_id, 100_000).unwrap();
    t.db.create_transaction(user_id, &expense(account_id, 79_000, d(2024, 1, 10)))
        .unwrap();

    let mailer = Mailer::Mock(t.mailer.clone());
    let stats = scheduler::run_budget_alerts(&t.db, &mailer, at(2024, 1, 20)).await;
    assert_eq!(stats.checked, 1);
    assert_eq!(stats.sent, 0);
    assert!(t.mailer.sent().is_empty());
}

#[tokio::test]
async fn test_budget_alert_skips_user_without_default_account() {
    let t = setup_test_app();
    let user_id = t.db.upsert_user("noaccount@example.com", "No Account").unwrap();
    t.db.upsert_budget(user_id, 100_000).unwrap();

    let mailer = Mailer::Mock(t.mailer.clone());
    let stats = scheduler::run_budget_alerts(&t.db, &mailer, at(2024, 1, 20)).await;
    assert_eq!(stats.sent, 0);
}

#[tokio::test]
async fn test_budget_alert_send_failure_keeps_cursor_clear() {
    let t = setup_test_app();
    let (user_id, account_id) = seed_user(&t.db, "ada@example.com", 0);
    t.db.upsert_budget(user_id, 100_000).unwrap();
    t.db.create_transaction(user_id, &expense(account_id, 90_000, d(2024, 1, 10)))
        .unwrap();

    let mailer = Mailer::Mock(t.mailer.clone());
    t.mailer.fail_next(true);
    assert_eq!(
        scheduler::run_budget_alerts(&t.db, &mailer, at(2024, 1, 20)).await.sent,
        0
    );
    assert!(t.db.get_budget(user_id).unwrap().unwrap().last_alert_sent.is_none());

    // Next evaluation retries and succeeds
    assert_eq!(
        scheduler::run_budget_alerts(&t.db, &mailer, at(2024, 1, 21)).await.sent,
        1
    );
}

// ========== Monthly report job ==========

#[tokio::test]
async fn test_monthly_report_covers_prior_month() {
    let t = setup_test_app();
    let (user_id, account_id) = seed_user(&t.db, "ada@example.com", 0);
    t.db.create_transaction(user_id, &expense(account_id, 30_000, d(2024, 1, 15)))
        .unwrap();
    t.db.create_transaction(
        user_id,
        &NewTransaction {
            tx_type: TransactionType::Income,
            ..expense(account_id, 500_000, d(2024, 1, 1))
        },
    )
    .unwrap();
    // February activity must not leak into the January report
    t.db.create_transaction(user_id, &expense(account_id, 77_000, d(2024, 2, 1)))
        .unwrap();

    let mailer = Mailer::Mock(t.mailer.clone());
    let model = ModelClient::Mock(t.model.clone());
    let stats =
        scheduler::run_monthly_reports(&t.db, Some(&model), &mailer, at(2024, 2, 1)).await;
    assert_eq!(stats.sent, 1);
    assert_eq!(stats.failed, 0);

    let sent = t.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].subject.contains("January 2024"));
    assert!(sent[0].body.contains("Total income: $5000.00"));
    assert!(sent[0].body.contains("Total expenses: $300.00"));
}

#[tokio::test]
async fn test_monthly_report_falls_back_when_model_fails() {
    let t = setup_test_app();
    seed_user(&t.db, "ada@example.com", 0);
    t.model.fail_insights(true);

    let mailer = Mailer::Mock(t.mailer.clone());
    let model = ModelClient::Mock(t.model.clone());
    let stats =
        scheduler::run_monthly_reports(&t.db, Some(&model), &mailer, at(2024, 2, 1)).await;
    assert_eq!(stats.sent, 1);

    let sent = t.mailer.sent();
    assert!(sent[0].body.contains(FALLBACK_INSIGHTS[0]));
}

#[tokio::test]
async fn test_monthly_report_dedup_within_month() {
    let t = setup_test_app();
    let (user_id, _) = seed_user(&t.db, "ada@example.com", 0);

    let mailer = Mailer::Mock(t.mailer.clone());
    let stats = scheduler::run_monthly_reports(&t.db, None, &mailer, at(2024, 2, 1)).await;
    assert_eq!(stats.sent, 1);

    // Cursor recorded
    let user = t.db.get_user(user_id).unwrap().unwrap();
    assert_eq!(user.last_report_sent, Some(at(2024, 2, 1)));

    // A restart on the same day reruns the job; the cursor suppresses it
    let stats = scheduler::run_monthly_reports(&t.db, None, &mailer, at(2024, 2, 1)).await;
    assert_eq!(stats.sent, 0);
    assert_eq!(stats.skipped, 1);
    assert_eq!(t.mailer.sent().len(), 1);

    // Next month sends again
    let stats = scheduler::run_monthly_reports(&t.db, None, &mailer, at(2024, 3, 1)).await;
    assert_eq!(stats.sent, 1);
    assert_eq!(t.mailer.sent().len(), 2);
}

#[tokio::test]
async fn test_monthly_report_isolates_user_failures() {
    let t = setup_test_app();
    seed_user(&t.db, "ada@example.com", 0);
    seed_user(&t.db, "bob@example.com", 0);

    let mailer = Mailer::Mock(t.mailer.clone());
    // First send fails; the second user still gets their report
    t.mailer.fail_next(true);
    let stats = scheduler::run_monthly_reports(&t.db, None, &mailer, at(2024, 2, 1)).await;
    assert_eq!(stats.sent, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(t.mailer.sent().len(), 1);

    // The failed user's cursor stayed clear, so a rerun reaches only them
    let stats = scheduler::run_monthly_reports(&t.db, None, &mailer, at(2024, 2, 1)).await;
    assert_eq!(stats.sent, 1);
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.failed, 0);
    assert_eq!(t.mailer.sent().len(), 2);
}

#[tokio::test]
async fn test_reports_job_endpoint() {
    let t = setup_test_app();
    seed_user(&t.db, "ada@example.com", 0);

    let response = t
        .app
        .oneshot(post_json("/api/jobs/reports", serde_json::json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["sent"], 1);
    assert_eq!(t.mailer.sent().len(), 1);
}
