//! Legacy-schema upgrade tests.
//!
//! The upgrade is the one irreversible operation in the system, so these
//! tests pin the parts that matter: ascending-id ordering, the legacy-id to
//! subscription-id mapping driving the audit replay, orphan audit rows being
//! dropped, and idempotence across repeated runs.

use migration::{Migrator, MigratorTrait};
use renewal_reminder::store::{products, sends, subscriptions};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};

async fn connect() -> DatabaseConnection {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options.max_connections(1);
    Database::connect(options).await.expect("connect")
}

async fn exec(db: &DatabaseConnection, sql: &str) {
    db.execute(Statement::from_string(db.get_database_backend(), sql))
        .await
        .unwrap_or_else(|e| panic!("exec {sql}: {e}"));
}

async fn table_exists(db: &DatabaseConnection, name: &str) -> bool {
    db.query_one(Statement::from_string(
        db.get_database_backend(),
        format!("SELECT 1 AS present FROM sqlite_master WHERE type='table' AND name='{name}'"),
    ))
    .await
    .expect("query sqlite_master")
    .is_some()
}

/// The pre-catalog shape: products embed the customer and expiry, and the
/// send audit is keyed by product id.
async fn seed_legacy(db: &DatabaseConnection) {
    exec(
        db,
        "CREATE TABLE customers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            email TEXT NOT NULL UNIQUE,
            name TEXT,
            created_at TEXT NOT NULL
        )",
    )
    .await;
    exec(
        db,
        "CREATE TABLE products (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            customer_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            content TEXT,
            expires_at TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
    )
    .await;
    exec(
        db,
        "CREATE TABLE reminder_sends (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            product_id INTEGER NOT NULL,
            days_before INTEGER NOT NULL,
            sent_at TEXT NOT NULL
        )",
    )
    .await;

    exec(
        db,
        "INSERT INTO customers (id, email, name, created_at) VALUES
            (1, 'alice@example.com', 'Alice', '2023-01-01T00:00:00Z'),
            (2, 'bob@example.com', NULL, '2023-02-01T00:00:00Z')",
    )
    .await;
    exec(
        db,
        "INSERT INTO products (id, customer_id, name, content, expires_at, created_at) VALUES
            (1, 1, 'VPN', 'alice private note', '2024-05-01', '2023-01-02T00:00:00Z'),
            (2, 2, 'VPN', NULL, '2024-06-01', '2023-02-02T00:00:00Z'),
            (3, 1, 'Mailbox', 'extra storage', '2024-07-01', '2023-03-02T00:00:00Z')",
    )
    .await;
    exec(
        db,
        "INSERT INTO reminder_sends (product_id, days_before, sent_at) VALUES
            (1, 30, '2024-04-01T00:00:00Z'),
            (3, 7, '2024-06-24T00:00:00Z'),
            (99, 1, '2024-01-01T00:00:00Z')",
    )
    .await;
}

#[tokio::test]
async fn migrates_legacy_dump_into_normalized_catalog() {
    let db = connect().await;
    seed_legacy(&db).await;

    Migrator::up(&db, None).await.expect("migrate");

    // Two catalog products: the duplicated "VPN" rows collapse into one.
    assert_eq!(products::count(&db, None).await.expect("count"), 2);
    let vpn = &products::list(&db, Some("VPN"), 0, 10).await.expect("list")[0];
    // Legacy content was customer-specific and must not become shared
    // catalog content.
    assert_eq!(vpn.content, None);

    // Three subscriptions, ids assigned in legacy-id order.
    assert_eq!(subscriptions::count(&db, None).await.expect("count"), 3);
    let first = subscriptions::get_detail(&db, 1)
        .await
        .expect("query")
        .expect("subscription 1");
    assert_eq!(first.customer_email, "alice@example.com");
    assert_eq!(first.product_name, "VPN");
    assert_eq!(first.note.as_deref(), Some("alice private note"));
    assert_eq!(first.expires_at.to_string(), "2024-05-01");

    let second = subscriptions::get_detail(&db, 2)
        .await
        .expect("query")
        .expect("subscription 2");
    assert_eq!(second.customer_email, "bob@example.com");
    assert_eq!(second.product_name, "VPN");
    assert_eq!(second.note, None);

    let third = subscriptions::get_detail(&db, 3)
        .await
        .expect("query")
        .expect("subscription 3");
    assert_eq!(third.product_name, "Mailbox");
    assert_eq!(third.note.as_deref(), Some("extra storage"));
}

#[tokio::test]
async fn replays_audit_rows_through_the_id_map_and_drops_orphans() {
    let db = connect().await;
    seed_legacy(&db).await;

    Migrator::up(&db, None).await.expect("migrate");

    // Legacy product 1 -> subscription 1, legacy product 3 -> subscription 3;
    // the row for the unknown legacy product 99 is gone.
    assert!(sends::was_sent(&db, 1, 30).await.expect("check"));
    assert!(sends::was_sent(&db, 3, 7).await.expect("check"));
    assert!(!sends::was_sent(&db, 2, 30).await.expect("check"));

    let remaining = db
        .query_one(Statement::from_string(
            db.get_database_backend(),
            "SELECT COUNT(*) AS c FROM reminder_sends",
        ))
        .await
        .expect("count")
        .expect("row");
    let count: i64 = remaining.try_get("", "c").expect("column");
    assert_eq!(count, 2);
}

#[tokio::test]
async fn keeps_legacy_tables_as_backup() {
    let db = connect().await;
    seed_legacy(&db).await;

    Migrator::up(&db, None).await.expect("migrate");

    assert!(table_exists(&db, "legacy_products").await);
    assert!(table_exists(&db, "legacy_reminder_sends").await);
}

#[tokio::test]
async fn second_run_is_a_noop() {
    let db = connect().await;
    seed_legacy(&db).await;

    Migrator::up(&db, None).await.expect("first run");
    let subs_before = subscriptions::count(&db, None).await.expect("count");
    let products_before = products::count(&db, None).await.expect("count");

    Migrator::up(&db, None).await.expect("second run");
    assert_eq!(
        subscriptions::count(&db, None).await.expect("count"),
        subs_before
    );
    assert_eq!(
        products::count(&db, None).await.expect("count"),
        products_before
    );
}

#[tokio::test]
async fn fresh_database_skips_the_legacy_path() {
    let db = connect().await;
    Migrator::up(&db, None).await.expect("migrate");

    assert!(!table_exists(&db, "legacy_products").await);
    assert_eq!(subscriptions::count(&db, None).await.expect("count"), 0);

    // The catalog is usable immediately.
    let id = products::add(&db, "VPN", Some("desc")).await.expect("add");
    assert!(products::get(&db, id).await.expect("get").is_some());
}

#[tokio::test]
async fn stale_backup_from_aborted_run_is_replaced() {
    let db = connect().await;
    seed_legacy(&db).await;
    // Simulate an earlier run that renamed but never committed the import.
    exec(
        &db,
        "CREATE TABLE legacy_products (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            customer_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            content TEXT,
            expires_at TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
    )
    .await;
    exec(
        &db,
        "INSERT INTO legacy_products (id, customer_id, name, content, expires_at, created_at)
         VALUES (1, 1, 'Stale', NULL, '2020-01-01', '2020-01-01T00:00:00Z')",
    )
    .await;

    Migrator::up(&db, None).await.expect("migrate");

    // The import read the current legacy data, not the stale backup.
    assert_eq!(subscriptions::count(&db, None).await.expect("count"), 3);
    assert_eq!(
        products::count(&db, Some("Stale")).await.expect("count"),
        0
    );
}
