//! Catalog store tests against an in-memory database migrated with the real
//! migrator.

use chrono::{Duration, NaiveDate, Utc};
use migration::{Migrator, MigratorTrait};
use renewal_reminder::error::{SettingsError, StoreError};
use renewal_reminder::settings;
use renewal_reminder::store::{customers, products, sends, subscriptions};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};

async fn setup_db() -> DatabaseConnection {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options.max_connections(1);
    let db = Database::connect(options).await.expect("connect");
    Migrator::up(&db, None).await.expect("migrate");
    db
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

// =============================================================================
// Customer Tests
// =============================================================================

#[tokio::test]
async fn upsert_customer_normalizes_email_and_reuses_id() {
    let db = setup_db().await;

    let first = customers::upsert(&db, "  Alice@Example.COM ", Some("Alice"))
        .await
        .expect("first upsert");
    let second = customers::upsert(&db, "alice@example.com", Some("Alice A."))
        .await
        .expect("second upsert");
    assert_eq!(first, second);

    let stored = customers::get(&db, first)
        .await
        .expect("get")
        .expect("customer exists");
    assert_eq!(stored.email, "alice@example.com");
    assert_eq!(stored.name.as_deref(), Some("Alice A."));
    assert_eq!(customers::count(&db, None).await.expect("count"), 1);
}

#[tokio::test]
async fn upsert_customer_rejects_empty_email() {
    let db = setup_db().await;
    let result = customers::upsert(&db, "   ", Some("Nobody")).await;
    assert!(matches!(result, Err(StoreError::Constraint(_))));
}

#[tokio::test]
async fn update_customer_surfaces_duplicate_email_as_constraint() {
    let db = setup_db().await;
    let a = customers::upsert(&db, "a@example.com", None)
        .await
        .expect("a");
    let _b = customers::upsert(&db, "b@example.com", None)
        .await
        .expect("b");

    let result = customers::update(&db, a, "b@example.com", None).await;
    assert!(matches!(result, Err(StoreError::Constraint(_))));
}

#[tokio::test]
async fn customer_search_matches_email_and_name() {
    let db = setup_db().await;
    customers::upsert(&db, "carol@widgets.io", Some("Carol"))
        .await
        .expect("carol");
    customers::upsert(&db, "dave@example.com", Some("Dave"))
        .await
        .expect("dave");

    let hits = customers::list(&db, Some("WIDGETS"), 0, 10)
        .await
        .expect("list");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].email, "carol@widgets.io");
    assert_eq!(
        customers::count(&db, Some("carol")).await.expect("count"),
        1
    );
}

#[tokio::test]
async fn deleting_customer_cascades_to_subscriptions_and_sends() {
    let db = setup_db().await;
    let customer = customers::upsert(&db, "gone@example.com", None)
        .await
        .expect("customer");
    let product = products::add(&db, "VPN", None).await.expect("product");
    let sub = subscriptions::add(&db, customer, product, today(), None)
        .await
        .expect("subscription");
    assert!(
        sends::mark_sent_on(&db, sub, today(), Utc::now())
            .await
            .expect("mark")
    );

    customers::delete(&db, customer).await.expect("delete");

    assert!(
        subscriptions::get_detail(&db, sub)
            .await
            .expect("detail")
            .is_none()
    );
    assert_eq!(sends::count_daily_log(&db).await.expect("log count"), 0);
    // The product is catalog data and survives the cascade.
    assert!(products::get(&db, product).await.expect("get").is_some());
}

// =============================================================================
// Product Tests
// =============================================================================

#[tokio::test]
async fn product_upsert_never_blanks_existing_content() {
    let db = setup_db().await;
    let id = products::add(&db, " VPN ", Some("shared description"))
        .await
        .expect("add");

    let again = products::upsert_by_name(&db, "VPN", None)
        .await
        .expect("upsert without content");
    assert_eq!(id, again);
    let stored = products::get(&db, id).await.expect("get").expect("exists");
    assert_eq!(stored.content.as_deref(), Some("shared description"));

    products::upsert_by_name(&db, "VPN", Some("new description"))
        .await
        .expect("upsert with content");
    let stored = products::get(&db, id).await.expect("get").expect("exists");
    assert_eq!(stored.content.as_deref(), Some("new description"));
}

#[tokio::test]
async fn delete_product_blocked_while_referenced() {
    let db = setup_db().await;
    let customer = customers::upsert(&db, "a@example.com", None)
        .await
        .expect("customer");
    let product = products::add(&db, "VPN", None).await.expect("product");
    let sub = subscriptions::add(&db, customer, product, today(), None)
        .await
        .expect("subscription");

    assert!(!products::delete(&db, product).await.expect("delete blocked"));
    assert!(products::get(&db, product).await.expect("get").is_some());
    assert_eq!(
        products::subscription_count(&db, product)
            .await
            .expect("count"),
        1
    );

    subscriptions::delete(&db, sub).await.expect("remove sub");
    assert!(products::delete(&db, product).await.expect("delete allowed"));
    assert!(products::get(&db, product).await.expect("get").is_none());
}

// =============================================================================
// Subscription Tests
// =============================================================================

#[tokio::test]
async fn add_subscription_requires_existing_references() {
    let db = setup_db().await;
    let result = subscriptions::add(&db, 41, 42, today(), None).await;
    assert!(matches!(result, Err(StoreError::Reference(_))));
}

#[tokio::test]
async fn update_expiry_of_missing_subscription_is_not_found() {
    let db = setup_db().await;
    let result = subscriptions::update_expiry(&db, 999, today()).await;
    assert!(matches!(result, Err(StoreError::NotFound(_))));
}

#[tokio::test]
async fn detail_join_carries_display_fields_and_note() {
    let db = setup_db().await;
    let customer = customers::upsert(&db, "a@example.com", Some("Alice"))
        .await
        .expect("customer");
    let product = products::add(&db, "VPN", Some("shared"))
        .await
        .expect("product");
    let sub = subscriptions::add(&db, customer, product, today(), Some("custom note"))
        .await
        .expect("subscription");

    let detail = subscriptions::get_detail(&db, sub)
        .await
        .expect("query")
        .expect("exists");
    assert_eq!(detail.customer_email, "a@example.com");
    assert_eq!(detail.customer_name.as_deref(), Some("Alice"));
    assert_eq!(detail.product_name, "VPN");
    assert_eq!(detail.product_content.as_deref(), Some("shared"));
    assert_eq!(detail.note.as_deref(), Some("custom note"));
}

#[tokio::test]
async fn expiring_window_is_inclusive_and_sorted() {
    let db = setup_db().await;
    let customer = customers::upsert(&db, "a@example.com", None)
        .await
        .expect("customer");
    let product = products::add(&db, "VPN", None).await.expect("product");

    let base = today();
    subscriptions::add(&db, customer, product, base + Duration::days(7), None)
        .await
        .expect("at window edge");
    subscriptions::add(&db, customer, product, base, None)
        .await
        .expect("today");
    subscriptions::add(&db, customer, product, base + Duration::days(8), None)
        .await
        .expect("past window");
    subscriptions::add(&db, customer, product, base - Duration::days(1), None)
        .await
        .expect("already expired");

    let hits = subscriptions::list_expiring_within(&db, 7, base, 0, 20)
        .await
        .expect("list");
    let dates: Vec<NaiveDate> = hits.iter().map(|d| d.expires_at).collect();
    assert_eq!(dates, vec![base, base + Duration::days(7)]);
}

#[tokio::test]
async fn subscription_search_spans_customer_and_product_fields() {
    let db = setup_db().await;
    let alice = customers::upsert(&db, "alice@example.com", Some("Alice"))
        .await
        .expect("alice");
    let bob = customers::upsert(&db, "bob@example.com", Some("Bob"))
        .await
        .expect("bob");
    let vpn = products::add(&db, "VPN Pro", None).await.expect("vpn");
    let mail = products::add(&db, "Mailbox", None).await.expect("mail");
    subscriptions::add(&db, alice, vpn, today(), None)
        .await
        .expect("sub 1");
    subscriptions::add(&db, bob, mail, today(), None)
        .await
        .expect("sub 2");

    let by_product = subscriptions::list_all_details(&db, Some("vpn"), 0, 10)
        .await
        .expect("by product");
    assert_eq!(by_product.len(), 1);
    assert_eq!(by_product[0].product_name, "VPN Pro");

    let by_name = subscriptions::list_all_details(&db, Some("BOB"), 0, 10)
        .await
        .expect("by name");
    assert_eq!(by_name.len(), 1);
    assert_eq!(by_name[0].customer_email, "bob@example.com");

    assert_eq!(
        subscriptions::count(&db, Some("example.com"))
            .await
            .expect("count"),
        2
    );
}

#[tokio::test]
async fn list_by_customer_orders_by_soonest_expiry() {
    let db = setup_db().await;
    let alice = customers::upsert(&db, "alice@example.com", None)
        .await
        .expect("alice");
    let bob = customers::upsert(&db, "bob@example.com", None)
        .await
        .expect("bob");
    let product = products::add(&db, "VPN", None).await.expect("product");

    let later = subscriptions::add(&db, alice, product, today() + Duration::days(30), None)
        .await
        .expect("later");
    let sooner = subscriptions::add(&db, alice, product, today() + Duration::days(3), None)
        .await
        .expect("sooner");
    subscriptions::add(&db, bob, product, today(), None)
        .await
        .expect("other customer");

    let listed = subscriptions::list_by_customer(&db, alice, 0, 50)
        .await
        .expect("list");
    let ids: Vec<i32> = listed.iter().map(|d| d.id).collect();
    assert_eq!(ids, vec![sooner, later]);
}

#[tokio::test]
async fn update_subscription_rewrites_expiry_and_note() {
    let db = setup_db().await;
    let customer = customers::upsert(&db, "a@example.com", None)
        .await
        .expect("customer");
    let product = products::add(&db, "VPN", None).await.expect("product");
    let sub = subscriptions::add(&db, customer, product, today(), Some("old note"))
        .await
        .expect("subscription");

    let new_date = today() + Duration::days(90);
    subscriptions::update(&db, sub, new_date, None)
        .await
        .expect("update");

    let detail = subscriptions::get_detail(&db, sub)
        .await
        .expect("query")
        .expect("exists");
    assert_eq!(detail.expires_at, new_date);
    assert_eq!(detail.note, None);
}

#[tokio::test]
async fn update_product_surfaces_duplicate_name_as_constraint() {
    let db = setup_db().await;
    let vpn = products::add(&db, "VPN", None).await.expect("vpn");
    products::add(&db, "Mailbox", None).await.expect("mailbox");

    let result = products::update(&db, vpn, "Mailbox", None).await;
    assert!(matches!(result, Err(StoreError::Constraint(_))));
}

// =============================================================================
// Send Guard Tests
// =============================================================================

#[tokio::test]
async fn daily_guard_insert_is_idempotent() {
    let db = setup_db().await;
    let customer = customers::upsert(&db, "a@example.com", None)
        .await
        .expect("customer");
    let product = products::add(&db, "VPN", None).await.expect("product");
    let sub = subscriptions::add(&db, customer, product, today(), None)
        .await
        .expect("subscription");

    assert!(!sends::was_sent_on(&db, sub, today()).await.expect("check"));
    assert!(
        sends::mark_sent_on(&db, sub, today(), Utc::now())
            .await
            .expect("first mark")
    );
    assert!(
        !sends::mark_sent_on(&db, sub, today(), Utc::now())
            .await
            .expect("second mark is a no-op")
    );
    assert!(sends::was_sent_on(&db, sub, today()).await.expect("check"));
    assert_eq!(sends::count_daily_log(&db).await.expect("count"), 1);
}

#[tokio::test]
async fn threshold_ledger_insert_is_idempotent() {
    let db = setup_db().await;
    let customer = customers::upsert(&db, "a@example.com", None)
        .await
        .expect("customer");
    let product = products::add(&db, "VPN", None).await.expect("product");
    let sub = subscriptions::add(&db, customer, product, today(), None)
        .await
        .expect("subscription");

    assert!(
        sends::mark_sent(&db, sub, 7, Utc::now())
            .await
            .expect("first mark")
    );
    assert!(
        !sends::mark_sent(&db, sub, 7, Utc::now())
            .await
            .expect("second mark is a no-op")
    );
    assert!(sends::was_sent(&db, sub, 7).await.expect("check"));
    assert!(!sends::was_sent(&db, sub, 30).await.expect("other threshold"));
}

#[tokio::test]
async fn daily_log_lists_newest_first_with_display_fields() {
    let db = setup_db().await;
    let customer = customers::upsert(&db, "a@example.com", Some("Alice"))
        .await
        .expect("customer");
    let product = products::add(&db, "VPN", None).await.expect("product");
    let sub = subscriptions::add(&db, customer, product, today(), None)
        .await
        .expect("subscription");
    sends::mark_sent_on(&db, sub, today(), Utc::now())
        .await
        .expect("mark");

    let log = sends::list_daily_log(&db, 0, 10).await.expect("log");
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].subscription_id, sub);
    assert_eq!(log[0].customer_email, "a@example.com");
    assert_eq!(log[0].product_name, "VPN");
    assert_eq!(log[0].sent_date, today());
}

// =============================================================================
// Settings Tests
// =============================================================================

#[tokio::test]
async fn defaults_are_seeded_once_and_never_overwritten() {
    let db = setup_db().await;
    settings::ensure_defaults(&db).await.expect("seed");

    let loaded = settings::ReminderSettings::load(&db).await.expect("load");
    assert_eq!(loaded.rules, vec![30, 7, 1, 0]);
    assert_eq!(loaded.auto_threshold(), 30);

    settings::set_rules(&db, vec![7, 30, 7]).await.expect("set");
    settings::ensure_defaults(&db).await.expect("seed again");

    let loaded = settings::ReminderSettings::load(&db).await.expect("reload");
    assert_eq!(loaded.rules, vec![30, 7]);
}

#[tokio::test]
async fn set_rules_rejects_negative_thresholds() {
    let db = setup_db().await;
    let result = settings::set_rules(&db, vec![30, -1]).await;
    assert!(matches!(result, Err(SettingsError::NegativeRule(-1))));
}

#[tokio::test]
async fn set_template_rejects_malformed_syntax() {
    let db = setup_db().await;
    let doc = settings::TemplateDoc {
        subject: "ok".to_string(),
        html: "{% if unclosed %}".to_string(),
    };
    let result = settings::set_email_template(&db, &doc).await;
    assert!(matches!(result, Err(SettingsError::Template(_))));
}
