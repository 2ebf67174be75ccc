use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::{ConnectionTrait, Statement};

use crate::m20250801_000002_create_catalog_schema::{Products, ReminderSends, Subscriptions};

#[derive(DeriveMigrationName)]
pub struct Migration;

// Replays the legacy dump into the normalized catalog. Every legacy product
// row becomes a subscription against a create-or-find catalog product; the
// legacy per-row content was customer-specific, so it lands on the
// subscription note and the shared catalog content stays NULL.
//
// Rows are walked in ascending id order so the generated subscription ids are
// deterministic across repeated migrations of the same dump, and the
// legacy-id -> subscription-id map built in the first pass drives the audit
// replay in the second. Audit rows pointing at a legacy id with no mapping
// are dropped.
#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        if !manager.has_table("legacy_products").await? {
            return Ok(());
        }

        let conn = manager.get_connection();
        let backend = manager.get_database_backend();

        let has_content = manager.has_column("legacy_products", "content").await?;
        let select_sql = if has_content {
            "SELECT id, customer_id, name, content, expires_at FROM legacy_products ORDER BY id ASC"
        } else {
            "SELECT id, customer_id, name, expires_at FROM legacy_products ORDER BY id ASC"
        };
        let legacy_rows = conn
            .query_all(Statement::from_string(backend, select_sql))
            .await?;

        let mut legacy_to_subscription: HashMap<i32, i32> = HashMap::new();

        for row in &legacy_rows {
            let legacy_id: i32 = row.try_get("", "id")?;
            let customer_id: i32 = row.try_get("", "customer_id")?;
            let name: String = row.try_get::<String>("", "name")?.trim().to_string();
            let note: Option<String> = if has_content {
                row.try_get("", "content")?
            } else {
                None
            };
            let expires_raw: String = row.try_get("", "expires_at")?;
            let expires_at = parse_date(&expires_raw, legacy_id)?;

            let product_id = find_or_create_product(conn, backend, &name).await?;

            let insert = Query::insert()
                .into_table(Subscriptions::Table)
                .columns([
                    Subscriptions::CustomerId,
                    Subscriptions::ProductId,
                    Subscriptions::ExpiresAt,
                    Subscriptions::Note,
                    Subscriptions::CreatedAt,
                ])
                .values_panic([
                    customer_id.into(),
                    product_id.into(),
                    expires_at.into(),
                    note.into(),
                    Utc::now().into(),
                ])
                .returning_col(Subscriptions::Id)
                .to_owned();
            let inserted = conn
                .query_one(backend.build(&insert))
                .await?
                .ok_or_else(|| DbErr::Custom("subscription insert returned no id".into()))?;
            let subscription_id: i32 = inserted.try_get("", "id")?;

            legacy_to_subscription.insert(legacy_id, subscription_id);
        }

        if manager.has_table("legacy_reminder_sends").await? {
            let audit_rows = conn
                .query_all(Statement::from_string(
                    backend,
                    "SELECT product_id, days_before, sent_at FROM legacy_reminder_sends",
                ))
                .await?;
            for row in &audit_rows {
                let legacy_product_id: i32 = row.try_get("", "product_id")?;
                let Some(&subscription_id) = legacy_to_subscription.get(&legacy_product_id) else {
                    continue;
                };
                let days_before: i32 = row.try_get("", "days_before")?;
                let sent_raw: String = row.try_get("", "sent_at")?;
                let sent_at = parse_timestamp(&sent_raw, legacy_product_id)?;

                let insert = Query::insert()
                    .into_table(ReminderSends::Table)
                    .columns([
                        ReminderSends::SubscriptionId,
                        ReminderSends::DaysBefore,
                        ReminderSends::SentAt,
                    ])
                    .values_panic([subscription_id.into(), days_before.into(), sent_at.into()])
                    .on_conflict(
                        OnConflict::columns([
                            ReminderSends::SubscriptionId,
                            ReminderSends::DaysBefore,
                        ])
                        .do_nothing()
                        .to_owned(),
                    )
                    .to_owned();
                conn.execute(backend.build(&insert)).await?;
            }
        }

        Ok(())
    }

    async fn down(&self, _manager: &SchemaManager) -> Result<(), DbErr> {
        // Imported rows are indistinguishable from rows created afterwards;
        // the legacy backup tables remain the source of truth for a re-run.
        Ok(())
    }
}

async fn find_or_create_product<C: ConnectionTrait>(
    conn: &C,
    backend: sea_orm_migration::sea_orm::DatabaseBackend,
    name: &str,
) -> Result<i32, DbErr> {
    let select = Query::select()
        .column(Products::Id)
        .from(Products::Table)
        .and_where(Expr::col(Products::Name).eq(name))
        .to_owned();
    if let Some(row) = conn.query_one(backend.build(&select)).await? {
        return row.try_get("", "id");
    }

    let insert = Query::insert()
        .into_table(Products::Table)
        .columns([Products::Name, Products::Content, Products::CreatedAt])
        .values_panic([
            name.into(),
            Option::<String>::None.into(),
            Utc::now().into(),
        ])
        .returning_col(Products::Id)
        .to_owned();
    let row = conn
        .query_one(backend.build(&insert))
        .await?
        .ok_or_else(|| DbErr::Custom("product insert returned no id".into()))?;
    row.try_get("", "id")
}

fn parse_date(raw: &str, legacy_id: i32) -> Result<NaiveDate, DbErr> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|e| {
        DbErr::Custom(format!(
            "legacy product {legacy_id} has unparsable expiry {raw:?}: {e}"
        ))
    })
}

fn parse_timestamp(raw: &str, legacy_product_id: i32) -> Result<DateTime<Utc>, DbErr> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    // Some dumps wrote naive timestamps without an offset.
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S"))
        .map(|naive| naive.and_utc())
        .map_err(|e| {
            DbErr::Custom(format!(
                "legacy send audit for product {legacy_product_id} has unparsable timestamp {raw:?}: {e}"
            ))
        })
}
