//! Send-audit primitives: the daily guard and the legacy per-threshold
//! ledger. Both are insert-only; marking an already-marked pair is a silent
//! no-op, which is what makes re-running a scan on the same day safe.

use chrono::NaiveDate;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveValue, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, FromQueryResult, JoinType,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait, prelude::DateTimeUtc,
};
use serde::Serialize;

use crate::entity::{customer, product, reminder_daily_send, reminder_send, subscription};
use crate::error::StoreError;

pub async fn was_sent_on(
    db: &DatabaseConnection,
    subscription_id: i32,
    date: NaiveDate,
) -> Result<bool, StoreError> {
    let count = reminder_daily_send::Entity::find()
        .filter(reminder_daily_send::Column::SubscriptionId.eq(subscription_id))
        .filter(reminder_daily_send::Column::SentDate.eq(date))
        .count(db)
        .await?;
    Ok(count > 0)
}

/// Atomic insert-if-absent for the daily guard. Returns whether this call
/// inserted the record; `false` means the pair already existed.
pub async fn mark_sent_on(
    db: &DatabaseConnection,
    subscription_id: i32,
    date: NaiveDate,
    sent_at: DateTimeUtc,
) -> Result<bool, StoreError> {
    let result = reminder_daily_send::Entity::insert(reminder_daily_send::ActiveModel {
        id: ActiveValue::NotSet,
        subscription_id: ActiveValue::Set(subscription_id),
        sent_date: ActiveValue::Set(date),
        sent_at: ActiveValue::Set(sent_at),
    })
    .on_conflict(
        OnConflict::columns([
            reminder_daily_send::Column::SubscriptionId,
            reminder_daily_send::Column::SentDate,
        ])
        .do_nothing()
        .to_owned(),
    )
    .exec(db)
    .await;
    match result {
        Ok(_) => Ok(true),
        Err(DbErr::RecordNotInserted) => Ok(false),
        Err(e) => Err(StoreError::classify(e, "mark daily send")),
    }
}

pub async fn was_sent(
    db: &DatabaseConnection,
    subscription_id: i32,
    days_before: i32,
) -> Result<bool, StoreError> {
    let count = reminder_send::Entity::find()
        .filter(reminder_send::Column::SubscriptionId.eq(subscription_id))
        .filter(reminder_send::Column::DaysBefore.eq(days_before))
        .count(db)
        .await?;
    Ok(count > 0)
}

pub async fn mark_sent(
    db: &DatabaseConnection,
    subscription_id: i32,
    days_before: i32,
    sent_at: DateTimeUtc,
) -> Result<bool, StoreError> {
    let result = reminder_send::Entity::insert(reminder_send::ActiveModel {
        id: ActiveValue::NotSet,
        subscription_id: ActiveValue::Set(subscription_id),
        days_before: ActiveValue::Set(days_before),
        sent_at: ActiveValue::Set(sent_at),
    })
    .on_conflict(
        OnConflict::columns([
            reminder_send::Column::SubscriptionId,
            reminder_send::Column::DaysBefore,
        ])
        .do_nothing()
        .to_owned(),
    )
    .exec(db)
    .await;
    match result {
        Ok(_) => Ok(true),
        Err(DbErr::RecordNotInserted) => Ok(false),
        Err(e) => Err(StoreError::classify(e, "mark threshold send")),
    }
}

/// One line of the daily send audit export.
#[derive(Clone, Debug, FromQueryResult, Serialize)]
pub struct DailySendLogEntry {
    pub sent_date: NaiveDate,
    pub sent_at: DateTimeUtc,
    pub subscription_id: i32,
    pub customer_email: String,
    pub customer_name: Option<String>,
    pub product_name: String,
    pub expires_at: NaiveDate,
}

/// Newest-first dump of the daily ledger joined with display fields.
pub async fn list_daily_log(
    db: &DatabaseConnection,
    offset: u64,
    limit: u64,
) -> Result<Vec<DailySendLogEntry>, StoreError> {
    Ok(reminder_daily_send::Entity::find()
        .join(
            JoinType::InnerJoin,
            reminder_daily_send::Relation::Subscription.def(),
        )
        .join(JoinType::InnerJoin, subscription::Relation::Customer.def())
        .join(JoinType::InnerJoin, subscription::Relation::Product.def())
        .select_only()
        .columns([
            reminder_daily_send::Column::SentDate,
            reminder_daily_send::Column::SentAt,
            reminder_daily_send::Column::SubscriptionId,
        ])
        .column_as(customer::Column::Email, "customer_email")
        .column_as(customer::Column::Name, "customer_name")
        .column_as(product::Column::Name, "product_name")
        .column_as(subscription::Column::ExpiresAt, "expires_at")
        .order_by_desc(reminder_daily_send::Column::SentAt)
        .offset(offset)
        .limit(limit)
        .into_model::<DailySendLogEntry>()
        .all(db)
        .await?)
}

pub async fn count_daily_log(db: &DatabaseConnection) -> Result<u64, StoreError> {
    Ok(reminder_daily_send::Entity::find().count(db).await?)
}
