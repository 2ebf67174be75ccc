use chrono::{Duration, NaiveDate, Utc};
use sea_orm::sea_query::{Expr, ExprTrait, Func};
use sea_orm::{
    ActiveValue, ColumnTrait, Condition, DatabaseConnection, EntityTrait, FromQueryResult,
    JoinType, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait,
    prelude::DateTimeUtc,
};
use serde::Serialize;

use crate::entity::{customer, product, subscription};
use crate::error::StoreError;

/// A subscription row joined with the customer and product display fields the
/// engine and the reports need.
#[derive(Clone, Debug, FromQueryResult, Serialize)]
pub struct SubscriptionDetail {
    pub id: i32,
    pub customer_id: i32,
    pub product_id: i32,
    pub expires_at: NaiveDate,
    pub note: Option<String>,
    pub created_at: DateTimeUtc,
    pub customer_email: String,
    pub customer_name: Option<String>,
    pub product_name: String,
    pub product_content: Option<String>,
}

fn detail_select() -> sea_orm::Select<subscription::Entity> {
    subscription::Entity::find()
        .join(JoinType::InnerJoin, subscription::Relation::Customer.def())
        .join(JoinType::InnerJoin, subscription::Relation::Product.def())
        .column_as(customer::Column::Email, "customer_email")
        .column_as(customer::Column::Name, "customer_name")
        .column_as(product::Column::Name, "product_name")
        .column_as(product::Column::Content, "product_content")
}

fn search_filter(q: &str) -> Condition {
    let pattern = format!("%{}%", q.to_lowercase());
    Condition::any()
        .add(
            Func::lower(Expr::col((customer::Entity, customer::Column::Email)))
                .like(pattern.clone()),
        )
        .add(
            Func::lower(Expr::col((customer::Entity, customer::Column::Name)))
                .like(pattern.clone()),
        )
        .add(Func::lower(Expr::col((product::Entity, product::Column::Name))).like(pattern))
}

/// Inserts a subscription. A missing customer or product surfaces as
/// [`StoreError::Reference`] via the referential-integrity check.
pub async fn add(
    db: &DatabaseConnection,
    customer_id: i32,
    product_id: i32,
    expires_at: NaiveDate,
    note: Option<&str>,
) -> Result<i32, StoreError> {
    let inserted = subscription::Entity::insert(subscription::ActiveModel {
        id: ActiveValue::NotSet,
        customer_id: ActiveValue::Set(customer_id),
        product_id: ActiveValue::Set(product_id),
        expires_at: ActiveValue::Set(expires_at),
        note: ActiveValue::Set(note.map(str::to_string)),
        created_at: ActiveValue::Set(Utc::now()),
    })
    .exec(db)
    .await
    .map_err(|e| StoreError::classify(e, "add subscription"))?;
    Ok(inserted.last_insert_id)
}

/// Renewal is an in-place expiry mutation; no history of previous values is
/// kept beyond the send audit already written.
pub async fn update_expiry(
    db: &DatabaseConnection,
    id: i32,
    new_expires_at: NaiveDate,
) -> Result<(), StoreError> {
    let result = subscription::Entity::update_many()
        .col_expr(subscription::Column::ExpiresAt, Expr::value(new_expires_at))
        .filter(subscription::Column::Id.eq(id))
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        return Err(StoreError::NotFound("subscription"));
    }
    Ok(())
}

pub async fn update(
    db: &DatabaseConnection,
    id: i32,
    new_expires_at: NaiveDate,
    note: Option<&str>,
) -> Result<(), StoreError> {
    let result = subscription::Entity::update_many()
        .col_expr(subscription::Column::ExpiresAt, Expr::value(new_expires_at))
        .col_expr(
            subscription::Column::Note,
            Expr::value(note.map(str::to_string)),
        )
        .filter(subscription::Column::Id.eq(id))
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        return Err(StoreError::NotFound("subscription"));
    }
    Ok(())
}

pub async fn delete(db: &DatabaseConnection, id: i32) -> Result<(), StoreError> {
    subscription::Entity::delete_by_id(id).exec(db).await?;
    Ok(())
}

pub async fn get_detail(
    db: &DatabaseConnection,
    id: i32,
) -> Result<Option<SubscriptionDetail>, StoreError> {
    Ok(detail_select()
        .filter(subscription::Column::Id.eq(id))
        .into_model::<SubscriptionDetail>()
        .one(db)
        .await?)
}

pub async fn list_by_customer(
    db: &DatabaseConnection,
    customer_id: i32,
    offset: u64,
    limit: u64,
) -> Result<Vec<SubscriptionDetail>, StoreError> {
    Ok(detail_select()
        .filter(subscription::Column::CustomerId.eq(customer_id))
        .order_by_asc(subscription::Column::ExpiresAt)
        .offset(offset)
        .limit(limit)
        .into_model::<SubscriptionDetail>()
        .all(db)
        .await?)
}

/// The full joined view, soonest expiry first. This is both the reporting
/// list and the scan's candidate set.
pub async fn list_all_details(
    db: &DatabaseConnection,
    search: Option<&str>,
    offset: u64,
    limit: u64,
) -> Result<Vec<SubscriptionDetail>, StoreError> {
    let mut query = detail_select();
    if let Some(q) = search.filter(|s| !s.trim().is_empty()) {
        query = query.filter(search_filter(q));
    }
    Ok(query
        .order_by_asc(subscription::Column::ExpiresAt)
        .offset(offset)
        .limit(limit)
        .into_model::<SubscriptionDetail>()
        .all(db)
        .await?)
}

pub async fn count(db: &DatabaseConnection, search: Option<&str>) -> Result<u64, StoreError> {
    let mut query = subscription::Entity::find()
        .join(JoinType::InnerJoin, subscription::Relation::Customer.def())
        .join(JoinType::InnerJoin, subscription::Relation::Product.def());
    if let Some(q) = search.filter(|s| !s.trim().is_empty()) {
        query = query.filter(search_filter(q));
    }
    Ok(query.count(db).await?)
}

/// Subscriptions whose expiry falls within `[today, today + days]` inclusive.
pub async fn list_expiring_within(
    db: &DatabaseConnection,
    days: i64,
    today: NaiveDate,
    offset: u64,
    limit: u64,
) -> Result<Vec<SubscriptionDetail>, StoreError> {
    let end = today + Duration::days(days);
    Ok(detail_select()
        .filter(subscription::Column::ExpiresAt.gte(today))
        .filter(subscription::Column::ExpiresAt.lte(end))
        .order_by_asc(subscription::Column::ExpiresAt)
        .offset(offset)
        .limit(limit)
        .into_model::<SubscriptionDetail>()
        .all(db)
        .await?)
}
