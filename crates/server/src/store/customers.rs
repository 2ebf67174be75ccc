use chrono::Utc;
use sea_orm::sea_query::{Expr, ExprTrait, Func, OnConflict};
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, Condition, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
};

use crate::entity::customer;
use crate::error::StoreError;

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn search_filter(q: &str) -> Condition {
    let pattern = format!("%{}%", q.to_lowercase());
    Condition::any()
        .add(
            Func::lower(Expr::col(customer::Column::Email))
                .like(pattern.clone()),
        )
        .add(Func::lower(Expr::col(customer::Column::Name)).like(pattern))
}

/// Inserts a customer or updates the display name of the existing one, keyed
/// by the normalized email. Returns the customer id either way.
pub async fn upsert(
    db: &DatabaseConnection,
    email: &str,
    name: Option<&str>,
) -> Result<i32, StoreError> {
    let email = normalize_email(email);
    if email.is_empty() {
        return Err(StoreError::Constraint(
            "customer email must not be empty".into(),
        ));
    }

    // Upsert and id fetch in one transaction so two writers racing on the
    // same email cannot observe a half-applied state.
    let txn = db.begin().await?;
    customer::Entity::insert(customer::ActiveModel {
        id: ActiveValue::NotSet,
        email: ActiveValue::Set(email.clone()),
        name: ActiveValue::Set(name.map(str::to_string)),
        created_at: ActiveValue::Set(Utc::now()),
    })
    .on_conflict(
        OnConflict::column(customer::Column::Email)
            .update_column(customer::Column::Name)
            .to_owned(),
    )
    .exec(&txn)
    .await?;
    let found = customer::Entity::find()
        .filter(customer::Column::Email.eq(&email))
        .one(&txn)
        .await?
        .ok_or(StoreError::NotFound("customer"))?;
    txn.commit().await?;
    Ok(found.id)
}

pub async fn get(db: &DatabaseConnection, id: i32) -> Result<Option<customer::Model>, StoreError> {
    Ok(customer::Entity::find_by_id(id).one(db).await?)
}

/// Newest-first page; `search` is a case-insensitive substring over email and
/// display name.
pub async fn list(
    db: &DatabaseConnection,
    search: Option<&str>,
    offset: u64,
    limit: u64,
) -> Result<Vec<customer::Model>, StoreError> {
    let mut query = customer::Entity::find();
    if let Some(q) = search.filter(|s| !s.trim().is_empty()) {
        query = query.filter(search_filter(q));
    }
    Ok(query
        .order_by_desc(customer::Column::Id)
        .offset(offset)
        .limit(limit)
        .all(db)
        .await?)
}

pub async fn count(db: &DatabaseConnection, search: Option<&str>) -> Result<u64, StoreError> {
    let mut query = customer::Entity::find();
    if let Some(q) = search.filter(|s| !s.trim().is_empty()) {
        query = query.filter(search_filter(q));
    }
    Ok(query.count(db).await?)
}

/// Rewrites email and display name. A duplicate email surfaces as
/// [`StoreError::Constraint`] for the caller to report.
pub async fn update(
    db: &DatabaseConnection,
    id: i32,
    email: &str,
    name: Option<&str>,
) -> Result<(), StoreError> {
    let email = normalize_email(email);
    if email.is_empty() {
        return Err(StoreError::Constraint(
            "customer email must not be empty".into(),
        ));
    }
    let model = customer::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or(StoreError::NotFound("customer"))?;
    let mut active: customer::ActiveModel = model.into();
    active.email = ActiveValue::Set(email);
    active.name = ActiveValue::Set(name.map(str::to_string));
    active
        .update(db)
        .await
        .map_err(|e| StoreError::classify(e, "update customer"))?;
    Ok(())
}

/// Deletes the customer; subscriptions and their send records go with it via
/// the cascading foreign keys.
pub async fn delete(db: &DatabaseConnection, id: i32) -> Result<(), StoreError> {
    customer::Entity::delete_by_id(id).exec(db).await?;
    Ok(())
}
