use chrono::Utc;
use sea_orm::sea_query::{Expr, ExprTrait, Func};
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
};

use crate::entity::{product, subscription};
use crate::error::StoreError;

fn name_filter(q: &str) -> sea_orm::sea_query::SimpleExpr {
    Func::lower(Expr::col(product::Column::Name)).like(format!("%{}%", q.to_lowercase()))
}

/// Inserts a product or, when the trimmed name already exists, updates the
/// shared content only if the new content is non-empty. A name collision
/// never blanks an existing description. Returns the product id.
pub async fn upsert_by_name(
    db: &DatabaseConnection,
    name: &str,
    content: Option<&str>,
) -> Result<i32, StoreError> {
    let name = name.trim();
    let txn = db.begin().await?;

    let existing = product::Entity::find()
        .filter(product::Column::Name.eq(name))
        .one(&txn)
        .await?;
    let id = match existing {
        Some(model) => {
            let id = model.id;
            if let Some(new_content) = content.filter(|c| !c.trim().is_empty()) {
                let mut active: product::ActiveModel = model.into();
                active.content = ActiveValue::Set(Some(new_content.to_string()));
                active.update(&txn).await?;
            }
            id
        }
        None => {
            let inserted = product::Entity::insert(product::ActiveModel {
                id: ActiveValue::NotSet,
                name: ActiveValue::Set(name.to_string()),
                content: ActiveValue::Set(content.map(str::to_string)),
                created_at: ActiveValue::Set(Utc::now()),
            })
            .exec(&txn)
            .await
            .map_err(|e| StoreError::classify(e, "add product"))?;
            inserted.last_insert_id
        }
    };
    txn.commit().await?;
    Ok(id)
}

pub async fn add(
    db: &DatabaseConnection,
    name: &str,
    content: Option<&str>,
) -> Result<i32, StoreError> {
    upsert_by_name(db, name, content).await
}

pub async fn get(db: &DatabaseConnection, id: i32) -> Result<Option<product::Model>, StoreError> {
    Ok(product::Entity::find_by_id(id).one(db).await?)
}

pub async fn list(
    db: &DatabaseConnection,
    search: Option<&str>,
    offset: u64,
    limit: u64,
) -> Result<Vec<product::Model>, StoreError> {
    let mut query = product::Entity::find();
    if let Some(q) = search.filter(|s| !s.trim().is_empty()) {
        query = query.filter(name_filter(q));
    }
    Ok(query
        .order_by_desc(product::Column::Id)
        .offset(offset)
        .limit(limit)
        .all(db)
        .await?)
}

pub async fn count(db: &DatabaseConnection, search: Option<&str>) -> Result<u64, StoreError> {
    let mut query = product::Entity::find();
    if let Some(q) = search.filter(|s| !s.trim().is_empty()) {
        query = query.filter(name_filter(q));
    }
    Ok(query.count(db).await?)
}

pub async fn update(
    db: &DatabaseConnection,
    id: i32,
    name: &str,
    content: Option<&str>,
) -> Result<(), StoreError> {
    let model = product::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or(StoreError::NotFound("product"))?;
    let mut active: product::ActiveModel = model.into();
    active.name = ActiveValue::Set(name.trim().to_string());
    active.content = ActiveValue::Set(content.map(str::to_string));
    active
        .update(db)
        .await
        .map_err(|e| StoreError::classify(e, "update product"))?;
    Ok(())
}

pub async fn subscription_count(db: &DatabaseConnection, id: i32) -> Result<u64, StoreError> {
    Ok(subscription::Entity::find()
        .filter(subscription::Column::ProductId.eq(id))
        .count(db)
        .await?)
}

/// Deletes the product unless any subscription still references it, in which
/// case nothing is deleted and `false` comes back. The reference check and
/// the delete share one transaction.
pub async fn delete(db: &DatabaseConnection, id: i32) -> Result<bool, StoreError> {
    let txn = db.begin().await?;
    let references = subscription::Entity::find()
        .filter(subscription::Column::ProductId.eq(id))
        .count(&txn)
        .await?;
    if references > 0 {
        txn.rollback().await?;
        return Ok(false);
    }
    product::Entity::delete_by_id(id).exec(&txn).await?;
    txn.commit().await?;
    Ok(true)
}
