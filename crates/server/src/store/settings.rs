use sea_orm::sea_query::OnConflict;
use sea_orm::{ActiveValue, DatabaseConnection, EntityTrait};

use crate::entity::setting;
use crate::error::StoreError;

pub async fn get(db: &DatabaseConnection, key: &str) -> Result<Option<String>, StoreError> {
    Ok(setting::Entity::find_by_id(key)
        .one(db)
        .await?
        .map(|m| m.value))
}

pub async fn set(db: &DatabaseConnection, key: &str, value: &str) -> Result<(), StoreError> {
    setting::Entity::insert(setting::ActiveModel {
        key: ActiveValue::Set(key.to_string()),
        value: ActiveValue::Set(value.to_string()),
    })
    .on_conflict(
        OnConflict::column(setting::Column::Key)
            .update_column(setting::Column::Value)
            .to_owned(),
    )
    .exec(db)
    .await?;
    Ok(())
}
