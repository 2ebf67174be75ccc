use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

// Detects the pre-catalog schema, where a `products` table embedded the
// customer reference and expiry date directly, and moves it aside under a
// backup name so the current schema can be created under the original table
// names. The data itself is replayed by the import migration.
#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Legacy shape: `products` carries customer_id/expires_at/name and the
        // normalized `subscriptions` table does not exist yet.
        if !manager.has_table("products").await? || manager.has_table("subscriptions").await? {
            return Ok(());
        }
        let legacy_like = manager.has_column("products", "customer_id").await?
            && manager.has_column("products", "expires_at").await?
            && manager.has_column("products", "name").await?;
        if !legacy_like {
            return Ok(());
        }

        // A leftover backup means a prior run was aborted before the import
        // committed; replace it rather than migrating the same dump twice.
        if manager.has_table("legacy_products").await? {
            manager
                .drop_table(
                    Table::drop()
                        .table(Alias::new("legacy_products"))
                        .to_owned(),
                )
                .await?;
        }
        manager
            .rename_table(
                Table::rename()
                    .table(Alias::new("products"), Alias::new("legacy_products"))
                    .to_owned(),
            )
            .await?;

        if manager.has_table("reminder_sends").await?
            && !manager.has_table("legacy_reminder_sends").await?
        {
            manager
                .rename_table(
                    Table::rename()
                        .table(
                            Alias::new("reminder_sends"),
                            Alias::new("legacy_reminder_sends"),
                        )
                        .to_owned(),
                )
                .await?;
        }

        Ok(())
    }

    async fn down(&self, _manager: &SchemaManager) -> Result<(), DbErr> {
        // The renamed tables are the backup of the legacy data; there is no
        // safe way to undo this step.
        Ok(())
    }
}
