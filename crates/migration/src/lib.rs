pub use sea_orm_migration::prelude::*;

mod m20250801_000001_upgrade_legacy_products;
mod m20250801_000002_create_catalog_schema;
mod m20250801_000003_import_legacy_data;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250801_000001_upgrade_legacy_products::Migration),
            Box::new(m20250801_000002_create_catalog_schema::Migration),
            Box::new(m20250801_000003_import_legacy_data::Migration),
        ]
    }
}
