use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // `if_not_exists` throughout: a legacy dump already carries a
        // `customers` table in the current shape, and the whole schema is
        // recreated on every fresh database.
        manager
            .create_table(
                Table::create()
                    .table(Customers::Table)
                    .if_not_exists()
                    .col(pk_auto(Customers::Id))
                    .col(string(Customers::Email).unique_key().to_owned())
                    .col(string_null(Customers::Name))
                    .col(
                        timestamp_with_time_zone(Customers::CreatedAt)
                            .default(Expr::current_timestamp())
                            .to_owned(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Products::Table)
                    .if_not_exists()
                    .col(pk_auto(Products::Id))
                    .col(string(Products::Name).unique_key().to_owned())
                    .col(text_null(Products::Content))
                    .col(
                        timestamp_with_time_zone(Products::CreatedAt)
                            .default(Expr::current_timestamp())
                            .to_owned(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Subscriptions::Table)
                    .if_not_exists()
                    .col(pk_auto(Subscriptions::Id))
                    .col(integer(Subscriptions::CustomerId))
                    .col(integer(Subscriptions::ProductId))
                    .col(date(Subscriptions::ExpiresAt))
                    .col(text_null(Subscriptions::Note))
                    .col(
                        timestamp_with_time_zone(Subscriptions::CreatedAt)
                            .default(Expr::current_timestamp())
                            .to_owned(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_subscriptions_customer")
                            .from(Subscriptions::Table, Subscriptions::CustomerId)
                            .to(Customers::Table, Customers::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_subscriptions_product")
                            .from(Subscriptions::Table, Subscriptions::ProductId)
                            .to(Products::Table, Products::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Settings::Table)
                    .if_not_exists()
                    .col(string(Settings::Key).primary_key().to_owned())
                    .col(text(Settings::Value))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ReminderSends::Table)
                    .if_not_exists()
                    .col(pk_auto(ReminderSends::Id))
                    .col(integer(ReminderSends::SubscriptionId))
                    .col(integer(ReminderSends::DaysBefore))
                    .col(timestamp_with_time_zone(ReminderSends::SentAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_reminder_sends_subscription")
                            .from(ReminderSends::Table, ReminderSends::SubscriptionId)
                            .to(Subscriptions::Table, Subscriptions::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_reminder_sends_unique")
                    .table(ReminderSends::Table)
                    .col(ReminderSends::SubscriptionId)
                    .col(ReminderSends::DaysBefore)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ReminderDailySends::Table)
                    .if_not_exists()
                    .col(pk_auto(ReminderDailySends::Id))
                    .col(integer(ReminderDailySends::SubscriptionId))
                    .col(date(ReminderDailySends::SentDate))
                    .col(timestamp_with_time_zone(ReminderDailySends::SentAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_reminder_daily_sends_subscription")
                            .from(
                                ReminderDailySends::Table,
                                ReminderDailySends::SubscriptionId,
                            )
                            .to(Subscriptions::Table, Subscriptions::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_reminder_daily_sends_unique")
                    .table(ReminderDailySends::Table)
                    .col(ReminderDailySends::SubscriptionId)
                    .col(ReminderDailySends::SentDate)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_subscriptions_expires")
                    .table(Subscriptions::Table)
                    .col(Subscriptions::ExpiresAt)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_subscriptions_customer")
                    .table(Subscriptions::Table)
                    .col(Subscriptions::CustomerId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_subscriptions_product")
                    .table(Subscriptions::Table)
                    .col(Subscriptions::ProductId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_reminder_daily_sends_date")
                    .table(ReminderDailySends::Table)
                    .col(ReminderDailySends::SentDate)
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ReminderDailySends::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ReminderSends::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Settings::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Subscriptions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Products::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Customers::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub(crate) enum Customers {
    Table,
    Id,
    Email,
    Name,
    CreatedAt,
}

#[derive(Iden)]
pub(crate) enum Products {
    Table,
    Id,
    Name,
    Content,
    CreatedAt,
}

#[derive(Iden)]
pub(crate) enum Subscriptions {
    Table,
    Id,
    CustomerId,
    ProductId,
    ExpiresAt,
    Note,
    CreatedAt,
}

#[derive(Iden)]
pub(crate) enum Settings {
    Table,
    Key,
    Value,
}

#[derive(Iden)]
pub(crate) enum ReminderSends {
    Table,
    Id,
    SubscriptionId,
    DaysBefore,
    SentAt,
}

#[derive(Iden)]
pub(crate) enum ReminderDailySends {
    Table,
    Id,
    SubscriptionId,
    SentDate,
    SentAt,
}
