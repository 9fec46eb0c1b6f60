use crate::entity_iden::EntityIden;
use model::entities::prelude::*;
use model::entities::{budget, transaction, user};
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create budgets table
        manager
            .create_table(
                Table::create()
                    .table(Budget::table())
                    .if_not_exists()
                    .col(pk_auto(Budget::column(budget::Column::Id)))
                    .col(integer(Budget::column(budget::Column::UserId)).unique_key())
                    .col(decimal(Budget::column(budget::Column::Amount)).decimal_len(16, 4))
                    .col(timestamp_with_time_zone_null(Budget::column(
                        budget::Column::LastAlertSent,
                    )))
                    .col(timestamp_with_time_zone(Budget::column(budget::Column::CreatedAt)))
                    .col(timestamp_with_time_zone(Budget::column(budget::Column::UpdatedAt)))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_budgets_user")
                            .from(Budget::table(), Budget::column(budget::Column::UserId))
                            .to(User::table(), User::column(user::Column::Id))
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Serves the daily due-transaction scan
        manager
            .create_index(
                Index::create()
                    .name("idx_transactions_recurring_due")
                    .table(Transaction::table())
                    .col(Transaction::column(transaction::Column::IsRecurring))
                    .col(Transaction::column(transaction::Column::Status))
                    .col(Transaction::column(transaction::Column::NextRecurringDate))
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_transactions_recurring_due")
                    .table(Transaction::table())
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(Budget::table()).to_owned())
            .await?;

        Ok(())
    }
}
