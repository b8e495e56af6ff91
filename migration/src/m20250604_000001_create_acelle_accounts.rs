//! Migration to create the acelle_accounts table
//!
//! One row per tenant credential set for the Acelle email-marketing API.

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AcelleAccounts::Table)
                    .if_not_exists()
                    .col(pk_auto(AcelleAccounts::Id))
                    .col(string(AcelleAccounts::Name).unique_key())
                    .col(string(AcelleAccounts::ApiEndpoint))
                    .col(string(AcelleAccounts::ApiToken))
                    .col(string(AcelleAccounts::Status).default("active"))
                    .col(integer(AcelleAccounts::CachePriority).default(0))
                    .col(timestamp_null(AcelleAccounts::LastSyncDate))
                    .col(text_null(AcelleAccounts::LastSyncError))
                    .col(timestamp(AcelleAccounts::CreatedAt).default(Expr::current_timestamp()))
                    .col(timestamp(AcelleAccounts::UpdatedAt).default(Expr::current_timestamp()))
                    .to_owned(),
            )
            .await?;

        // Sync planning filters on status and orders by priority
        manager
            .create_index(
                Index::create()
                    .name("idx_acelle_accounts_status_priority")
                    .table(AcelleAccounts::Table)
                    .col(AcelleAccounts::Status)
                    .col(AcelleAccounts::CachePriority)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AcelleAccounts::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum AcelleAccounts {
    Table,
    Id,
    Name,
    ApiEndpoint,
    ApiToken,
    Status,
    CachePriority,
    LastSyncDate,
    LastSyncError,
    CreatedAt,
    UpdatedAt,
}
