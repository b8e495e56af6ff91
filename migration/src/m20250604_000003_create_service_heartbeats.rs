//! Migration to create the service_heartbeats table
//!
//! Liveness records written by the proxy gateway so an external monitor can
//! detect a hung or cold-started instance.

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ServiceHeartbeats::Table)
                    .if_not_exists()
                    .col(pk_auto(ServiceHeartbeats::Id))
                    .col(string(ServiceHeartbeats::FunctionName).unique_key())
                    .col(timestamp(ServiceHeartbeats::LastHeartbeat))
                    .col(string(ServiceHeartbeats::Status))
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ServiceHeartbeats::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum ServiceHeartbeats {
    Table,
    Id,
    FunctionName,
    LastHeartbeat,
    Status,
}
