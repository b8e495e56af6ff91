//! Migration to create the campaign_stats_cache table
//!
//! Last-known statistics per upstream campaign, upserted by campaign uid.

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(CampaignStatsCache::Table)
                    .if_not_exists()
                    .col(pk_auto(CampaignStatsCache::Id))
                    .col(string(CampaignStatsCache::CampaignUid).unique_key())
                    .col(integer(CampaignStatsCache::AccountId))
                    .col(string(CampaignStatsCache::Name))
                    .col(string_null(CampaignStatsCache::Subject))
                    .col(string_null(CampaignStatsCache::Status))
                    .col(timestamp_null(CampaignStatsCache::CreatedAt))
                    .col(timestamp_null(CampaignStatsCache::UpdatedAt))
                    .col(timestamp_null(CampaignStatsCache::DeliveryDate))
                    .col(timestamp_null(CampaignStatsCache::RunAt))
                    .col(text_null(CampaignStatsCache::LastError))
                    .col(json_binary(CampaignStatsCache::DeliveryInfo))
                    .col(timestamp(CampaignStatsCache::CacheUpdatedAt))
                    .to_owned(),
            )
            .await?;

        // Foreign key to acelle_accounts
        manager
            .create_foreign_key(
                ForeignKey::create()
                    .name("fk_campaign_stats_cache_account")
                    .from(CampaignStatsCache::Table, CampaignStatsCache::AccountId)
                    .to(AcelleAccounts::Table, AcelleAccounts::Id)
                    .on_update(ForeignKeyAction::Cascade)
                    .on_delete(ForeignKeyAction::Cascade)
                    .to_owned(),
            )
            .await?;

        // UI reads are per account, newest cache entries first
        manager
            .create_index(
                Index::create()
                    .name("idx_campaign_stats_cache_account_updated")
                    .table(CampaignStatsCache::Table)
                    .col(CampaignStatsCache::AccountId)
                    .col(CampaignStatsCache::CacheUpdatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CampaignStatsCache::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum CampaignStatsCache {
    Table,
    Id,
    CampaignUid,
    AccountId,
    Name,
    Subject,
    Status,
    CreatedAt,
    UpdatedAt,
    DeliveryDate,
    RunAt,
    LastError,
    DeliveryInfo,
    CacheUpdatedAt,
}

#[derive(Iden)]
enum AcelleAccounts {
    Table,
    Id,
}
