//! Campaign statistics cache store
//!
//! Persisted last-known statistics per campaign, keyed by campaign uid. The
//! sync orchestrator is the only writer; UI consumers read rows as-is and
//! decide for themselves whether `cache_updated_at` is fresh enough.

use chrono::{NaiveDateTime, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, Order, QueryFilter, QueryOrder, Set,
};

use crate::entities::campaign_stats_cache::{self, Entity as CampaignStatsCache};
use crate::models::acelle::CampaignSummary;
use crate::models::stats::CampaignStatistics;

/// Upsert one campaign's statistics, keyed by campaign uid.
///
/// The whole row is replaced; statistics are never patched in place. Atomicity
/// comes from the database's native on-conflict upsert, no app-level locking.
pub async fn upsert_campaign(
    db: &DatabaseConnection,
    account_id: i32,
    campaign: &CampaignSummary,
    stats: &CampaignStatistics,
) -> Result<(), DbErr> {
    let delivery_info = serde_json::to_value(stats)
        .map_err(|e| DbErr::Custom(format!("Failed to serialize statistics: {}", e)))?;

    let row = campaign_stats_cache::ActiveModel {
        campaign_uid: Set(campaign.uid.clone()),
        account_id: Set(account_id),
        name: Set(campaign.name.clone().unwrap_or_else(|| campaign.uid.clone())),
        subject: Set(campaign.subject.clone()),
        status: Set(campaign.status.clone()),
        created_at: Set(campaign.created_at.as_deref().and_then(parse_datetime)),
        updated_at: Set(campaign.updated_at.as_deref().and_then(parse_datetime)),
        delivery_date: Set(campaign.delivery_date.as_deref().and_then(parse_datetime)),
        run_at: Set(campaign.run_at.as_deref().and_then(parse_datetime)),
        last_error: Set(campaign.last_error.clone()),
        delivery_info: Set(delivery_info),
        cache_updated_at: Set(Utc::now().naive_utc()),
        ..Default::default()
    };

    CampaignStatsCache::insert(row)
        .on_conflict(
            OnConflict::column(campaign_stats_cache::Column::CampaignUid)
                .update_columns([
                    campaign_stats_cache::Column::AccountId,
                    campaign_stats_cache::Column::Name,
                    campaign_stats_cache::Column::Subject,
                    campaign_stats_cache::Column::Status,
                    campaign_stats_cache::Column::CreatedAt,
                    campaign_stats_cache::Column::UpdatedAt,
                    campaign_stats_cache::Column::DeliveryDate,
                    campaign_stats_cache::Column::RunAt,
                    campaign_stats_cache::Column::LastError,
                    campaign_stats_cache::Column::DeliveryInfo,
                    campaign_stats_cache::Column::CacheUpdatedAt,
                ])
                .to_owned(),
        )
        .exec(db)
        .await?;

    Ok(())
}

/// Cached rows for one account, most recently refreshed first.
pub async fn list_for_account(
    db: &DatabaseConnection,
    account_id: i32,
) -> Result<Vec<campaign_stats_cache::Model>, DbErr> {
    CampaignStatsCache::find()
        .filter(campaign_stats_cache::Column::AccountId.eq(account_id))
        .order_by(campaign_stats_cache::Column::CacheUpdatedAt, Order::Desc)
        .all(db)
        .await
}

pub async fn find_by_uid(
    db: &DatabaseConnection,
    campaign_uid: &str,
) -> Result<Option<campaign_stats_cache::Model>, DbErr> {
    CampaignStatsCache::find()
        .filter(campaign_stats_cache::Column::CampaignUid.eq(campaign_uid))
        .one(db)
        .await
}

/// Parse the timestamp formats Acelle installations emit.
fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .or_else(|| {
            chrono::DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.naive_utc())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_datetime_acelle_format() {
        let parsed = parse_datetime("2025-03-14 09:30:00").unwrap();
        assert_eq!(parsed.format("%Y-%m-%d %H:%M:%S").to_string(), "2025-03-14 09:30:00");
    }

    #[test]
    fn test_parse_datetime_iso_formats() {
        assert!(parse_datetime("2025-03-14T09:30:00").is_some());
        assert!(parse_datetime("2025-03-14T09:30:00+02:00").is_some());
    }

    #[test]
    fn test_parse_datetime_garbage_is_none() {
        assert!(parse_datetime("").is_none());
        assert!(parse_datetime("yesterday").is_none());
        assert!(parse_datetime("2025-13-40 99:00:00").is_none());
    }
}
