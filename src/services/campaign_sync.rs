//! Campaign statistics sync orchestrator
//!
//! Per active account: verify the gateway connection (with one token-refresh
//! retry), paginate the upstream campaign list, normalize each campaign's
//! statistics, and upsert them into the cache store. Accounts are processed
//! strictly sequentially in cache-priority order so a slow installation
//! delays, but never corrupts, the next one.

use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, DbErr, EntityTrait, Set};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entities::acelle_accounts::{self, status, Entity as AcelleAccounts};
use crate::models::acelle::CampaignSummary;
use crate::services::acelle_client::{AcelleClient, CAMPAIGN_PAGE_SIZE};
use crate::services::availability::AvailabilityMonitor;
use crate::services::{stats_cache, stats_normalizer};

/// Fixed operation id for progress events, so UI listeners can replace a
/// previous notification instead of stacking a new one per run.
pub const SYNC_OPERATION_ID: &str = "acelle-campaign-sync";

/// Page size used by the forced server-side batch resync.
const FULL_LIST_PAGE_SIZE: usize = 1000;

#[derive(Debug)]
pub enum CampaignSyncError {
    /// Connection test failed twice (initial attempt + post-refresh retry)
    ConnectionFailed(String),
    /// The very first campaign page could not be fetched
    FirstPageFailed(String),
    /// Cache upsert or account bookkeeping failed
    Persistence(String),
}

impl std::fmt::Display for CampaignSyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CampaignSyncError::ConnectionFailed(msg) => write!(f, "Connection failed: {}", msg),
            CampaignSyncError::FirstPageFailed(msg) => {
                write!(f, "Campaign list fetch failed: {}", msg)
            }
            CampaignSyncError::Persistence(msg) => write!(f, "Persistence error: {}", msg),
        }
    }
}

impl std::error::Error for CampaignSyncError {}

/// Report for one account's sync run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncOutcome {
    pub account_id: i32,
    pub account_name: String,
    pub campaigns_synced: u64,
    pub pages_fetched: u32,
    /// Whether the connection phase needed the one permitted retry
    pub retried_connection: bool,
    /// True when a mid-pagination failure truncated the campaign list
    pub partial: bool,
    pub error: Option<String>,
}

/// Sync one account end to end, recording the outcome on the account row.
///
/// Never returns an error: failures land in the outcome's `error` field and
/// in the account's `last_sync_error`, since one bad account must not abort
/// a batch.
pub async fn sync_account(
    db: &DatabaseConnection,
    client: &AcelleClient,
    monitor: &AvailabilityMonitor,
    account: &acelle_accounts::Model,
) -> SyncOutcome {
    tracing::info!(
        operation = SYNC_OPERATION_ID,
        "Starting campaign sync for account '{}' ({})",
        account.name,
        account.api_endpoint
    );

    let mut outcome = SyncOutcome {
        account_id: account.id,
        account_name: account.name.clone(),
        campaigns_synced: 0,
        pages_fetched: 0,
        retried_connection: false,
        partial: false,
        error: None,
    };

    // Connecting
    if let Err(e) = connect_with_retry(client, monitor, account, &mut outcome).await {
        return fail(db, account, outcome, e.to_string()).await;
    }

    // Paginating
    let (campaigns, pages, partial) = match fetch_all_campaigns(client, account).await {
        Ok(result) => result,
        Err(e) => return fail(db, account, outcome, e.to_string()).await,
    };
    outcome.pages_fetched = pages;
    outcome.partial = partial;

    tracing::info!(
        operation = SYNC_OPERATION_ID,
        "Fetched {} campaigns over {} pages for '{}'{}",
        campaigns.len(),
        pages,
        account.name,
        if partial { " (truncated by a page error)" } else { "" }
    );

    // Persisting
    for campaign in &campaigns {
        let raw = resolve_raw_statistics(client, account, campaign).await;
        let stats = stats_normalizer::normalize(&raw, false);

        if let Err(e) = stats_cache::upsert_campaign(db, account.id, campaign, &stats).await {
            let error = CampaignSyncError::Persistence(e.to_string());
            return fail(db, account, outcome, error.to_string()).await;
        }
        outcome.campaigns_synced += 1;
    }

    if let Err(e) = mark_sync_success(db, account).await {
        tracing::error!("Failed to record sync success for '{}': {}", account.name, e);
    }

    tracing::info!(
        operation = SYNC_OPERATION_ID,
        "Campaign sync complete for '{}': {} campaigns cached",
        account.name,
        outcome.campaigns_synced
    );
    outcome
}

/// Connection test with the one permitted retry after a forced availability
/// refresh (fresh token + gateway re-wake).
async fn connect_with_retry(
    client: &AcelleClient,
    monitor: &AvailabilityMonitor,
    account: &acelle_accounts::Model,
    outcome: &mut SyncOutcome,
) -> Result<(), CampaignSyncError> {
    let first_failure = match client.test_connection(account).await {
        Ok(result) if result.success => return Ok(()),
        Ok(result) => result.message,
        Err(e) => e.to_string(),
    };

    tracing::warn!(
        "Connection test failed for '{}', re-waking services and retrying once: {}",
        account.name,
        first_failure
    );
    outcome.retried_connection = true;
    monitor.ensure_available(true).await;

    match client.test_connection(account).await {
        Ok(result) if result.success => Ok(()),
        Ok(result) => Err(CampaignSyncError::ConnectionFailed(result.message)),
        Err(e) => Err(CampaignSyncError::ConnectionFailed(e.to_string())),
    }
}

/// Sequential pagination of the full campaign list.
///
/// A short or empty page ends the list; a failure on page 1 aborts the run,
/// while a later failure keeps what was already fetched and flags the result
/// as partial. Returns (campaigns, pages fetched, partial).
pub async fn fetch_all_campaigns(
    client: &AcelleClient,
    account: &acelle_accounts::Model,
) -> Result<(Vec<CampaignSummary>, u32, bool), CampaignSyncError> {
    let mut campaigns = Vec::new();
    let mut page = 1usize;
    let mut partial = false;

    loop {
        match client.list_campaigns(account, page, CAMPAIGN_PAGE_SIZE).await {
            Ok(batch) => {
                let fetched = batch.len();
                campaigns.extend(batch);
                if fetched < CAMPAIGN_PAGE_SIZE {
                    break;
                }
                page += 1;
            }
            Err(e) if page == 1 => {
                return Err(CampaignSyncError::FirstPageFailed(e.to_string()));
            }
            Err(e) => {
                tracing::warn!(
                    "Page {} fetch failed for '{}', keeping {} campaigns from earlier pages: {}",
                    page,
                    account.name,
                    campaigns.len(),
                    e
                );
                partial = true;
                break;
            }
        }
    }

    Ok((campaigns, page as u32, partial))
}

/// Raw statistics for one campaign: the inline payload when the list carried
/// one, otherwise a per-campaign fetch. A fetch failure degrades to null
/// (zero-filled after normalization) instead of aborting the batch.
async fn resolve_raw_statistics(
    client: &AcelleClient,
    account: &acelle_accounts::Model,
    campaign: &CampaignSummary,
) -> Value {
    if let Some(inline) = &campaign.statistics {
        return inline.clone();
    }

    match client.campaign_statistics(account, &campaign.uid).await {
        Ok(body) => extract_statistics(body),
        Err(e) => {
            tracing::warn!(
                "Statistics fetch failed for campaign {}, caching zeroed stats: {}",
                campaign.uid,
                e
            );
            Value::Null
        }
    }
}

/// Some installations wrap the payload in `{statistics: {...}}`.
fn extract_statistics(body: Value) -> Value {
    match body {
        Value::Object(ref map) if map.get("statistics").is_some_and(|s| s.is_object()) => {
            map["statistics"].clone()
        }
        other => other,
    }
}

/// Forced resync: one server-side batch instead of client-driven pagination.
///
/// Fetches the full campaign list in a single request and upserts every row,
/// reporting a campaign count. Used when paging through many accounts from
/// the UI would be too slow or rate-limited.
pub async fn force_resync_account(
    db: &DatabaseConnection,
    client: &AcelleClient,
    account: &acelle_accounts::Model,
) -> Result<u64, CampaignSyncError> {
    tracing::info!(
        operation = SYNC_OPERATION_ID,
        "Forced resync for account '{}'",
        account.name
    );

    let campaigns = client
        .list_campaigns(account, 1, FULL_LIST_PAGE_SIZE)
        .await
        .map_err(|e| CampaignSyncError::FirstPageFailed(e.to_string()))?;

    let mut count = 0u64;
    for campaign in &campaigns {
        let raw = resolve_raw_statistics(client, account, campaign).await;
        let stats = stats_normalizer::normalize(&raw, false);

        if let Err(e) = stats_cache::upsert_campaign(db, account.id, campaign, &stats).await {
            let error = CampaignSyncError::Persistence(e.to_string());
            if let Err(db_err) = mark_sync_failure(db, account, &error.to_string()).await {
                tracing::error!("Failed to record sync failure: {}", db_err);
            }
            return Err(error);
        }
        count += 1;
    }

    if let Err(e) = mark_sync_success(db, account).await {
        tracing::error!("Failed to record sync success for '{}': {}", account.name, e);
    }

    tracing::info!(
        operation = SYNC_OPERATION_ID,
        "Forced resync complete for '{}': {} campaigns",
        account.name,
        count
    );
    Ok(count)
}

/// Sync every eligible account, sequentially, highest cache priority first.
pub async fn sync_all_accounts(
    db: &DatabaseConnection,
    client: &AcelleClient,
    monitor: &AvailabilityMonitor,
) -> Result<Vec<SyncOutcome>, DbErr> {
    let accounts = AcelleAccounts::find().all(db).await?;
    let planned = plan_sync_order(accounts);

    tracing::info!(
        operation = SYNC_OPERATION_ID,
        "Syncing {} active accounts",
        planned.len()
    );

    let mut outcomes = Vec::with_capacity(planned.len());
    for account in &planned {
        outcomes.push(sync_account(db, client, monitor, account).await);
    }

    Ok(outcomes)
}

/// Only active accounts are synced, highest cache priority first.
pub fn plan_sync_order(accounts: Vec<acelle_accounts::Model>) -> Vec<acelle_accounts::Model> {
    let mut eligible: Vec<_> = accounts
        .into_iter()
        .filter(|account| account.status == status::ACTIVE)
        .collect();
    eligible.sort_by(|a, b| b.cache_priority.cmp(&a.cache_priority));
    eligible
}

async fn fail(
    db: &DatabaseConnection,
    account: &acelle_accounts::Model,
    mut outcome: SyncOutcome,
    error: String,
) -> SyncOutcome {
    tracing::error!(
        operation = SYNC_OPERATION_ID,
        "Campaign sync failed for '{}': {}",
        account.name,
        error
    );

    if let Err(e) = mark_sync_failure(db, account, &error).await {
        tracing::error!("Failed to record sync failure for '{}': {}", account.name, e);
    }

    outcome.error = Some(error);
    outcome
}

/// Success clears the error state; an account parked in "error" goes back to
/// active.
async fn mark_sync_success(
    db: &DatabaseConnection,
    account: &acelle_accounts::Model,
) -> Result<(), DbErr> {
    let now = Utc::now().naive_utc();
    let mut active_model: acelle_accounts::ActiveModel = account.clone().into();
    active_model.last_sync_date = Set(Some(now));
    active_model.last_sync_error = Set(None);
    if account.status == status::ERROR {
        active_model.status = Set(status::ACTIVE.to_string());
    }
    active_model.updated_at = Set(now);
    active_model.update(db).await?;
    Ok(())
}

async fn mark_sync_failure(
    db: &DatabaseConnection,
    account: &acelle_accounts::Model,
    error: &str,
) -> Result<(), DbErr> {
    let now = Utc::now().naive_utc();
    let mut active_model: acelle_accounts::ActiveModel = account.clone().into();
    active_model.last_sync_error = Set(Some(error.to_string()));
    active_model.status = Set(status::ERROR.to_string());
    active_model.updated_at = Set(now);
    active_model.update(db).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use serde_json::json;

    fn account(id: i32, account_status: &str, cache_priority: i32) -> acelle_accounts::Model {
        let epoch = NaiveDateTime::default();
        acelle_accounts::Model {
            id,
            name: format!("account-{}", id),
            api_endpoint: "https://mail.example.com/api/v1".to_string(),
            api_token: "tok".to_string(),
            status: account_status.to_string(),
            cache_priority,
            last_sync_date: None,
            last_sync_error: None,
            created_at: epoch,
            updated_at: epoch,
        }
    }

    #[test]
    fn test_plan_sync_order_gates_on_active_status() {
        let accounts = vec![
            account(1, status::ACTIVE, 0),
            account(2, status::INACTIVE, 10),
            account(3, status::ERROR, 20),
            account(4, status::ACTIVE, 5),
        ];
        let planned = plan_sync_order(accounts);
        let ids: Vec<i32> = planned.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![4, 1]);
    }

    #[test]
    fn test_plan_sync_order_priority_descending() {
        let accounts = vec![
            account(1, status::ACTIVE, 1),
            account(2, status::ACTIVE, 100),
            account(3, status::ACTIVE, 50),
        ];
        let planned = plan_sync_order(accounts);
        let ids: Vec<i32> = planned.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn test_plan_sync_order_empty() {
        assert!(plan_sync_order(vec![]).is_empty());
        assert!(plan_sync_order(vec![account(1, status::INACTIVE, 0)]).is_empty());
    }

    #[test]
    fn test_extract_statistics_unwraps_wrapper() {
        let wrapped = json!({"statistics": {"delivered_count": 5}});
        assert_eq!(extract_statistics(wrapped), json!({"delivered_count": 5}));
    }

    #[test]
    fn test_extract_statistics_passes_bare_payload() {
        let bare = json!({"delivered_count": 5});
        assert_eq!(extract_statistics(bare.clone()), bare);
    }

    #[test]
    fn test_extract_statistics_ignores_non_object_wrapper() {
        let odd = json!({"statistics": "none"});
        assert_eq!(extract_statistics(odd.clone()), odd);
    }
}
