//! Sync surface response models

use serde::{Deserialize, Serialize};

use crate::services::campaign_sync::SyncOutcome;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSyncResponse {
    pub accounts_processed: usize,
    pub reports: Vec<SyncOutcome>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForceResyncResponse {
    pub account_id: i32,
    pub campaign_count: u64,
}

/// Cached campaign rows for one account, as served to UI consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedCampaignsResponse {
    pub account_id: i32,
    pub campaigns: Vec<crate::entities::campaign_stats_cache::Model>,
}

/// Account list entry. The secret token never leaves the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountSummary {
    pub id: i32,
    pub name: String,
    pub api_endpoint: String,
    pub status: String,
    pub cache_priority: i32,
    pub last_sync_date: Option<chrono::NaiveDateTime>,
    pub last_sync_error: Option<String>,
}

impl From<crate::entities::acelle_accounts::Model> for AccountSummary {
    fn from(account: crate::entities::acelle_accounts::Model) -> Self {
        Self {
            id: account.id,
            name: account.name,
            api_endpoint: account.api_endpoint,
            status: account.status,
            cache_priority: account.cache_priority,
            last_sync_date: account.last_sync_date,
            last_sync_error: account.last_sync_error,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub available: bool,
    pub detail: String,
    pub checked_at: Option<String>,
    pub auth_last_error: Option<String>,
    pub gateway_heartbeat: Option<crate::entities::service_heartbeats::Model>,
}
