//! SeaORM Entity for Acelle accounts
//!
//! One row per tenant credential set for the Acelle email-marketing API.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "acelle_accounts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub name: String,
    /// Base URL of the Acelle installation (e.g. "https://mail.example.com/api/v1")
    pub api_endpoint: String,
    /// Secret API token, only ever sent upstream through the proxy gateway
    pub api_token: String,
    /// "active" | "inactive" | "error"; only active accounts are synced
    pub status: String,
    /// Higher priority accounts are synced first
    pub cache_priority: i32,
    pub last_sync_date: Option<DateTime>,
    pub last_sync_error: Option<String>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::campaign_stats_cache::Entity")]
    CampaignStatsCache,
}

impl Related<super::campaign_stats_cache::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CampaignStatsCache.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Account lifecycle states
pub mod status {
    pub const ACTIVE: &str = "active";
    pub const INACTIVE: &str = "inactive";
    pub const ERROR: &str = "error";
}
