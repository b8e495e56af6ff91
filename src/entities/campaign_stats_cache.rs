//! SeaORM Entity for the campaign statistics cache
//!
//! Last-known statistics per upstream campaign, keyed by campaign uid.
//! Written only by the sync orchestrator; UI consumers read it as-is and
//! judge staleness from `cache_updated_at`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "campaign_stats_cache")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    /// Upstream campaign uid. Unique on its own, not per account.
    #[sea_orm(unique)]
    pub campaign_uid: String,
    pub account_id: i32,
    pub name: String,
    pub subject: Option<String>,
    pub status: Option<String>,
    pub created_at: Option<DateTime>,
    pub updated_at: Option<DateTime>,
    pub delivery_date: Option<DateTime>,
    pub run_at: Option<DateTime>,
    pub last_error: Option<String>,
    /// Canonical `CampaignStatistics` JSON, always fully populated
    #[sea_orm(column_type = "JsonBinary")]
    pub delivery_info: Json,
    pub cache_updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::acelle_accounts::Entity",
        from = "Column::AccountId",
        to = "super::acelle_accounts::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    AcelleAccount,
}

impl Related<super::acelle_accounts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AcelleAccount.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
