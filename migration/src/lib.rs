pub use sea_orm_migration::prelude::*;

mod m20250604_000001_create_acelle_accounts;
mod m20250604_000002_create_campaign_stats_cache;
mod m20250604_000003_create_service_heartbeats;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250604_000001_create_acelle_accounts::Migration),
            Box::new(m20250604_000002_create_campaign_stats_cache::Migration),
            Box::new(m20250604_000003_create_service_heartbeats::Migration),
        ]
    }
}
