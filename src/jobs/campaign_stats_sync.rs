use tokio::time::{interval, Duration};

use sea_orm::DatabaseConnection;

use crate::services::acelle_client::AcelleClient;
use crate::services::availability::AvailabilityMonitor;
use crate::services::campaign_sync;

/// Scheduled multi-account campaign statistics sync.
///
/// Runs once at startup, then on the configured interval. The whole round is
/// skipped when the availability check fails, so a sleeping gateway is woken
/// by the check itself rather than hammered by doomed campaign fetches.
pub async fn start_campaign_stats_sync_job(
    db: DatabaseConnection,
    client: AcelleClient,
    monitor: AvailabilityMonitor,
    interval_secs: u64,
) {
    tokio::spawn(async move {
        let mut interval = interval(Duration::from_secs(interval_secs));

        tracing::info!("Running initial campaign statistics sync");
        run_sync_round(&db, &client, &monitor).await;

        // The first tick completes immediately and is consumed by the
        // initial round above.
        interval.tick().await;

        loop {
            interval.tick().await;
            tracing::info!("Starting scheduled campaign statistics sync");
            run_sync_round(&db, &client, &monitor).await;
        }
    });
}

async fn run_sync_round(
    db: &DatabaseConnection,
    client: &AcelleClient,
    monitor: &AvailabilityMonitor,
) {
    let verdict = monitor.ensure_available(false).await;
    if !verdict.available {
        tracing::warn!(
            "Skipping campaign statistics sync, services unavailable: {}",
            verdict.detail
        );
        return;
    }

    match campaign_sync::sync_all_accounts(db, client, monitor).await {
        Ok(outcomes) => {
            let failed = outcomes.iter().filter(|o| o.error.is_some()).count();
            let synced: u64 = outcomes.iter().map(|o| o.campaigns_synced).sum();
            tracing::info!(
                "Campaign statistics sync round complete: {} accounts, {} campaigns cached, {} failed",
                outcomes.len(),
                synced,
                failed
            );
        }
        Err(e) => {
            tracing::error!("Campaign statistics sync round failed: {}", e);
        }
    }
}
