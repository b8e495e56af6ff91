pub mod campaign_stats_sync;
