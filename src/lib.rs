// src/lib.rs

use sea_orm::DatabaseConnection;
use services::acelle_client::AcelleClient;
use services::availability::AvailabilityMonitor;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    /// Upstream HTTP client used by the proxy gateway. Redirects are never
    /// followed so an upstream login bounce stays visible as a 302.
    pub upstream: reqwest::Client,
    pub acelle: AcelleClient,
    pub monitor: AvailabilityMonitor,
}

pub mod entities {
    pub mod prelude;
    pub mod acelle_accounts;
    pub mod campaign_stats_cache;
    pub mod service_heartbeats;
}

pub mod services {
    pub mod acelle_client;
    pub mod auth_token;
    pub mod availability;
    pub mod campaign_sync;
    pub mod heartbeat;
    pub mod stats_cache;
    pub mod stats_normalizer;
}

pub mod handlers {
    pub mod accounts;
    pub mod acelle_connection;
    pub mod acelle_proxy;
}

pub mod models {
    pub mod acelle;
    pub mod stats;
    pub mod sync;
}

pub mod jobs;
