use axum::{
    routing::{any, get},
    Router,
};
use chrono::NaiveDateTime;
use sea_orm::DatabaseConnection;

use acelle_stats_backend::entities::acelle_accounts;
use acelle_stats_backend::handlers;
use acelle_stats_backend::services::acelle_client::AcelleClient;
use acelle_stats_backend::services::auth_token::AuthTokenProvider;
use acelle_stats_backend::services::availability::AvailabilityMonitor;
use acelle_stats_backend::AppState;

/// Nothing listens on this port; calls against it fail fast.
#[allow(dead_code)]
pub const DEAD_URL: &str = "http://127.0.0.1:9";

/// App state with no live database or auth service behind it.
///
/// Gateway handler tests only exercise request validation and upstream
/// relaying; the only database touch is the fire-and-forget heartbeat,
/// which is allowed to fail.
#[allow(dead_code)]
pub fn test_app_state() -> AppState {
    let auth = AuthTokenProvider::new(
        DEAD_URL.to_string(),
        "test_api_key".to_string(),
        "test_refresh_token".to_string(),
    );

    AppState {
        db: DatabaseConnection::Disconnected,
        upstream: reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("Failed to build test client"),
        acelle: AcelleClient::new(DEAD_URL.to_string(), auth.clone()),
        monitor: AvailabilityMonitor::new(DEAD_URL, auth),
    }
}

/// The gateway routes exactly as main.rs wires them.
#[allow(dead_code)]
pub fn build_gateway_router() -> Router {
    Router::new()
        .route("/api/acelle-proxy/ping", get(handlers::acelle_proxy::ping))
        .route(
            "/api/acelle-proxy/test-acelle-connection",
            get(handlers::acelle_connection::test_acelle_connection),
        )
        .route(
            "/api/acelle-proxy/{*path}",
            any(handlers::acelle_proxy::proxy_request),
        )
        .with_state(test_app_state())
}

/// An active account pointed at the given endpoint.
#[allow(dead_code)]
pub fn test_account(api_endpoint: &str) -> acelle_accounts::Model {
    let epoch = NaiveDateTime::default();
    acelle_accounts::Model {
        id: 1,
        name: "test-account".to_string(),
        api_endpoint: api_endpoint.to_string(),
        api_token: "sec".to_string(),
        status: "active".to_string(),
        cache_priority: 0,
        last_sync_date: None,
        last_sync_error: None,
        created_at: epoch,
        updated_at: epoch,
    }
}
