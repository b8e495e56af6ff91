use axum::{
    routing::{any, get, post},
    Router,
};
use sea_orm::Database;
use sea_orm_migration::MigratorTrait;
use std::env;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use acelle_stats_backend::services::acelle_client::AcelleClient;
use acelle_stats_backend::services::auth_token::AuthTokenProvider;
use acelle_stats_backend::services::availability::AvailabilityMonitor;
use acelle_stats_backend::{handlers, jobs, AppState};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,acelle_stats_backend=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    // Connect to database
    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    tracing::info!("Connecting to database...");
    let db = Database::connect(&database_url)
        .await
        .expect("Failed to connect to database");

    // Run migrations
    tracing::info!("Running migrations...");
    migration::Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");

    let port: u16 = env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);

    // The orchestrator talks to the gateway over HTTP even when both run in
    // this process, so deployments can split them later without code changes.
    let gateway_url = env::var("ACELLE_GATEWAY_URL")
        .unwrap_or_else(|_| format!("http://127.0.0.1:{}", port));
    let auth_url = env::var("AUTH_BASE_URL").expect("AUTH_BASE_URL must be set");
    let auth_api_key = env::var("AUTH_API_KEY").expect("AUTH_API_KEY must be set");
    let auth_refresh_token =
        env::var("AUTH_REFRESH_TOKEN").expect("AUTH_REFRESH_TOKEN must be set");
    let sync_interval_secs: u64 = env::var("CAMPAIGN_SYNC_INTERVAL_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3600);

    let auth = AuthTokenProvider::new(auth_url, auth_api_key, auth_refresh_token);
    auth.start_background_refresh();

    let monitor = AvailabilityMonitor::new(&gateway_url, auth.clone());
    monitor.start_background_checks();

    let acelle = AcelleClient::new(gateway_url, auth);

    let upstream = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .expect("Failed to build upstream HTTP client");

    let state = AppState {
        db: db.clone(),
        upstream,
        acelle: acelle.clone(),
        monitor: monitor.clone(),
    };

    // Build router
    let app = Router::new()
        .route("/", get(hello_acelle_stats))
        .route("/api/acelle-proxy/ping", get(handlers::acelle_proxy::ping))
        .route(
            "/api/acelle-proxy/test-acelle-connection",
            get(handlers::acelle_connection::test_acelle_connection),
        )
        .route(
            "/api/acelle-proxy/{*path}",
            any(handlers::acelle_proxy::proxy_request),
        )
        .route(
            "/api/acelle/accounts",
            get(handlers::accounts::list_accounts),
        )
        .route(
            "/api/acelle/accounts/{id}/campaigns",
            get(handlers::accounts::get_cached_campaigns),
        )
        .route(
            "/api/acelle/accounts/{id}/sync",
            post(handlers::accounts::run_account_sync),
        )
        .route(
            "/api/acelle/accounts/{id}/resync",
            post(handlers::accounts::run_force_resync),
        )
        .route("/api/acelle/sync-all", post(handlers::accounts::run_batch_sync))
        .route("/api/acelle/health", get(handlers::accounts::get_health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .unwrap();

    tracing::info!("Server listening on {}", listener.local_addr().unwrap());

    // Spawned after the bind so the initial sync round's gateway self-calls
    // queue on the listener instead of being refused.
    jobs::campaign_stats_sync::start_campaign_stats_sync_job(
        db,
        acelle,
        monitor,
        sync_interval_secs,
    )
    .await;

    axum::serve(listener, app).await.unwrap();
}

async fn hello_acelle_stats() -> &'static str {
    "Acelle statistics backend"
}
