//! Account and sync surface consumed by the operations UI
//!
//! Read endpoints serve only the cache; nothing here reaches upstream except
//! the explicit sync/resync actions. Sync endpoints answer 200 with the
//! outcome report even when the run failed, mirroring the notification-style
//! contract the UI expects (failures are data, not transport errors).

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use sea_orm::EntityTrait;

use crate::entities::prelude::AcelleAccounts;
use crate::models::acelle::ErrorResponse;
use crate::models::sync::{
    AccountSummary, BatchSyncResponse, CachedCampaignsResponse, ForceResyncResponse,
    HealthResponse,
};
use crate::services::campaign_sync::{self, SyncOutcome};
use crate::services::{heartbeat, stats_cache};
use crate::AppState;

/// GET /api/acelle/accounts
pub async fn list_accounts(
    State(state): State<AppState>,
) -> Result<Json<Vec<AccountSummary>>, (StatusCode, Json<ErrorResponse>)> {
    let accounts = AcelleAccounts::find()
        .all(&state.db)
        .await
        .map_err(internal_error)?;

    Ok(Json(accounts.into_iter().map(AccountSummary::from).collect()))
}

/// GET /api/acelle/accounts/{id}/campaigns
///
/// Cached rows only; staleness is the caller's judgement via
/// `cache_updated_at`.
pub async fn get_cached_campaigns(
    State(state): State<AppState>,
    Path(account_id): Path<i32>,
) -> Result<Json<CachedCampaignsResponse>, (StatusCode, Json<ErrorResponse>)> {
    let campaigns = stats_cache::list_for_account(&state.db, account_id)
        .await
        .map_err(internal_error)?;

    Ok(Json(CachedCampaignsResponse {
        account_id,
        campaigns,
    }))
}

/// POST /api/acelle/accounts/{id}/sync
pub async fn run_account_sync(
    State(state): State<AppState>,
    Path(account_id): Path<i32>,
) -> Result<Json<SyncOutcome>, (StatusCode, Json<ErrorResponse>)> {
    let account = find_account(&state, account_id).await?;

    let outcome =
        campaign_sync::sync_account(&state.db, &state.acelle, &state.monitor, &account).await;
    Ok(Json(outcome))
}

/// POST /api/acelle/accounts/{id}/resync
///
/// Forced server-side batch resync, reported as a campaign count.
pub async fn run_force_resync(
    State(state): State<AppState>,
    Path(account_id): Path<i32>,
) -> Result<Json<ForceResyncResponse>, (StatusCode, Json<ErrorResponse>)> {
    let account = find_account(&state, account_id).await?;

    let campaign_count = campaign_sync::force_resync_account(&state.db, &state.acelle, &account)
        .await
        .map_err(|e| {
            (
                StatusCode::BAD_GATEWAY,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
        })?;

    Ok(Json(ForceResyncResponse {
        account_id,
        campaign_count,
    }))
}

/// POST /api/acelle/sync-all
pub async fn run_batch_sync(
    State(state): State<AppState>,
) -> Result<Json<BatchSyncResponse>, (StatusCode, Json<ErrorResponse>)> {
    let reports = campaign_sync::sync_all_accounts(&state.db, &state.acelle, &state.monitor)
        .await
        .map_err(internal_error)?;

    Ok(Json(BatchSyncResponse {
        accounts_processed: reports.len(),
        reports,
    }))
}

/// GET /api/acelle/health
pub async fn get_health(
    State(state): State<AppState>,
) -> Result<Json<HealthResponse>, (StatusCode, Json<ErrorResponse>)> {
    let verdict = state.monitor.ensure_available(false).await;
    let auth_last_error = state.monitor.auth_last_error().await;
    let gateway_heartbeat = heartbeat::latest(&state.db, heartbeat::GATEWAY_FUNCTION)
        .await
        .map_err(internal_error)?;

    Ok(Json(HealthResponse {
        available: verdict.available,
        detail: verdict.detail,
        checked_at: Some(verdict.checked_at.to_rfc3339()),
        auth_last_error,
        gateway_heartbeat,
    }))
}

async fn find_account(
    state: &AppState,
    account_id: i32,
) -> Result<crate::entities::acelle_accounts::Model, (StatusCode, Json<ErrorResponse>)> {
    AcelleAccounts::find_by_id(account_id)
        .one(&state.db)
        .await
        .map_err(internal_error)?
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    error: format!("Account {} not found", account_id),
                }),
            )
        })
}

fn internal_error(e: sea_orm::DbErr) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: format!("Database error: {}", e),
        }),
    )
}
