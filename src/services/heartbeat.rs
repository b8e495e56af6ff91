//! Gateway heartbeat reporting
//!
//! The proxy gateway self-reports a liveness row so an external monitor can
//! tell a hung or cold-started instance from a merely idle one. Writes are
//! throttled to at most one per 30-second window and are strictly
//! best-effort: a failed heartbeat must never fail the request that
//! triggered it.

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::entities::service_heartbeats::{self, Entity as ServiceHeartbeats};

/// Function name the proxy gateway reports under
pub const GATEWAY_FUNCTION: &str = "acelle-proxy";

const HEARTBEAT_WINDOW: Duration = Duration::from_secs(30);

struct HeartbeatThrottle {
    last_beat: Option<Instant>,
}

impl HeartbeatThrottle {
    /// Returns true when the window has elapsed and records the new beat.
    fn should_beat(&mut self) -> bool {
        let now = Instant::now();
        match self.last_beat {
            Some(last) if now.duration_since(last) < HEARTBEAT_WINDOW => false,
            _ => {
                self.last_beat = Some(now);
                true
            }
        }
    }
}

lazy_static::lazy_static! {
    static ref THROTTLE: Arc<Mutex<HeartbeatThrottle>> =
        Arc::new(Mutex::new(HeartbeatThrottle { last_beat: None }));
}

/// Record a gateway heartbeat, at most once per window.
///
/// Fire-and-forget: the upsert runs on a spawned task and failures are only
/// logged.
pub fn report_gateway_heartbeat(db: &DatabaseConnection) {
    let db = db.clone();
    tokio::spawn(async move {
        let should_beat = THROTTLE.lock().await.should_beat();
        if !should_beat {
            return;
        }
        if let Err(e) = upsert_heartbeat(&db, GATEWAY_FUNCTION, "alive").await {
            tracing::warn!("Failed to record gateway heartbeat: {}", e);
        }
    });
}

async fn upsert_heartbeat(
    db: &DatabaseConnection,
    function_name: &str,
    status: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let now = Utc::now().naive_utc();

    let existing = ServiceHeartbeats::find()
        .filter(service_heartbeats::Column::FunctionName.eq(function_name))
        .one(db)
        .await?;

    match existing {
        Some(record) => {
            let mut active_model: service_heartbeats::ActiveModel = record.into();
            active_model.last_heartbeat = Set(now);
            active_model.status = Set(status.to_string());
            active_model.update(db).await?;
        }
        None => {
            let new_record = service_heartbeats::ActiveModel {
                function_name: Set(function_name.to_string()),
                last_heartbeat: Set(now),
                status: Set(status.to_string()),
                ..Default::default()
            };
            new_record.insert(db).await?;
        }
    }

    tracing::debug!("[{}] Recorded heartbeat", function_name);
    Ok(())
}

/// Latest heartbeat row for a function, if any.
pub async fn latest(
    db: &DatabaseConnection,
    function_name: &str,
) -> Result<Option<service_heartbeats::Model>, sea_orm::DbErr> {
    ServiceHeartbeats::find()
        .filter(service_heartbeats::Column::FunctionName.eq(function_name))
        .one(db)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throttle_first_beat_passes() {
        let mut throttle = HeartbeatThrottle { last_beat: None };
        assert!(throttle.should_beat());
    }

    #[test]
    fn test_throttle_suppresses_within_window() {
        let mut throttle = HeartbeatThrottle { last_beat: None };
        assert!(throttle.should_beat());
        assert!(!throttle.should_beat());
    }

    #[test]
    fn test_throttle_passes_after_window() {
        let mut throttle = HeartbeatThrottle {
            last_beat: Some(Instant::now() - Duration::from_secs(31)),
        };
        assert!(throttle.should_beat());
    }
}
