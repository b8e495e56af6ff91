//! Caller identity token provider
//!
//! Supplies a currently-valid session access token to the gateway client and
//! the sync orchestrator, refreshing proactively rather than waiting for a
//! 401. Token absence is routine (nobody logged in, auth service cold), so
//! failures are captured in an observable `last_error` instead of being
//! thrown at unrelated callers.

use chrono::{Duration as ChronoDuration, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::interval;

/// Background refresh period: 25 minutes, comfortably inside the usual
/// 60-minute access-token lifetime.
const REFRESH_INTERVAL_SECS: u64 = 25 * 60;

const REFRESH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
struct Session {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Clone)]
pub struct AuthTokenProvider {
    client: Client,
    auth_url: String,
    api_key: String,
    refresh_token: String,
    session: Arc<RwLock<Option<Session>>>,
    last_error: Arc<RwLock<Option<String>>>,
}

impl AuthTokenProvider {
    pub fn new(auth_url: String, api_key: String, refresh_token: String) -> Self {
        Self {
            client: Client::new(),
            auth_url,
            api_key,
            refresh_token,
            session: Arc::new(RwLock::new(None)),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Current access token, refreshing the session first.
    ///
    /// The refresh is best-effort: a failure is recorded in `last_error` and
    /// whatever session is already cached (possibly none) is returned.
    pub async fn get_valid_token(&self) -> Option<String> {
        if let Err(e) = self.refresh_session().await {
            tracing::warn!("Session refresh failed, using cached session: {}", e);
        }

        self.session
            .read()
            .await
            .as_ref()
            .map(|s| s.access_token.clone())
    }

    /// Drop the cached session and refresh unconditionally.
    pub async fn force_refresh(&self) -> Option<String> {
        self.session.write().await.take();

        if let Err(e) = self.refresh_session().await {
            tracing::warn!("Forced session refresh failed: {}", e);
            return None;
        }

        self.session
            .read()
            .await
            .as_ref()
            .map(|s| s.access_token.clone())
    }

    /// Last refresh failure, cleared on the next successful refresh.
    pub async fn last_error(&self) -> Option<String> {
        self.last_error.read().await.clone()
    }

    async fn refresh_session(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let url = format!("{}/token", self.auth_url.trim_end_matches('/'));

        let result = self
            .client
            .post(&url)
            .timeout(REFRESH_TIMEOUT)
            .header("apikey", &self.api_key)
            .query(&[("grant_type", "refresh_token")])
            .json(&serde_json::json!({ "refresh_token": self.refresh_token }))
            .send()
            .await;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                *self.last_error.write().await = Some(e.to_string());
                return Err(e.into());
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let message = format!("Auth service returned {}: {}", status, body);
            *self.last_error.write().await = Some(message.clone());
            return Err(message.into());
        }

        let token: TokenResponse = match response.json().await {
            Ok(token) => token,
            Err(e) => {
                *self.last_error.write().await = Some(e.to_string());
                return Err(e.into());
            }
        };

        let expires_at = token
            .expires_in
            .map(|secs| Utc::now() + ChronoDuration::seconds(secs));

        *self.session.write().await = Some(Session {
            access_token: token.access_token,
        });
        *self.last_error.write().await = None;

        tracing::debug!("Session refreshed, expires_at={:?}", expires_at);
        Ok(())
    }

    /// Spawn the 25-minute background refresh loop.
    pub fn start_background_refresh(&self) {
        let provider = self.clone();
        tokio::spawn(async move {
            let mut interval = interval(Duration::from_secs(REFRESH_INTERVAL_SECS));
            // First tick fires immediately and warms the session cache
            loop {
                interval.tick().await;
                if let Err(e) = provider.refresh_session().await {
                    tracing::warn!("Background session refresh failed: {}", e);
                }
            }
        });
    }
}
