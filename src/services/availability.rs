//! Service availability monitor
//!
//! Single source of truth for "can we talk to the upstream system right
//! now". Composes the auth token provider with a gateway wake ping, caches
//! the verdict for 60 seconds, and deduplicates concurrent checks so a burst
//! of UI actions triggers one probe instead of ten.

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::time::{interval, sleep};

use crate::services::auth_token::AuthTokenProvider;

/// Cached verdicts younger than this are served without a fresh probe.
const VERDICT_TTL: Duration = Duration::from_secs(60);

/// Poll period while another caller's check is in flight.
const IN_FLIGHT_POLL: Duration = Duration::from_millis(100);

/// Background re-check period (quiet mode).
const BACKGROUND_CHECK_SECS: u64 = 5 * 60;

const WAKE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    pub available: bool,
    pub detail: String,
    pub checked_at: DateTime<Utc>,
}

struct MonitorState {
    check_in_flight: bool,
    last_verdict: Option<(Verdict, Instant)>,
}

#[derive(Clone)]
pub struct AvailabilityMonitor {
    client: Client,
    ping_url: String,
    auth: AuthTokenProvider,
    state: Arc<RwLock<MonitorState>>,
}

impl AvailabilityMonitor {
    pub fn new(gateway_url: &str, auth: AuthTokenProvider) -> Self {
        Self {
            client: Client::new(),
            ping_url: format!(
                "{}/api/acelle-proxy/ping",
                gateway_url.trim_end_matches('/')
            ),
            auth,
            state: Arc::new(RwLock::new(MonitorState {
                check_in_flight: false,
                last_verdict: None,
            })),
        }
    }

    /// Current availability verdict.
    ///
    /// Waits on an in-flight check rather than starting a duplicate, serves
    /// the cached verdict when younger than 60 s (unless `force_refresh`),
    /// and otherwise probes: token, wake ping, and on wake failure one
    /// forced token refresh plus exactly one more ping.
    pub async fn ensure_available(&self, force_refresh: bool) -> Verdict {
        loop {
            {
                let mut state = self.state.write().await;
                if !state.check_in_flight {
                    if !force_refresh {
                        if let Some((verdict, at)) = &state.last_verdict {
                            if at.elapsed() < VERDICT_TTL {
                                return verdict.clone();
                            }
                        }
                    }
                    state.check_in_flight = true;
                    break;
                }
            }
            sleep(IN_FLIGHT_POLL).await;

            // A finished check may have just cached a fresh verdict; take it
            // instead of probing again.
            if !force_refresh {
                let state = self.state.read().await;
                if !state.check_in_flight {
                    if let Some((verdict, at)) = &state.last_verdict {
                        if at.elapsed() < VERDICT_TTL {
                            return verdict.clone();
                        }
                    }
                }
            }
        }

        let verdict = self.run_check(false).await;

        let mut state = self.state.write().await;
        state.check_in_flight = false;
        state.last_verdict = Some((verdict.clone(), Instant::now()));
        verdict
    }

    async fn run_check(&self, quiet: bool) -> Verdict {
        let token = self.auth.get_valid_token().await;

        match self.wake_gateway(token.as_deref()).await {
            Ok(()) => {
                if quiet {
                    tracing::debug!("Gateway wake succeeded");
                } else {
                    tracing::info!("Gateway wake succeeded");
                }
                return Verdict {
                    available: true,
                    detail: "Gateway reachable".to_string(),
                    checked_at: Utc::now(),
                };
            }
            Err(first_error) => {
                if quiet {
                    tracing::debug!("Gateway wake failed, refreshing token: {}", first_error);
                } else {
                    tracing::warn!("Gateway wake failed, refreshing token: {}", first_error);
                }
            }
        }

        // One forced token refresh, one retry. A second failure is final.
        let token = self.auth.force_refresh().await;
        match self.wake_gateway(token.as_deref()).await {
            Ok(()) => Verdict {
                available: true,
                detail: "Gateway reachable after token refresh".to_string(),
                checked_at: Utc::now(),
            },
            Err(e) => {
                if quiet {
                    tracing::debug!("Gateway unavailable after retry: {}", e);
                } else {
                    tracing::error!("Gateway unavailable after retry: {}", e);
                }
                Verdict {
                    available: false,
                    detail: format!("Gateway unavailable: {}", e),
                    checked_at: Utc::now(),
                }
            }
        }
    }

    async fn wake_gateway(
        &self,
        token: Option<&str>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let token = token.ok_or("No session token available")?;

        let response = self
            .client
            .get(&self.ping_url)
            .timeout(WAKE_TIMEOUT)
            .bearer_auth(token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(format!("Gateway ping returned {}", response.status()).into());
        }

        Ok(())
    }

    /// Spawn the 5-minute quiet-mode background check loop.
    ///
    /// The first tick fires immediately, which doubles as the initial check.
    pub fn start_background_checks(&self) {
        let monitor = self.clone();
        tokio::spawn(async move {
            let mut interval = interval(Duration::from_secs(BACKGROUND_CHECK_SECS));
            loop {
                interval.tick().await;

                let already_fresh = {
                    let state = monitor.state.read().await;
                    state.check_in_flight
                        || state
                            .last_verdict
                            .as_ref()
                            .is_some_and(|(_, at)| at.elapsed() < VERDICT_TTL)
                };
                if already_fresh {
                    continue;
                }

                {
                    let mut state = monitor.state.write().await;
                    if state.check_in_flight {
                        continue;
                    }
                    state.check_in_flight = true;
                }

                let verdict = monitor.run_check(true).await;

                let mut state = monitor.state.write().await;
                state.check_in_flight = false;
                state.last_verdict = Some((verdict, Instant::now()));
            }
        });
    }

    /// Last token refresh failure observed by the auth provider.
    pub async fn auth_last_error(&self) -> Option<String> {
        self.auth.last_error().await
    }

    /// Cached verdict without triggering a probe.
    pub async fn last_verdict(&self) -> Option<Verdict> {
        self.state
            .read()
            .await
            .last_verdict
            .as_ref()
            .map(|(verdict, _)| verdict.clone())
    }
}
