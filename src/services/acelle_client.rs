//! Client for the Acelle proxy gateway
//!
//! The orchestrator never talks to an Acelle installation directly; every
//! call goes through the proxy gateway, which holds the CORS/auth/timeout
//! workarounds. This client attaches the caller identity token plus the
//! per-account endpoint/secret headers and understands the gateway's error
//! shapes.

use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;

use crate::entities::acelle_accounts;
use crate::models::acelle::{CampaignSummary, ConnectionTestResult};
use crate::services::auth_token::AuthTokenProvider;

/// Upstream campaign list fetch budget.
const CAMPAIGN_LIST_TIMEOUT: Duration = Duration::from_secs(20);

/// Budget for any other proxied call, matching the gateway's own 25 s cap.
const PROXY_TIMEOUT: Duration = Duration::from_secs(25);

const CONNECTION_TEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Fixed page size for campaign pagination.
pub const CAMPAIGN_PAGE_SIZE: usize = 50;

#[derive(Debug)]
pub enum AcelleClientError {
    /// No session token could be obtained, even after a forced refresh
    NoToken,
    /// Network-level failure between this process and the gateway
    Transport(String),
    /// 401 from the gateway after the one permitted token-refresh retry
    AuthFailed(String),
    /// Non-auth application error relayed from upstream
    Upstream { status: u16, message: String },
    /// Gateway answered but the body was not the expected shape
    InvalidResponse(String),
}

impl std::fmt::Display for AcelleClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AcelleClientError::NoToken => write!(f, "No valid session token available"),
            AcelleClientError::Transport(msg) => write!(f, "Transport error: {}", msg),
            AcelleClientError::AuthFailed(msg) => write!(f, "Authentication failed: {}", msg),
            AcelleClientError::Upstream { status, message } => {
                write!(f, "Upstream error {}: {}", status, message)
            }
            AcelleClientError::InvalidResponse(msg) => write!(f, "Invalid response: {}", msg),
        }
    }
}

impl std::error::Error for AcelleClientError {}

#[derive(Clone)]
pub struct AcelleClient {
    client: Client,
    gateway_url: String,
    auth: AuthTokenProvider,
}

impl AcelleClient {
    pub fn new(gateway_url: String, auth: AuthTokenProvider) -> Self {
        Self {
            client: Client::new(),
            gateway_url: gateway_url.trim_end_matches('/').to_string(),
            auth,
        }
    }

    fn proxy_url(&self, path: &str) -> String {
        format!("{}/api/acelle-proxy/{}", self.gateway_url, path)
    }

    /// One page of the upstream campaign list.
    pub async fn list_campaigns(
        &self,
        account: &acelle_accounts::Model,
        page: usize,
        per_page: usize,
    ) -> Result<Vec<CampaignSummary>, AcelleClientError> {
        let body = self
            .get_json(
                account,
                "campaigns",
                &[
                    ("page", page.to_string()),
                    ("per_page", per_page.to_string()),
                ],
                CAMPAIGN_LIST_TIMEOUT,
            )
            .await?;

        Ok(parse_campaign_list(&body))
    }

    /// Raw statistics payload for one campaign.
    pub async fn campaign_statistics(
        &self,
        account: &acelle_accounts::Model,
        uid: &str,
    ) -> Result<Value, AcelleClientError> {
        self.get_json(
            account,
            &format!("campaigns/{}/statistics", uid),
            &[],
            PROXY_TIMEOUT,
        )
        .await
    }

    /// Gateway connection test for one account.
    ///
    /// The gateway always answers 200 here; failure lives inside the body.
    pub async fn test_connection(
        &self,
        account: &acelle_accounts::Model,
    ) -> Result<ConnectionTestResult, AcelleClientError> {
        let token = self
            .auth
            .get_valid_token()
            .await
            .ok_or(AcelleClientError::NoToken)?;

        let response = self
            .client
            .get(self.proxy_url("test-acelle-connection"))
            .timeout(CONNECTION_TEST_TIMEOUT)
            .bearer_auth(&token)
            .header("x-acelle-endpoint", &account.api_endpoint)
            .header("x-acelle-token", &account.api_token)
            .send()
            .await
            .map_err(|e| AcelleClientError::Transport(e.to_string()))?;

        if response.status() != StatusCode::OK {
            return Err(AcelleClientError::InvalidResponse(format!(
                "Connection test returned {}",
                response.status()
            )));
        }

        response
            .json::<ConnectionTestResult>()
            .await
            .map_err(|e| AcelleClientError::InvalidResponse(e.to_string()))
    }

    /// GET a proxied resource, with one token-refresh retry on 401.
    async fn get_json(
        &self,
        account: &acelle_accounts::Model,
        path: &str,
        query: &[(&str, String)],
        timeout: Duration,
    ) -> Result<Value, AcelleClientError> {
        let token = self
            .auth
            .get_valid_token()
            .await
            .ok_or(AcelleClientError::NoToken)?;

        let response = self.send(account, path, query, timeout, &token).await?;

        let response = if response.status() == StatusCode::UNAUTHORIZED {
            tracing::warn!(
                "Gateway returned 401 for {}, refreshing token and retrying once",
                path
            );
            let token = self
                .auth
                .force_refresh()
                .await
                .ok_or(AcelleClientError::NoToken)?;
            let retried = self.send(account, path, query, timeout, &token).await?;
            if retried.status() == StatusCode::UNAUTHORIZED {
                let message = read_error_message(retried).await;
                return Err(AcelleClientError::AuthFailed(message));
            }
            retried
        } else {
            response
        };

        let status = response.status();
        if !status.is_success() {
            let message = read_error_message(response).await;
            return Err(AcelleClientError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| AcelleClientError::InvalidResponse(e.to_string()))
    }

    async fn send(
        &self,
        account: &acelle_accounts::Model,
        path: &str,
        query: &[(&str, String)],
        timeout: Duration,
        token: &str,
    ) -> Result<reqwest::Response, AcelleClientError> {
        self.client
            .get(self.proxy_url(path))
            .timeout(timeout)
            .bearer_auth(token)
            .header("x-acelle-endpoint", &account.api_endpoint)
            .header("x-acelle-token", &account.api_token)
            .query(query)
            .send()
            .await
            .map_err(|e| AcelleClientError::Transport(e.to_string()))
    }
}

async fn read_error_message(response: reqwest::Response) -> String {
    let status = response.status();
    match response.json::<Value>().await {
        Ok(body) => body
            .get("error")
            .or_else(|| body.get("message"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| body.to_string()),
        Err(_) => format!("HTTP {}", status),
    }
}

/// Campaign lists arrive either as a bare array or wrapped in `{data: []}`.
/// Rows that fail to deserialize are skipped with a warning rather than
/// failing the page.
fn parse_campaign_list(body: &Value) -> Vec<CampaignSummary> {
    let items = match body {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => match map.get("data").and_then(|d| d.as_array()) {
            Some(items) => items.as_slice(),
            None => {
                tracing::warn!("Campaign list response has no data array");
                return Vec::new();
            }
        },
        _ => {
            tracing::warn!("Campaign list response is neither array nor object");
            return Vec::new();
        }
    };

    items
        .iter()
        .filter_map(|item| match serde_json::from_value(item.clone()) {
            Ok(campaign) => Some(campaign),
            Err(e) => {
                tracing::warn!("Skipping malformed campaign row: {}", e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_campaign_list_bare_array() {
        let body = json!([
            {"uid": "c1", "name": "One"},
            {"uid": "c2", "name": "Two", "subject": "Hi"}
        ]);
        let campaigns = parse_campaign_list(&body);
        assert_eq!(campaigns.len(), 2);
        assert_eq!(campaigns[0].uid, "c1");
        assert_eq!(campaigns[1].subject.as_deref(), Some("Hi"));
    }

    #[test]
    fn test_parse_campaign_list_data_wrapper() {
        let body = json!({"data": [{"uid": "c1"}]});
        let campaigns = parse_campaign_list(&body);
        assert_eq!(campaigns.len(), 1);
    }

    #[test]
    fn test_parse_campaign_list_skips_malformed_rows() {
        let body = json!([{"uid": "ok"}, {"name": "missing uid"}, 42]);
        let campaigns = parse_campaign_list(&body);
        assert_eq!(campaigns.len(), 1);
        assert_eq!(campaigns[0].uid, "ok");
    }

    #[test]
    fn test_parse_campaign_list_unexpected_shape() {
        assert!(parse_campaign_list(&json!("nope")).is_empty());
        assert!(parse_campaign_list(&json!({"items": []})).is_empty());
    }
}
