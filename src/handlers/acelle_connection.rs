//! Acelle connection test endpoint
//!
//! Two-stage diagnostic: a cheap HEAD ping to the installation root to
//! separate "server unreachable" from "server up but API/auth broken", then
//! an authenticated whoami call. Always answers HTTP 200; the real upstream
//! status travels inside the JSON body so the diagnostics UI can render
//! failures without an exception path. Operator-facing messages are in
//! French, matching the product's UI language.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::time::Duration;

use crate::handlers::acelle_proxy::{
    extract_acelle_headers, extract_bearer_token, upstream_url,
};
use crate::models::acelle::{ConnectionTestDetails, ConnectionTestResult, ErrorResponse};
use crate::services::heartbeat;
use crate::AppState;

/// Reachability ping budget.
const PING_TIMEOUT: Duration = Duration::from_secs(5);

/// Authenticated whoami budget.
const WHOAMI_TIMEOUT: Duration = Duration::from_secs(10);

/// Upstream error bodies are truncated to this many characters in details.
const ERROR_SNIPPET_LEN: usize = 200;

/// GET /api/acelle-proxy/test-acelle-connection
pub async fn test_acelle_connection(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Response {
    heartbeat::report_gateway_heartbeat(&state.db);

    if extract_bearer_token(&headers).is_none() {
        return (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: "Missing or malformed authorization token".to_string(),
            }),
        )
            .into_response();
    }

    let Some((endpoint, secret)) = extract_acelle_headers(&headers) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "Missing x-acelle-endpoint or x-acelle-token header".to_string(),
            }),
        )
            .into_response();
    };

    Json(run_connection_test(&state, &endpoint, &secret).await).into_response()
}

async fn run_connection_test(
    state: &AppState,
    endpoint: &str,
    secret: &str,
) -> ConnectionTestResult {
    // Stage 1: is the server reachable at all? HEAD the installation root
    // so a dead DNS name or firewalled host fails fast, before any
    // authenticated call.
    let root = installation_root(endpoint);
    tracing::debug!("Connection test: pinging {}", root);

    if let Err(e) = state
        .upstream
        .head(&root)
        .timeout(PING_TIMEOUT)
        .send()
        .await
    {
        let timed_out = e.is_timeout();
        let message = if timed_out {
            "Délai d'attente dépassé lors de la connexion au serveur".to_string()
        } else {
            format!("Connexion impossible au serveur: {}", e)
        };
        tracing::warn!("Connection test ping failed for {}: {}", root, e);
        return ConnectionTestResult {
            success: false,
            status_code: None,
            message,
            details: ConnectionTestDetails {
                endpoint: endpoint.to_string(),
                status: None,
                error: Some(e.to_string()),
                timeout: timed_out.then_some(true),
            },
        };
    }

    // Stage 2: authenticated whoami call with the account secret.
    let whoami = upstream_url(endpoint, "me");
    let response = match state
        .upstream
        .get(&whoami)
        .timeout(WHOAMI_TIMEOUT)
        .query(&[("api_token", secret)])
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => {
            let timed_out = e.is_timeout();
            let message = if timed_out {
                "Délai d'attente dépassé lors de l'appel API".to_string()
            } else {
                format!("Échec de l'appel API: {}", e)
            };
            tracing::warn!("Connection test whoami failed for {}: {}", whoami, e);
            return ConnectionTestResult {
                success: false,
                status_code: None,
                message,
                details: ConnectionTestDetails {
                    endpoint: endpoint.to_string(),
                    status: None,
                    error: Some(e.to_string()),
                    timeout: timed_out.then_some(true),
                },
            };
        }
    };

    let status = response.status();

    if status == reqwest::StatusCode::FOUND {
        return ConnectionTestResult {
            success: false,
            status_code: Some(302),
            message: "Redirection vers la page de connexion, le jeton API est invalide"
                .to_string(),
            details: ConnectionTestDetails {
                endpoint: endpoint.to_string(),
                status: Some(302),
                error: None,
                timeout: None,
            },
        };
    }

    if status.is_success() {
        return ConnectionTestResult {
            success: true,
            status_code: Some(status.as_u16()),
            message: "Connexion réussie".to_string(),
            details: ConnectionTestDetails {
                endpoint: endpoint.to_string(),
                status: Some(status.as_u16()),
                error: None,
                timeout: None,
            },
        };
    }

    let body = response.text().await.unwrap_or_default();
    let snippet: String = body.chars().take(ERROR_SNIPPET_LEN).collect();
    ConnectionTestResult {
        success: false,
        status_code: Some(status.as_u16()),
        message: format!("Le serveur a répondu avec le statut {}", status.as_u16()),
        details: ConnectionTestDetails {
            endpoint: endpoint.to_string(),
            status: Some(status.as_u16()),
            error: (!snippet.is_empty()).then_some(snippet),
            timeout: None,
        },
    }
}

/// Root of the installation, with any /api/v1 suffix stripped, for the
/// unauthenticated reachability ping.
fn installation_root(endpoint: &str) -> String {
    endpoint
        .trim_end_matches('/')
        .trim_end_matches("/api/v1")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_installation_root_strips_api_suffix() {
        assert_eq!(
            installation_root("https://mail.example.com/api/v1"),
            "https://mail.example.com"
        );
        assert_eq!(
            installation_root("https://mail.example.com/api/v1/"),
            "https://mail.example.com"
        );
    }

    #[test]
    fn test_installation_root_plain_endpoint() {
        assert_eq!(
            installation_root("https://mail.example.com/"),
            "https://mail.example.com"
        );
    }
}
