//! Acelle proxy gateway
//!
//! The single network hop UI-side callers are allowed to make toward an
//! Acelle installation. Keeps the per-account secret token out of browser
//! requests, absorbs CORS and slow-upstream failures, and turns upstream
//! login redirects into honest 401s. Every handled request feeds the
//! gateway heartbeat so an external monitor can spot a hung instance.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;

use crate::models::acelle::{ErrorResponse, PingResponse};
use crate::services::heartbeat;
use crate::AppState;

/// Overall budget for one proxied upstream call.
const PROXY_TIMEOUT: Duration = Duration::from_secs(25);

/// Query parameters that must not be forwarded upstream: the secret token is
/// re-attached server-side, and the cache key is internal to callers.
const STRIPPED_QUERY_PARAMS: &[&str] = &["api_token", "cache_key"];

/// Generic proxy endpoint: ANY /api/acelle-proxy/{*path}
///
/// Relays the method, query, and body to `{endpoint}/api/v1/{path}` with the
/// account secret as `api_token`, and relays the upstream status and JSON
/// body back.
pub async fn proxy_request(
    State(state): State<AppState>,
    method: Method,
    Path(path): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    heartbeat::report_gateway_heartbeat(&state.db);

    if extract_bearer_token(&headers).is_none() {
        return error_response(
            StatusCode::UNAUTHORIZED,
            "Missing or malformed authorization token",
        );
    }

    let Some((endpoint, secret)) = extract_acelle_headers(&headers) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Missing x-acelle-endpoint or x-acelle-token header",
        );
    };

    let url = upstream_url(&endpoint, &path);
    let query = forwarded_query(&params, &secret);

    let upstream_method =
        reqwest::Method::from_bytes(method.as_str().as_bytes()).unwrap_or(reqwest::Method::GET);
    let has_body =
        method != Method::GET && method != Method::HEAD && method != Method::OPTIONS;

    tracing::debug!("Proxying {} {} -> {}", method, path, url);

    let mut request = state
        .upstream
        .request(upstream_method, &url)
        .timeout(PROXY_TIMEOUT)
        .query(&query)
        .header(header::ACCEPT, "application/json");

    if has_body && !body.is_empty() {
        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/json")
            .to_string();
        request = request.header(header::CONTENT_TYPE, content_type).body(body);
    }

    let response = match request.send().await {
        Ok(response) => response,
        Err(e) if e.is_timeout() => {
            tracing::warn!("Upstream call to {} timed out", url);
            return error_response(StatusCode::GATEWAY_TIMEOUT, "Upstream request timed out");
        }
        Err(e) => {
            tracing::error!("Upstream call to {} failed: {}", url, e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("Upstream request failed: {}", e),
            );
        }
    };

    relay_upstream_response(response).await
}

/// Wake/liveness probe for the availability monitor.
pub async fn ping(State(state): State<AppState>) -> Json<PingResponse> {
    heartbeat::report_gateway_heartbeat(&state.db);
    Json(PingResponse {
        status: "ok".to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Relay status and body; a 302 here means the upstream bounced us to its
/// login page, which is an authentication failure, not a redirect to follow.
async fn relay_upstream_response(response: reqwest::Response) -> Response {
    let status = response.status();

    if status == reqwest::StatusCode::FOUND {
        return error_response(
            StatusCode::UNAUTHORIZED,
            "Upstream redirected to its login page, the API token was rejected",
        );
    }

    let relay_status =
        StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let text = match response.text().await {
        Ok(text) => text,
        Err(e) => {
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("Failed to read upstream response: {}", e),
            );
        }
    };

    match serde_json::from_str::<Value>(&text) {
        Ok(body) => (relay_status, Json(body)).into_response(),
        Err(_) => (
            relay_status,
            Json(json!({
                "error": "Upstream returned a non-JSON response",
                "raw": text,
            })),
        )
            .into_response(),
    }
}

/// Bearer token from the Authorization header, if well-formed.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = raw.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        return None;
    }
    Some(token.to_string())
}

/// The two headers naming the upstream target, if both present.
pub fn extract_acelle_headers(headers: &HeaderMap) -> Option<(String, String)> {
    let endpoint = headers.get("x-acelle-endpoint")?.to_str().ok()?.trim();
    let secret = headers.get("x-acelle-token")?.to_str().ok()?.trim();
    if endpoint.is_empty() || secret.is_empty() {
        return None;
    }
    Some((endpoint.to_string(), secret.to_string()))
}

/// Rewrite to the upstream API convention. Accounts store the endpoint with
/// or without the /api/v1 suffix; both map to `{base}/api/v1/{path}`.
pub fn upstream_url(endpoint: &str, path: &str) -> String {
    let base = endpoint.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if base.ends_with("/api/v1") {
        format!("{}/{}", base, path)
    } else {
        format!("{}/api/v1/{}", base, path)
    }
}

/// Forward caller query params minus the stripped ones, with the secret
/// re-attached server-side.
pub fn forwarded_query(
    params: &HashMap<String, String>,
    secret: &str,
) -> Vec<(String, String)> {
    let mut query: Vec<(String, String)> = params
        .iter()
        .filter(|(key, _)| !STRIPPED_QUERY_PARAMS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    query.sort();
    query.push(("api_token".to_string(), secret.to_string()));
    query
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_upstream_url_appends_api_path() {
        assert_eq!(
            upstream_url("https://mail.example.com", "campaigns"),
            "https://mail.example.com/api/v1/campaigns"
        );
    }

    #[test]
    fn test_upstream_url_keeps_existing_api_path() {
        assert_eq!(
            upstream_url("https://mail.example.com/api/v1/", "campaigns/c1/statistics"),
            "https://mail.example.com/api/v1/campaigns/c1/statistics"
        );
    }

    #[test]
    fn test_forwarded_query_strips_internal_params() {
        let mut params = HashMap::new();
        params.insert("page".to_string(), "2".to_string());
        params.insert("api_token".to_string(), "leaked".to_string());
        params.insert("cache_key".to_string(), "abc".to_string());

        let query = forwarded_query(&params, "secret");
        assert_eq!(
            query,
            vec![
                ("page".to_string(), "2".to_string()),
                ("api_token".to_string(), "secret".to_string()),
            ]
        );
    }

    #[test]
    fn test_extract_bearer_token() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(extract_bearer_token(&headers).as_deref(), Some("abc"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert!(extract_bearer_token(&headers).is_none());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(extract_bearer_token(&headers).is_none());

        headers.remove(header::AUTHORIZATION);
        assert!(extract_bearer_token(&headers).is_none());
    }

    #[test]
    fn test_extract_acelle_headers_requires_both() {
        let mut headers = HeaderMap::new();
        headers.insert("x-acelle-endpoint", HeaderValue::from_static("https://x"));
        assert!(extract_acelle_headers(&headers).is_none());

        headers.insert("x-acelle-token", HeaderValue::from_static("tok"));
        let (endpoint, secret) = extract_acelle_headers(&headers).unwrap();
        assert_eq!(endpoint, "https://x");
        assert_eq!(secret, "tok");
    }
}
