//! Acelle API and proxy gateway request/response models

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// One campaign row as returned by the upstream campaign list.
///
/// Acelle installations differ in which fields they populate, so everything
/// except the uid is optional. Timestamps stay as raw strings here; the
/// cache store parses them on upsert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignSummary {
    pub uid: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub delivery_date: Option<String>,
    #[serde(default)]
    pub run_at: Option<String>,
    #[serde(default)]
    pub last_error: Option<String>,
    /// Raw statistics payload when the installation inlines it in the list
    #[serde(default)]
    pub statistics: Option<serde_json::Value>,
}

/// Result of the gateway connection test.
///
/// Always delivered with HTTP 200; the real upstream status lives in
/// `status_code` so diagnostics UIs can render it without exception paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionTestResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    pub message: String,
    pub details: ConnectionTestDetails,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionTestDetails {
    pub endpoint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingResponse {
    pub status: String,
    pub timestamp: String,
}
