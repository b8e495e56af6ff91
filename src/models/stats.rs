//! Canonical campaign statistics shape
//!
//! Every statistics payload the upstream API or the cache hands back is
//! normalized into this record. All fields are always populated so that
//! downstream formatting never needs defensive checks.

use serde::{Deserialize, Serialize};

/// Normalized metrics for one campaign at one point in time.
///
/// Counts are non-negative integers; rates are percentages on a 0-100 scale
/// regardless of the convention the upstream source used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignStatistics {
    #[serde(default)]
    pub subscriber_count: u64,
    #[serde(default)]
    pub delivered_count: u64,
    #[serde(default)]
    pub delivered_rate: f64,
    #[serde(default)]
    pub open_count: u64,
    #[serde(default)]
    pub uniq_open_count: u64,
    #[serde(default)]
    pub uniq_open_rate: f64,
    #[serde(default)]
    pub open_rate: f64,
    #[serde(default)]
    pub click_count: u64,
    #[serde(default)]
    pub click_rate: f64,
    /// Always soft_bounce_count + hard_bounce_count
    #[serde(default)]
    pub bounce_count: u64,
    #[serde(default)]
    pub soft_bounce_count: u64,
    #[serde(default)]
    pub hard_bounce_count: u64,
    #[serde(default)]
    pub unsubscribe_count: u64,
    #[serde(default)]
    pub abuse_complaint_count: u64,
}

impl Default for CampaignStatistics {
    fn default() -> Self {
        Self {
            subscriber_count: 0,
            delivered_count: 0,
            delivered_rate: 0.0,
            open_count: 0,
            uniq_open_count: 0,
            uniq_open_rate: 0.0,
            open_rate: 0.0,
            click_count: 0,
            click_rate: 0.0,
            bounce_count: 0,
            soft_bounce_count: 0,
            hard_bounce_count: 0,
            unsubscribe_count: 0,
            abuse_complaint_count: 0,
        }
    }
}
