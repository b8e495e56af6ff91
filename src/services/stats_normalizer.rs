//! Campaign statistics normalization
//!
//! The upstream API hands statistics back in several shapes depending on the
//! installation version: the standard statistics object, the legacy
//! tracking-log shape with different field names, the direct-API shape, or a
//! previously cached row. Numbers may arrive as integers, floats, or numeric
//! strings, rates as 0-1 fractions or 0-100 percentages, and bounces as one
//! integer or a soft/hard breakdown. This module folds all of that into the
//! canonical [`CampaignStatistics`] record and never fails: malformed input
//! degrades to zeros so one bad campaign cannot block a sync batch.

use serde_json::Value;

use crate::models::stats::CampaignStatistics;

/// Candidate keys for the standard statistics shape, in lookup order.
const SUBSCRIBER_KEYS: &[&str] = &["subscriber_count", "subscribers_count", "total", "subscribers"];
const DELIVERED_KEYS: &[&str] = &["delivered_count", "delivery_count", "delivered"];
const OPEN_KEYS: &[&str] = &["open_count", "opens_count", "opens"];
const UNIQ_OPEN_KEYS: &[&str] = &["uniq_open_count", "unique_open_count", "uniq_opens"];
const CLICK_KEYS: &[&str] = &["click_count", "clicks_count", "clicks"];
const UNSUBSCRIBE_KEYS: &[&str] = &["unsubscribe_count", "unsubscribes_count", "unsubscribes"];
const ABUSE_KEYS: &[&str] = &["abuse_complaint_count", "abuse_feedback_count", "feedback_count"];

/// The legacy tracking-log shape uses bare verb names.
const LEGACY_SUBSCRIBER_KEYS: &[&str] = &["subscribers", "subscriber_count"];
const LEGACY_DELIVERED_KEYS: &[&str] = &["delivered", "delivered_count"];
const LEGACY_OPEN_KEYS: &[&str] = &["opens", "open_count"];
const LEGACY_UNIQ_OPEN_KEYS: &[&str] = &["uniq_opens", "uniq_open_count"];
const LEGACY_CLICK_KEYS: &[&str] = &["clicks", "click_count"];
const LEGACY_UNSUBSCRIBE_KEYS: &[&str] = &["unsubscribes", "unsubscribe_count"];
const LEGACY_ABUSE_KEYS: &[&str] = &["feedbacks", "abuse_feedback_count"];

/// Normalize an arbitrary statistics payload into the canonical record.
///
/// `legacy` marks payloads known to come from the legacy tracking-log
/// endpoint, which uses different field names. The output is always fully
/// populated; this function never errors.
pub fn normalize(raw: &Value, legacy: bool) -> CampaignStatistics {
    let Some(obj) = raw.as_object() else {
        if !raw.is_null() {
            tracing::warn!("Statistics payload is not an object, returning zeroed record");
        }
        return CampaignStatistics::default();
    };
    if obj.is_empty() {
        return CampaignStatistics::default();
    }

    let subscriber_count = lookup_count(raw, SUBSCRIBER_KEYS, LEGACY_SUBSCRIBER_KEYS, legacy);
    let delivered_count = lookup_count(raw, DELIVERED_KEYS, LEGACY_DELIVERED_KEYS, legacy);
    let open_count = lookup_count(raw, OPEN_KEYS, LEGACY_OPEN_KEYS, legacy);
    let uniq_open_count = lookup_count(raw, UNIQ_OPEN_KEYS, LEGACY_UNIQ_OPEN_KEYS, legacy);
    let click_count = lookup_count(raw, CLICK_KEYS, LEGACY_CLICK_KEYS, legacy);
    let unsubscribe_count = lookup_count(raw, UNSUBSCRIBE_KEYS, LEGACY_UNSUBSCRIBE_KEYS, legacy);
    let abuse_complaint_count = lookup_count(raw, ABUSE_KEYS, LEGACY_ABUSE_KEYS, legacy);

    let delivered_rate = resolve_rate(
        raw,
        &["delivered_rate", "delivery_rate"],
        delivered_count,
        subscriber_count,
    );
    let uniq_open_rate = resolve_rate(
        raw,
        &["uniq_open_rate", "unique_open_rate"],
        uniq_open_count,
        delivered_count,
    );
    let click_rate = resolve_rate(raw, &["click_rate"], click_count, delivered_count);
    // Some payloads carry an explicit non-unique open rate; otherwise it
    // mirrors the unique one.
    let open_rate = match first_value(raw, &["open_rate"]) {
        Some(v) => scale_rate(coerce_number(v)),
        None => uniq_open_rate,
    };

    let (bounce_count, soft_bounce_count, hard_bounce_count) = resolve_bounces(raw, legacy);

    CampaignStatistics {
        subscriber_count,
        delivered_count,
        delivered_rate,
        open_count,
        uniq_open_count,
        uniq_open_rate,
        open_rate,
        click_count,
        click_rate,
        bounce_count,
        soft_bounce_count,
        hard_bounce_count,
        unsubscribe_count,
        abuse_complaint_count,
    }
}

/// First value present under any of the candidate keys.
fn first_value<'a>(raw: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| raw.get(key))
        .find(|v| !v.is_null())
}

fn lookup_count(raw: &Value, standard: &[&str], legacy_keys: &[&str], legacy: bool) -> u64 {
    let value = if legacy {
        first_value(raw, legacy_keys).or_else(|| first_value(raw, standard))
    } else {
        first_value(raw, standard).or_else(|| first_value(raw, legacy_keys))
    };
    value.map(coerce_count).unwrap_or(0)
}

/// Coerce any scalar to a non-negative count. Non-numeric input becomes 0.
fn coerce_count(value: &Value) -> u64 {
    coerce_number(value).max(0.0).round() as u64
}

/// Coerce any scalar to f64. Strings must parse in full ("12.5abc" is 0).
fn coerce_number(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Rescale an explicit rate to the 0-100 convention.
///
/// A value inside [0,1] is ambiguous between "a small percentage" and "a
/// fraction"; upstream sources that emit fractions dominate there, so it is
/// multiplied by 100. Anything outside [0,1] is already a percentage.
fn scale_rate(rate: f64) -> f64 {
    let scaled = if (0.0..=1.0).contains(&rate) {
        rate * 100.0
    } else {
        rate
    };
    scaled.clamp(0.0, 100.0)
}

/// Explicit rate when the payload carries one, otherwise computed from the
/// count pair. A present-but-garbage rate coerces to 0 rather than falling
/// back to the computed value.
fn resolve_rate(raw: &Value, rate_keys: &[&str], count: u64, total: u64) -> f64 {
    match first_value(raw, rate_keys) {
        Some(v) => scale_rate(coerce_number(v)),
        None => {
            if total == 0 {
                0.0
            } else {
                (count as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
            }
        }
    }
}

/// Accepts bounces as a bare integer, a soft/hard breakdown, or both.
///
/// Returns (total, soft, hard). When a breakdown exists the total is always
/// recomputed as soft + hard, overriding any reported total. A bare integer
/// keeps the reported total with a zero breakdown.
fn resolve_bounces(raw: &Value, legacy: bool) -> (u64, u64, u64) {
    let bounce_obj = first_value(raw, &["bounce", "bounced", "bounces"]).filter(|v| v.is_object());

    let soft = first_value(raw, &["soft_bounce_count", "soft_bounces"])
        .or_else(|| bounce_obj.and_then(|b| first_value(b, &["soft_bounce_count", "soft"])));
    let hard = first_value(raw, &["hard_bounce_count", "hard_bounces"])
        .or_else(|| bounce_obj.and_then(|b| first_value(b, &["hard_bounce_count", "hard"])));

    if soft.is_some() || hard.is_some() {
        let soft = soft.map(coerce_count).unwrap_or(0);
        let hard = hard.map(coerce_count).unwrap_or(0);
        return (soft + hard, soft, hard);
    }

    let total_keys: &[&str] = if legacy {
        &["bounced", "bounce_count"]
    } else {
        &["bounce_count", "bounced"]
    };
    let total = first_value(raw, total_keys)
        .filter(|v| !v.is_object())
        .or_else(|| bounce_obj.and_then(|b| first_value(b, &["bounce_count", "total"])))
        .map(coerce_count)
        .unwrap_or(0);

    (total, 0, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_payload_is_zeroed() {
        let stats = normalize(&json!({}), false);
        assert_eq!(stats, CampaignStatistics::default());
    }

    #[test]
    fn test_non_object_payload_is_zeroed() {
        assert_eq!(normalize(&json!(null), false), CampaignStatistics::default());
        assert_eq!(normalize(&json!([1, 2]), false), CampaignStatistics::default());
        assert_eq!(normalize(&json!("nope"), true), CampaignStatistics::default());
    }

    #[test]
    fn test_standard_shape() {
        let stats = normalize(
            &json!({
                "subscriber_count": 200,
                "delivered_count": 180,
                "delivered_rate": 90.0,
                "open_count": 60,
                "uniq_open_count": 50,
                "uniq_open_rate": 27.7,
                "click_count": 20,
                "click_rate": 11.1,
                "bounce_count": 12,
                "unsubscribe_count": 3,
                "abuse_complaint_count": 1
            }),
            false,
        );
        assert_eq!(stats.subscriber_count, 200);
        assert_eq!(stats.delivered_count, 180);
        assert_eq!(stats.delivered_rate, 90.0);
        assert_eq!(stats.uniq_open_count, 50);
        assert_eq!(stats.click_count, 20);
        assert_eq!(stats.bounce_count, 12);
        assert_eq!(stats.soft_bounce_count, 0);
        assert_eq!(stats.hard_bounce_count, 0);
        assert_eq!(stats.unsubscribe_count, 3);
        assert_eq!(stats.abuse_complaint_count, 1);
    }

    #[test]
    fn test_legacy_tracking_log_shape() {
        let stats = normalize(
            &json!({
                "subscribers": 100,
                "delivered": 80,
                "opens": 40,
                "uniq_opens": 30,
                "clicks": 10,
                "bounced": 5,
                "unsubscribes": 2,
                "feedbacks": 1
            }),
            true,
        );
        assert_eq!(stats.subscriber_count, 100);
        assert_eq!(stats.delivered_count, 80);
        assert_eq!(stats.open_count, 40);
        assert_eq!(stats.uniq_open_count, 30);
        assert_eq!(stats.click_count, 10);
        assert_eq!(stats.bounce_count, 5);
        assert_eq!(stats.unsubscribe_count, 2);
        assert_eq!(stats.abuse_complaint_count, 1);
        // No explicit rates in the legacy shape: computed from counts
        assert_eq!(stats.delivered_rate, 80.0);
        assert_eq!(stats.uniq_open_rate, 37.5);
        assert_eq!(stats.click_rate, 12.5);
    }

    #[test]
    fn test_numeric_strings_are_coerced() {
        let stats = normalize(
            &json!({
                "subscriber_count": "250",
                "delivered_count": "240",
                "delivered_rate": "96",
                "click_count": "12.0"
            }),
            false,
        );
        assert_eq!(stats.subscriber_count, 250);
        assert_eq!(stats.delivered_count, 240);
        assert_eq!(stats.delivered_rate, 96.0);
        assert_eq!(stats.click_count, 12);
    }

    #[test]
    fn test_malformed_rate_coerces_to_zero() {
        // Partial-prefix numbers do not count as numbers
        let stats = normalize(&json!({"delivered_rate": "12.5abc"}), false);
        assert_eq!(stats.delivered_rate, 0.0);
    }

    #[test]
    fn test_malformed_field_does_not_poison_others() {
        let stats = normalize(
            &json!({
                "delivered_rate": "12.5abc",
                "delivered_count": 80,
                "uniq_open_count": "oops",
                "click_count": 4
            }),
            false,
        );
        assert_eq!(stats.delivered_rate, 0.0);
        assert_eq!(stats.delivered_count, 80);
        assert_eq!(stats.uniq_open_count, 0);
        assert_eq!(stats.click_count, 4);
    }

    #[test]
    fn test_negative_counts_clamp_to_zero() {
        let stats = normalize(&json!({"delivered_count": -4, "subscriber_count": "-1"}), false);
        assert_eq!(stats.delivered_count, 0);
        assert_eq!(stats.subscriber_count, 0);
    }

    #[test]
    fn test_fraction_rate_is_rescaled() {
        let stats = normalize(&json!({"delivered_rate": 0.42}), false);
        assert_eq!(stats.delivered_rate, 42.0);
    }

    #[test]
    fn test_percentage_rate_stays_as_is() {
        let stats = normalize(&json!({"delivered_rate": 42.0}), false);
        assert_eq!(stats.delivered_rate, 42.0);
    }

    #[test]
    fn test_rate_boundaries() {
        assert_eq!(normalize(&json!({"click_rate": 1.0}), false).click_rate, 100.0);
        assert_eq!(normalize(&json!({"click_rate": 0}), false).click_rate, 0.0);
        // Out-of-range percentages clamp into [0,100]
        assert_eq!(normalize(&json!({"click_rate": 150.0}), false).click_rate, 100.0);
        assert_eq!(normalize(&json!({"click_rate": -3.0}), false).click_rate, 0.0);
    }

    #[test]
    fn test_rate_computed_from_counts_when_absent() {
        let stats = normalize(
            &json!({"subscriber_count": 200, "delivered_count": 150}),
            false,
        );
        assert_eq!(stats.delivered_rate, 75.0);
    }

    #[test]
    fn test_rate_zero_when_total_zero() {
        let stats = normalize(&json!({"subscriber_count": 0, "delivered_count": 0}), false);
        assert_eq!(stats.delivered_rate, 0.0);
    }

    #[test]
    fn test_bounce_integer_only() {
        let stats = normalize(&json!({"bounce_count": 7}), false);
        assert_eq!(stats.bounce_count, 7);
        assert_eq!(stats.soft_bounce_count, 0);
        assert_eq!(stats.hard_bounce_count, 0);
    }

    #[test]
    fn test_bounce_parts_only() {
        let stats = normalize(&json!({"bounce": {"soft": 3, "hard": 4}}), false);
        assert_eq!(stats.soft_bounce_count, 3);
        assert_eq!(stats.hard_bounce_count, 4);
        assert_eq!(stats.bounce_count, stats.soft_bounce_count + stats.hard_bounce_count);
    }

    #[test]
    fn test_bounce_parts_and_total_recomputes_total() {
        // Reported total disagrees with the breakdown; the breakdown wins
        let stats = normalize(
            &json!({"bounce": {"soft": 3, "hard": 4, "total": 99}}),
            false,
        );
        assert_eq!(stats.bounce_count, 7);
        assert_eq!(stats.bounce_count, stats.soft_bounce_count + stats.hard_bounce_count);
    }

    #[test]
    fn test_bounce_top_level_breakdown() {
        let stats = normalize(
            &json!({"soft_bounce_count": 2, "hard_bounce_count": 5, "bounce_count": 9}),
            false,
        );
        assert_eq!(stats.soft_bounce_count, 2);
        assert_eq!(stats.hard_bounce_count, 5);
        assert_eq!(stats.bounce_count, 7);
    }

    #[test]
    fn test_open_rate_mirrors_uniq_open_rate_when_absent() {
        let stats = normalize(
            &json!({"delivered_count": 100, "uniq_open_count": 25}),
            false,
        );
        assert_eq!(stats.uniq_open_rate, 25.0);
        assert_eq!(stats.open_rate, 25.0);
    }

    #[test]
    fn test_explicit_open_rate_wins() {
        let stats = normalize(
            &json!({"uniq_open_rate": 20.0, "open_rate": 35.0}),
            false,
        );
        assert_eq!(stats.uniq_open_rate, 20.0);
        assert_eq!(stats.open_rate, 35.0);
    }

    #[test]
    fn test_cached_row_round_trip() {
        // A previously cached canonical record passes through unchanged
        let original = normalize(
            &json!({
                "subscriber_count": 100,
                "delivered_count": 90,
                "delivered_rate": 90.0,
                "uniq_open_count": 45,
                "uniq_open_rate": 50.0,
                "click_count": 9,
                "click_rate": 10.0,
                "soft_bounce_count": 1,
                "hard_bounce_count": 2
            }),
            false,
        );
        let reparsed = normalize(&serde_json::to_value(&original).unwrap(), false);
        assert_eq!(original, reparsed);
    }
}
