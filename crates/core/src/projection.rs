//! Display projection of alerts: message text, severity and the per-device
//! recent-alert flag.

use chrono::Duration;
use serde::Serialize;

use crate::alert::Alert;
use crate::rule::{AlertRule, RuleKind};
use crate::types::{DbId, DeviceId, Timestamp};

/// How far back, in hours, an alert counts towards [`has_recent_alert`].
pub const RECENT_ALERT_HOURS: i64 = 24;

/// Severity shown next to an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Warning,
    Critical,
}

impl AlertLevel {
    pub fn for_kind(kind: RuleKind) -> Self {
        match kind {
            RuleKind::High | RuleKind::RateChange | RuleKind::Error => AlertLevel::Critical,
            RuleKind::Low | RuleKind::Battery | RuleKind::Unknown => AlertLevel::Warning,
        }
    }
}

/// Human-readable text for an alert of `kind`.
///
/// `threshold` comes from the rule (mm); `observed` is the stored triggering
/// value, which for `battery` is in millivolts.
pub fn alert_message(kind: RuleKind, threshold: Option<f64>, observed: Option<f64>) -> String {
    match (kind, threshold, observed) {
        (RuleKind::High, Some(threshold), _) => format!("Water level above {threshold}mm"),
        (RuleKind::Low, Some(threshold), _) => format!("Water level below {threshold}mm"),
        (RuleKind::RateChange, _, _) => "Rapid water level change detected".to_string(),
        (RuleKind::Battery, _, Some(mv)) => format!("Low battery voltage ({:.2}V)", mv / 1000.0),
        (RuleKind::Battery, _, None) => "Low battery voltage".to_string(),
        (RuleKind::Error, _, _) => "Device error detected".to_string(),
        (RuleKind::High | RuleKind::Low | RuleKind::Unknown, _, _) => "Alert triggered".to_string(),
    }
}

/// An alert as presented to readers of the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertView {
    pub id: DbId,
    pub device_id: DeviceId,
    pub kind: RuleKind,
    pub level: AlertLevel,
    pub message: String,
    pub observed_value: Option<f64>,
    pub first_observed_at: Timestamp,
    pub last_observed_at: Timestamp,
    pub closed_at: Option<Timestamp>,
    pub active: bool,
}

/// Project one alert, using `rule` for the threshold when one is known.
pub fn project(alert: &Alert, rule: Option<&AlertRule>) -> AlertView {
    let threshold = rule.and_then(|r| r.threshold);
    AlertView {
        id: alert.id,
        device_id: alert.device_id.clone(),
        kind: alert.rule_kind,
        level: AlertLevel::for_kind(alert.rule_kind),
        message: alert_message(alert.rule_kind, threshold, alert.observed_value),
        observed_value: alert.observed_value,
        first_observed_at: alert.first_observed_at,
        last_observed_at: alert.last_observed_at,
        closed_at: alert.closed_at,
        active: alert.is_active(),
    }
}

/// Project alerts against the current rule set.
///
/// The threshold shown is that of the lowest-id rule of the same device and
/// kind; rules that were since deleted simply leave it unknown.
pub fn project_all(alerts: &[Alert], rules: &[AlertRule]) -> Vec<AlertView> {
    alerts
        .iter()
        .map(|alert| {
            let rule = rules
                .iter()
                .filter(|r| {
                    r.kind == alert.rule_kind && r.device_id.as_deref() == Some(alert.device_id.as_str())
                })
                .min_by_key(|r| r.id);
            project(alert, rule)
        })
        .collect()
}

/// Whether `device_id` had an alert first observed in the last 24 hours.
pub fn has_recent_alert(device_id: &str, alerts: &[Alert], now: Timestamp) -> bool {
    let since = now - Duration::hours(RECENT_ALERT_HOURS);
    alerts
        .iter()
        .any(|a| a.device_id == device_id && a.first_observed_at >= since)
}
