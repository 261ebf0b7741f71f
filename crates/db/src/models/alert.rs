//! Alert rule and alert lifecycle rows.

use flooddash_core::alert::{Alert, AlertUpsert};
use flooddash_core::rule::{AlertRule, RuleKind};
use flooddash_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

// ---------------------------------------------------------------------------
// Alert rules
// ---------------------------------------------------------------------------

/// A row from the `alert_rules` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AlertRuleRow {
    pub id: DbId,
    pub device_id: Option<String>,
    pub email: String,
    #[sqlx(rename = "type")]
    pub rule_type: String,
    pub threshold: Option<f64>,
    pub enabled: bool,
    pub created_at: Timestamp,
}

impl From<AlertRuleRow> for AlertRule {
    fn from(row: AlertRuleRow) -> Self {
        let kind = RuleKind::parse(&row.rule_type);
        if kind == RuleKind::Unknown {
            tracing::debug!(rule_id = row.id, rule_type = %row.rule_type, "Unrecognised alert rule type");
        }
        AlertRule {
            id: row.id,
            device_id: row.device_id,
            kind,
            threshold: row.threshold,
            enabled: row.enabled,
            notify_target: Some(row.email).filter(|e| !e.trim().is_empty()),
        }
    }
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

/// A row from the `alerts` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AlertRow {
    pub id: DbId,
    pub device_id: String,
    #[sqlx(rename = "type")]
    pub rule_type: String,
    pub value: Option<f64>,
    pub first_observed_at: Timestamp,
    pub last_observed_at: Timestamp,
    pub closed_at: Option<Timestamp>,
}

impl From<AlertRow> for Alert {
    fn from(row: AlertRow) -> Self {
        Alert {
            id: row.id,
            device_id: row.device_id,
            rule_kind: RuleKind::parse(&row.rule_type),
            observed_value: row.value,
            first_observed_at: row.first_observed_at,
            last_observed_at: row.last_observed_at,
            closed_at: row.closed_at,
        }
    }
}

/// An alert row returned by the open-or-update upsert, with whether the
/// statement inserted it.
#[derive(Debug, Clone, FromRow)]
pub struct UpsertedAlertRow {
    #[sqlx(flatten)]
    pub alert: AlertRow,
    pub inserted: bool,
}

impl From<UpsertedAlertRow> for AlertUpsert {
    fn from(row: UpsertedAlertRow) -> Self {
        if row.inserted {
            AlertUpsert::Opened(row.alert.into())
        } else {
            AlertUpsert::Updated(row.alert.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn rule_row(rule_type: &str, email: &str) -> AlertRuleRow {
        AlertRuleRow {
            id: 4,
            device_id: Some("a".to_string()),
            email: email.to_string(),
            rule_type: rule_type.to_string(),
            threshold: Some(250.0),
            enabled: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn rule_row_parses_kind_and_target() {
        let rule: AlertRule = rule_row("rate_change", "ops@example.com").into();
        assert_eq!(rule.kind, RuleKind::RateChange);
        assert_eq!(rule.notify_target.as_deref(), Some("ops@example.com"));
        assert_eq!(rule.threshold, Some(250.0));
    }

    #[test]
    fn unknown_type_and_blank_email_are_tolerated() {
        let rule: AlertRule = rule_row("flood_of_the_century", " ").into();
        assert_eq!(rule.kind, RuleKind::Unknown);
        assert_eq!(rule.notify_target, None);
    }

    #[test]
    fn open_alert_row_is_active() {
        let now = Utc::now();
        let alert: Alert = AlertRow {
            id: 1,
            device_id: "a".to_string(),
            rule_type: "battery".to_string(),
            value: Some(3100.0),
            first_observed_at: now,
            last_observed_at: now,
            closed_at: None,
        }
        .into();
        assert_eq!(alert.rule_kind, RuleKind::Battery);
        assert!(alert.is_active());
    }

    #[test]
    fn upsert_flag_distinguishes_open_from_update() {
        let now = Utc::now();
        let row = |inserted| UpsertedAlertRow {
            alert: AlertRow {
                id: 2,
                device_id: "a".to_string(),
                rule_type: "high".to_string(),
                value: Some(150.0),
                first_observed_at: now,
                last_observed_at: now,
                closed_at: None,
            },
            inserted,
        };
        assert!(matches!(AlertUpsert::from(row(true)), AlertUpsert::Opened(a) if a.id == 2));
        assert!(matches!(AlertUpsert::from(row(false)), AlertUpsert::Updated(a) if a.id == 2));
    }
}
