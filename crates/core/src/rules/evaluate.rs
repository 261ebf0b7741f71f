//! Pure rule evaluation against a device's latest signals.

use std::collections::BTreeMap;

use crate::calibration::CalibratedPoint;
use crate::rule::{AlertRule, RuleCondition, RuleKind};
use crate::rules::EngineConfig;
use crate::series::CalibratedSeries;
use crate::telemetry::TelemetrySnapshot;
use crate::types::DbId;

/// Everything rule evaluation may look at for one device at one tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceSignals {
    pub latest: Option<CalibratedPoint>,
    pub previous: Option<CalibratedPoint>,
    pub telemetry: Option<TelemetrySnapshot>,
}

impl DeviceSignals {
    pub fn new(series: Option<&CalibratedSeries>, telemetry: Option<TelemetrySnapshot>) -> Self {
        let latest = series.and_then(CalibratedSeries::latest);
        let previous = series.and_then(CalibratedSeries::last_two).map(|(prev, _)| prev);
        Self {
            latest,
            previous,
            telemetry,
        }
    }
}

/// Outcome of checking one condition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    /// The condition holds. `observed` is the triggering value when the kind
    /// has one (mm, mm/s or mV).
    Firing { observed: Option<f64> },
    /// The condition was checked and does not hold.
    Clear,
    /// Input is missing this tick; nothing may change.
    NotEvaluable,
}

/// Verdict of one rule of the device's rule set.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleVerdict {
    pub rule_id: DbId,
    pub kind: RuleKind,
    pub verdict: Verdict,
}

/// Check a single condition.
pub fn evaluate_condition(
    condition: RuleCondition,
    signals: &DeviceSignals,
    config: &EngineConfig,
) -> Verdict {
    match condition {
        RuleCondition::Above(threshold) => match signals.latest {
            Some(point) if point.value > threshold => Verdict::Firing {
                observed: Some(point.value),
            },
            Some(_) => Verdict::Clear,
            None => Verdict::NotEvaluable,
        },
        RuleCondition::Below(threshold) => match signals.latest {
            Some(point) if point.value < threshold => Verdict::Firing {
                observed: Some(point.value),
            },
            Some(_) => Verdict::Clear,
            None => Verdict::NotEvaluable,
        },
        RuleCondition::RapidChange => match (signals.previous, signals.latest) {
            (Some(previous), Some(latest)) => {
                // None only on overflow, about 292k years apart.
                let elapsed_us = (latest.timestamp - previous.timestamp)
                    .num_microseconds()
                    .unwrap_or(i64::MAX);
                if elapsed_us <= 0 {
                    return Verdict::NotEvaluable;
                }
                let rate = (latest.value - previous.value).abs() / (elapsed_us as f64 / 1_000_000.0);
                if rate > config.rate_limit_mm_per_sec {
                    Verdict::Firing {
                        observed: Some(rate),
                    }
                } else {
                    Verdict::Clear
                }
            }
            _ => Verdict::NotEvaluable,
        },
        RuleCondition::LowBattery => {
            match signals.telemetry.as_ref().and_then(|t| t.battery_mv) {
                Some(mv) if mv < config.low_battery_mv => Verdict::Firing {
                    observed: Some(f64::from(mv)),
                },
                Some(_) => Verdict::Clear,
                None => Verdict::NotEvaluable,
            }
        }
        RuleCondition::DeviceError => match signals.telemetry.as_ref() {
            Some(telemetry) if telemetry.reports_error() => Verdict::Firing { observed: None },
            Some(_) => Verdict::Clear,
            None => Verdict::NotEvaluable,
        },
    }
}

/// Evaluate every enabled rule of `device_id`.
///
/// Disabled rules, rules of other devices and rules with a configuration
/// gap are skipped and produce no verdict.
pub fn evaluate_rules(
    device_id: &str,
    rules: &[AlertRule],
    signals: &DeviceSignals,
    config: &EngineConfig,
) -> Vec<RuleVerdict> {
    rules
        .iter()
        .filter(|rule| rule.applies_to(device_id))
        .filter_map(|rule| match rule.condition() {
            Ok(condition) => Some(RuleVerdict {
                rule_id: rule.id,
                kind: rule.kind,
                verdict: evaluate_condition(condition, signals, config),
            }),
            Err(gap) => {
                tracing::debug!(
                    rule_id = rule.id,
                    device_id,
                    reason = %gap,
                    "Skipping rule that can never fire"
                );
                None
            }
        })
        .collect()
}

/// Collapse per-rule verdicts into one verdict per alert kind.
///
/// A kind fires if any of its rules fires, is clear if at least one rule was
/// evaluable and none fired, and is absent when nothing could be evaluated.
pub fn resolve_by_kind(verdicts: &[RuleVerdict]) -> BTreeMap<RuleKind, Verdict> {
    let mut resolved: BTreeMap<RuleKind, Verdict> = BTreeMap::new();
    for v in verdicts {
        match (resolved.get(&v.kind).copied(), v.verdict) {
            (_, Verdict::NotEvaluable) => {}
            (Some(Verdict::Firing { .. }), _) => {}
            (_, verdict) => {
                resolved.insert(v.kind, verdict);
            }
        }
    }
    resolved
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::{Duration, TimeZone, Utc};

    use super::*;
    use crate::types::Timestamp;

    fn t0() -> Timestamp {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    fn level(value: f64) -> DeviceSignals {
        DeviceSignals {
            latest: Some(CalibratedPoint {
                timestamp: t0(),
                value,
            }),
            ..Default::default()
        }
    }

    fn change(from: f64, to: f64, seconds: i64) -> DeviceSignals {
        DeviceSignals {
            previous: Some(CalibratedPoint {
                timestamp: t0(),
                value: from,
            }),
            latest: Some(CalibratedPoint {
                timestamp: t0() + Duration::seconds(seconds),
                value: to,
            }),
            telemetry: None,
        }
    }

    fn health(battery_mv: Option<i32>, error_state: Option<&str>) -> DeviceSignals {
        DeviceSignals {
            telemetry: Some(TelemetrySnapshot {
                battery_mv,
                error_state: error_state.map(str::to_string),
                observed_at: t0(),
            }),
            ..Default::default()
        }
    }

    fn rule(id: DbId, kind: RuleKind, threshold: Option<f64>) -> AlertRule {
        AlertRule {
            id,
            device_id: Some("dev".to_string()),
            kind,
            threshold,
            enabled: true,
            notify_target: None,
        }
    }

    #[test]
    fn high_and_low_use_strict_inequality() {
        let config = EngineConfig::default();
        assert_eq!(
            evaluate_condition(RuleCondition::Above(100.0), &level(100.0), &config),
            Verdict::Clear
        );
        assert_eq!(
            evaluate_condition(RuleCondition::Below(100.0), &level(100.0), &config),
            Verdict::Clear
        );
        assert_eq!(
            evaluate_condition(RuleCondition::Above(100.0), &level(100.5), &config),
            Verdict::Firing {
                observed: Some(100.5)
            }
        );
        assert_eq!(
            evaluate_condition(RuleCondition::Below(100.0), &level(99.0), &config),
            Verdict::Firing {
                observed: Some(99.0)
            }
        );
    }

    #[test]
    fn threshold_rules_without_readings_are_not_evaluable() {
        let config = EngineConfig::default();
        let signals = DeviceSignals::default();
        assert_eq!(
            evaluate_condition(RuleCondition::Above(1.0), &signals, &config),
            Verdict::NotEvaluable
        );
    }

    #[test]
    fn rate_change_compares_against_configured_limit() {
        let config = EngineConfig {
            rate_limit_mm_per_sec: 100.0,
            ..Default::default()
        };
        assert_eq!(
            evaluate_condition(RuleCondition::RapidChange, &change(0.0, 500.0, 1), &config),
            Verdict::Firing {
                observed: Some(500.0)
            }
        );
        assert_eq!(
            evaluate_condition(RuleCondition::RapidChange, &change(0.0, 500.0, 10), &config),
            Verdict::Clear
        );
        assert_eq!(
            evaluate_condition(RuleCondition::RapidChange, &change(500.0, 0.0, 1), &config),
            Verdict::Firing {
                observed: Some(500.0)
            }
        );
    }

    #[test]
    fn rate_change_needs_two_distinct_instants() {
        let config = EngineConfig::default();
        assert_eq!(
            evaluate_condition(RuleCondition::RapidChange, &level(10.0), &config),
            Verdict::NotEvaluable
        );
        assert_eq!(
            evaluate_condition(RuleCondition::RapidChange, &change(0.0, 10.0, 0), &config),
            Verdict::NotEvaluable
        );
    }

    #[test]
    fn rate_change_keeps_sub_millisecond_precision() {
        let config = EngineConfig {
            rate_limit_mm_per_sec: 1000.0,
            ..Default::default()
        };
        let close_pair = |micros: i64, to: f64| DeviceSignals {
            previous: Some(CalibratedPoint {
                timestamp: t0(),
                value: 0.0,
            }),
            latest: Some(CalibratedPoint {
                timestamp: t0() + Duration::microseconds(micros),
                value: to,
            }),
            telemetry: None,
        };

        // 1 mm over 500 µs is 2000 mm/s.
        assert_matches!(
            evaluate_condition(RuleCondition::RapidChange, &close_pair(500, 1.0), &config),
            Verdict::Firing { observed: Some(rate) } if (rate - 2000.0).abs() < 1e-6
        );
        // 1.5 mm over 1.9 ms is about 789 mm/s, under the limit.
        assert_eq!(
            evaluate_condition(RuleCondition::RapidChange, &close_pair(1_900, 1.5), &config),
            Verdict::Clear
        );
    }

    #[test]
    fn battery_below_floor_fires() {
        let config = EngineConfig {
            low_battery_mv: 3300,
            ..Default::default()
        };
        assert_eq!(
            evaluate_condition(RuleCondition::LowBattery, &health(Some(3299), None), &config),
            Verdict::Firing {
                observed: Some(3299.0)
            }
        );
        assert_eq!(
            evaluate_condition(RuleCondition::LowBattery, &health(Some(3300), None), &config),
            Verdict::Clear
        );
        assert_eq!(
            evaluate_condition(RuleCondition::LowBattery, &health(None, None), &config),
            Verdict::NotEvaluable
        );
    }

    #[test]
    fn error_state_fires_without_a_value() {
        let config = EngineConfig::default();
        assert_eq!(
            evaluate_condition(
                RuleCondition::DeviceError,
                &health(None, Some("probe_fault")),
                &config
            ),
            Verdict::Firing { observed: None }
        );
        assert_eq!(
            evaluate_condition(RuleCondition::DeviceError, &health(None, Some("ok")), &config),
            Verdict::Clear
        );
        assert_eq!(
            evaluate_condition(
                RuleCondition::DeviceError,
                &DeviceSignals::default(),
                &config
            ),
            Verdict::NotEvaluable
        );
    }

    #[test]
    fn rule_set_skips_gaps_disabled_and_foreign_rules() {
        let mut disabled = rule(2, RuleKind::High, Some(10.0));
        disabled.enabled = false;
        let mut foreign = rule(3, RuleKind::High, Some(10.0));
        foreign.device_id = Some("other".to_string());
        let mut orphan = rule(4, RuleKind::High, Some(10.0));
        orphan.device_id = None;
        let rules = vec![
            rule(1, RuleKind::High, None),
            disabled,
            foreign,
            orphan,
            rule(5, RuleKind::Unknown, Some(10.0)),
            rule(6, RuleKind::High, Some(10.0)),
        ];

        let verdicts = evaluate_rules("dev", &rules, &level(50.0), &EngineConfig::default());
        assert_eq!(verdicts.len(), 1);
        assert_eq!(verdicts[0].rule_id, 6);
        assert_matches!(verdicts[0].verdict, Verdict::Firing { .. });
    }

    #[test]
    fn any_firing_rule_wins_for_its_kind() {
        let verdicts = vec![
            RuleVerdict {
                rule_id: 1,
                kind: RuleKind::High,
                verdict: Verdict::Clear,
            },
            RuleVerdict {
                rule_id: 2,
                kind: RuleKind::High,
                verdict: Verdict::Firing {
                    observed: Some(120.0),
                },
            },
            RuleVerdict {
                rule_id: 3,
                kind: RuleKind::High,
                verdict: Verdict::Clear,
            },
            RuleVerdict {
                rule_id: 4,
                kind: RuleKind::Battery,
                verdict: Verdict::NotEvaluable,
            },
            RuleVerdict {
                rule_id: 5,
                kind: RuleKind::Low,
                verdict: Verdict::Clear,
            },
        ];

        let resolved = resolve_by_kind(&verdicts);
        assert_eq!(
            resolved.get(&RuleKind::High),
            Some(&Verdict::Firing {
                observed: Some(120.0)
            })
        );
        assert_eq!(resolved.get(&RuleKind::Low), Some(&Verdict::Clear));
        assert!(!resolved.contains_key(&RuleKind::Battery));
    }
}
