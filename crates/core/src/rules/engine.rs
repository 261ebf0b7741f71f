//! Store-backed rule evaluation with alert lifecycle commits.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Duration;
use futures::future::join_all;
use tokio::sync::Mutex;

use crate::alert::{Alert, AlertUpsert};
use crate::device::Device;
use crate::error::StoreError;
use crate::rule::{AlertRule, RuleKind};
use crate::rules::evaluate::{
    evaluate_rules, resolve_by_kind, DeviceSignals, RuleVerdict, Verdict,
};
use crate::rules::state::{AlertStateTable, Transition};
use crate::rules::EngineConfig;
use crate::series::CalibratedSeries;
use crate::store::{with_timeout, Stores};
use crate::types::{DbId, DeviceId, Timestamp};
use crate::window::TimeRange;

/// A change committed to the alert store by one evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum AlertChange {
    Opened(Alert),
    Updated(Alert),
    Closed(Alert),
}

impl AlertChange {
    pub fn alert(&self) -> &Alert {
        match self {
            AlertChange::Opened(alert) | AlertChange::Updated(alert) | AlertChange::Closed(alert) => {
                alert
            }
        }
    }
}

/// What one device evaluation produced.
#[derive(Debug, Clone)]
pub struct DeviceEvaluation {
    pub device_id: DeviceId,
    pub evaluated_at: Timestamp,
    /// The enabled rule set the verdicts were computed from.
    pub rules: Vec<AlertRule>,
    pub verdicts: Vec<RuleVerdict>,
    pub changes: Vec<AlertChange>,
}

impl DeviceEvaluation {
    /// Notify targets of the rules of `kind`, deduplicated, in rule order.
    pub fn notify_targets(&self, kind: RuleKind) -> Vec<String> {
        let mut targets: Vec<String> = Vec::new();
        for target in self
            .rules
            .iter()
            .filter(|r| r.kind == kind)
            .filter_map(|r| r.notify_target.as_ref())
        {
            if !targets.contains(target) {
                targets.push(target.clone());
            }
        }
        targets
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    /// An evaluation for a later instant already committed for this device.
    #[error("stale tick for {device_id}: {at} is before last committed {last}")]
    StaleTick {
        device_id: DeviceId,
        at: Timestamp,
        last: Timestamp,
    },

    /// A store call failed before anything was written for this device.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// An alert write failed after other kinds of the same tick were already
    /// written. `evaluation.changes` holds exactly the changes that reached
    /// the store.
    #[error("alert commit stopped part way: {source}")]
    PartialCommit {
        evaluation: Box<DeviceEvaluation>,
        source: StoreError,
    },
}

/// Serialises evaluations of one device and remembers its last committed tick.
type DeviceGate = Arc<Mutex<Option<Timestamp>>>;

/// Evaluates rule sets against the stores and keeps the state table.
///
/// Evaluations of the same device run one at a time and in time order;
/// different devices may be evaluated concurrently.
pub struct AlertEngine {
    stores: Stores,
    config: EngineConfig,
    states: Mutex<AlertStateTable>,
    gates: Mutex<HashMap<DeviceId, DeviceGate>>,
}

impl AlertEngine {
    pub fn new(stores: Stores, config: EngineConfig) -> Self {
        Self {
            stores,
            config,
            states: Mutex::new(AlertStateTable::new()),
            gates: Mutex::new(HashMap::new()),
        }
    }

    /// A copy of the current `(device, rule) -> state` table.
    pub async fn state_snapshot(&self) -> AlertStateTable {
        self.states.lock().await.clone()
    }

    async fn gate(&self, device_id: &str) -> DeviceGate {
        let mut gates = self.gates.lock().await;
        Arc::clone(gates.entry(device_id.to_string()).or_default())
    }

    /// Evaluate every device in the directory at `at`, in parallel.
    ///
    /// Failures are per device. If the directory itself cannot be listed the
    /// whole tick is skipped.
    pub async fn evaluate_all(
        &self,
        at: Timestamp,
    ) -> Result<Vec<(DeviceId, Result<DeviceEvaluation, EvaluationError>)>, StoreError> {
        let devices = with_timeout(
            "device",
            self.config.fetch_timeout,
            self.stores.devices.list_devices(),
        )
        .await?;

        Ok(join_all(devices.iter().map(|device| async move {
            (device.id.clone(), self.evaluate_device(device, at).await)
        }))
        .await)
    }

    /// Evaluate one device's rule set at `at` and commit the resulting
    /// alert transitions.
    ///
    /// Kinds are written one at a time. A failure while fetching, or on the
    /// first write, leaves the state table, the open alerts and the device's
    /// last tick as they were. A failure on a later write returns
    /// [`EvaluationError::PartialCommit`]: the kinds written before it keep
    /// their changes and rule states, and the last tick advances to `at`, so
    /// a retry at the same instant finishes the remaining kinds.
    pub async fn evaluate_device(
        &self,
        device: &Device,
        at: Timestamp,
    ) -> Result<DeviceEvaluation, EvaluationError> {
        let gate = self.gate(&device.id).await;
        let mut last_tick = gate.lock().await;
        if let Some(last) = *last_tick {
            if at < last {
                return Err(EvaluationError::StaleTick {
                    device_id: device.id.clone(),
                    at,
                    last,
                });
            }
        }

        let result = self.run_tick(device, at).await;
        match &result {
            Ok(evaluation) => {
                *last_tick = Some(at);
                tracing::debug!(
                    device_id = %device.id,
                    verdicts = evaluation.verdicts.len(),
                    changes = evaluation.changes.len(),
                    "Device evaluated"
                );
            }
            Err(EvaluationError::PartialCommit { evaluation, source }) => {
                *last_tick = Some(at);
                tracing::warn!(
                    device_id = %device.id,
                    committed = evaluation.changes.len(),
                    error = %source,
                    "Alert commit stopped part way, remaining kinds left unchanged"
                );
            }
            Err(e) => {
                tracing::warn!(
                    device_id = %device.id,
                    error = %e,
                    "Evaluation skipped, alert state left unchanged"
                );
            }
        }
        result
    }

    async fn run_tick(
        &self,
        device: &Device,
        at: Timestamp,
    ) -> Result<DeviceEvaluation, EvaluationError> {
        let timeout = self.config.fetch_timeout;
        let rules: Vec<AlertRule> = with_timeout(
            "rule",
            timeout,
            self.stores.rules.list_rules(Some(&device.id)),
        )
        .await?
        .into_iter()
        .filter(|rule| rule.applies_to(&device.id))
        .collect();

        let signals = self.fetch_signals(device, at, &rules).await?;
        let verdicts = evaluate_rules(&device.id, &rules, &signals, &self.config);

        let mut changes = Vec::new();
        let mut committed: Vec<RuleKind> = Vec::new();
        let mut failure = None;
        for (kind, verdict) in resolve_by_kind(&verdicts) {
            match self.commit_kind(&device.id, kind, verdict, at).await {
                Ok(change) => {
                    changes.extend(change);
                    committed.push(kind);
                }
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        if failure.is_none() || !committed.is_empty() {
            self.record_transitions(&device.id, &verdicts, &committed).await;
        }

        let evaluation = DeviceEvaluation {
            device_id: device.id.clone(),
            evaluated_at: at,
            rules,
            verdicts,
            changes,
        };
        match failure {
            None => Ok(evaluation),
            Some(source) if committed.is_empty() => Err(EvaluationError::Store(source)),
            Some(source) => Err(EvaluationError::PartialCommit {
                evaluation: Box::new(evaluation),
                source,
            }),
        }
    }

    /// Move the state table forward for the kinds that reached the store and
    /// drop entries of rules that no longer produce a verdict.
    async fn record_transitions(
        &self,
        device_id: &str,
        verdicts: &[RuleVerdict],
        committed: &[RuleKind],
    ) {
        let mut states = self.states.lock().await;

        let current: Vec<DbId> = verdicts.iter().map(|v| v.rule_id).collect();
        let dropped = states.retain_rules(device_id, &current);
        if !dropped.is_empty() {
            tracing::info!(
                device_id,
                rule_ids = ?dropped,
                "Rules no longer evaluated, state cleared"
            );
        }

        for v in verdicts.iter().filter(|v| committed.contains(&v.kind)) {
            if let Some(transition) = states.apply(device_id, v.rule_id, v.verdict) {
                match transition {
                    Transition::Activated => tracing::info!(
                        device_id,
                        rule_id = v.rule_id,
                        kind = %v.kind,
                        "Rule condition became active"
                    ),
                    Transition::Deactivated => tracing::info!(
                        device_id,
                        rule_id = v.rule_id,
                        kind = %v.kind,
                        "Rule condition cleared"
                    ),
                }
            }
        }
    }

    /// Fetch only the signals the rule set needs.
    async fn fetch_signals(
        &self,
        device: &Device,
        at: Timestamp,
        rules: &[AlertRule],
    ) -> Result<DeviceSignals, StoreError> {
        let timeout = self.config.fetch_timeout;
        let needs_readings = rules
            .iter()
            .any(|r| matches!(r.kind, RuleKind::High | RuleKind::Low | RuleKind::RateChange));
        let needs_telemetry = rules
            .iter()
            .any(|r| matches!(r.kind, RuleKind::Battery | RuleKind::Error));

        let series = if needs_readings {
            let lookback = Duration::from_std(self.config.lookback)
                .unwrap_or_else(|_| Duration::hours(1));
            let range = TimeRange::through(at, lookback);
            let readings = with_timeout(
                "reading",
                timeout,
                self.stores.readings.list_readings(&device.id, range.from, range.to),
            )
            .await?;
            Some(CalibratedSeries::from_readings(device, &range, readings))
        } else {
            None
        };

        let telemetry = if needs_telemetry {
            with_timeout(
                "telemetry",
                timeout,
                self.stores.telemetry.get_latest_telemetry(&device.id),
            )
            .await?
        } else {
            None
        };

        Ok(DeviceSignals::new(series.as_ref(), telemetry))
    }

    /// Apply one kind's verdict to the alert store, deduplicating by
    /// `(device, kind)`.
    async fn commit_kind(
        &self,
        device_id: &str,
        kind: RuleKind,
        verdict: Verdict,
        at: Timestamp,
    ) -> Result<Option<AlertChange>, StoreError> {
        let timeout = self.config.fetch_timeout;
        let alerts = &self.stores.alerts;
        match verdict {
            Verdict::Firing { observed } => {
                let upsert = with_timeout(
                    "alert",
                    timeout,
                    alerts.open_or_update_alert(device_id, kind, observed, at),
                )
                .await?;
                match upsert {
                    AlertUpsert::Opened(alert) => {
                        tracing::info!(
                            device_id,
                            kind = %kind,
                            alert_id = alert.id,
                            observed_value = ?observed,
                            "Alert opened"
                        );
                        Ok(Some(AlertChange::Opened(alert)))
                    }
                    AlertUpsert::Updated(alert) => Ok(Some(AlertChange::Updated(alert))),
                }
            }
            Verdict::Clear => {
                let closed =
                    with_timeout("alert", timeout, alerts.close_alert(device_id, kind, at)).await?;
                Ok(closed.map(|alert| {
                    tracing::info!(device_id, kind = %kind, alert_id = alert.id, "Alert closed");
                    AlertChange::Closed(alert)
                }))
            }
            Verdict::NotEvaluable => Ok(None),
        }
    }
}
