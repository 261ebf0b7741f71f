//! Periodic rule evaluation.
//!
//! Every tick evaluates all sensors in parallel through the [`AlertEngine`]
//! and publishes one [`MonitorEvent`] per alert transition. Runs on a fixed
//! interval until cancelled.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use flooddash_core::rules::engine::{AlertEngine, DeviceEvaluation, EvaluationError};
use flooddash_core::store::{with_timeout, RuleStore};
use flooddash_core::types::Timestamp;
use flooddash_events::{EventBus, MonitorEvent};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Outcome counts of one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub devices: usize,
    pub failed: usize,
    pub events: usize,
}

/// Evaluate every sensor at `at` and publish the resulting alert events.
pub async fn evaluate_tick(engine: &AlertEngine, bus: &EventBus, at: Timestamp) -> TickSummary {
    let results = match engine.evaluate_all(at).await {
        Ok(results) => results,
        Err(e) => {
            tracing::error!(error = %e, "Device directory unavailable, tick skipped");
            return TickSummary::default();
        }
    };

    let mut summary = TickSummary {
        devices: results.len(),
        ..Default::default()
    };
    for (device_id, result) in results {
        match result {
            Ok(evaluation) => summary.events += publish_changes(bus, &evaluation),
            Err(EvaluationError::PartialCommit { evaluation, source }) => {
                // The written kinds are already in the store; announce them now.
                summary.failed += 1;
                summary.events += publish_changes(bus, &evaluation);
                tracing::warn!(
                    device_id = %device_id,
                    error = %source,
                    "Device evaluation incomplete"
                );
            }
            Err(e) => {
                summary.failed += 1;
                tracing::warn!(device_id = %device_id, error = %e, "Device evaluation failed");
            }
        }
    }
    summary
}

fn publish_changes(bus: &EventBus, evaluation: &DeviceEvaluation) -> usize {
    for change in &evaluation.changes {
        let targets = evaluation.notify_targets(change.alert().rule_kind);
        bus.publish(MonitorEvent::from_change(change, &targets));
    }
    evaluation.changes.len()
}

/// Log rules that can never be scheduled because they name no sensor.
pub async fn report_unassigned_rules(rules: &dyn RuleStore, timeout: Duration) {
    match with_timeout("rule", timeout, rules.list_rules(None)).await {
        Ok(all) => {
            let unassigned: Vec<_> = all
                .iter()
                .filter(|r| r.device_id.is_none())
                .map(|r| r.id)
                .collect();
            if !unassigned.is_empty() {
                tracing::info!(
                    count = unassigned.len(),
                    rule_ids = ?unassigned,
                    "Rules without a device are ignored"
                );
            }
        }
        Err(e) => tracing::warn!(error = %e, "Could not list rules"),
    }
}

/// Run the evaluation loop until `cancel` is triggered.
pub async fn run(
    engine: Arc<AlertEngine>,
    bus: Arc<EventBus>,
    every: Duration,
    cancel: CancellationToken,
) {
    tracing::info!(interval_secs = every.as_secs(), "Evaluation loop started");

    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Evaluation loop stopping");
                break;
            }
            _ = interval.tick() => {
                let at = Utc::now();
                let summary = evaluate_tick(&engine, &bus, at).await;
                if summary.failed > 0 || summary.events > 0 {
                    tracing::info!(
                        devices = summary.devices,
                        failed = summary.failed,
                        events = summary.events,
                        "Evaluation tick complete"
                    );
                } else {
                    tracing::debug!(devices = summary.devices, "Evaluation tick complete");
                }
            }
        }
    }
}
