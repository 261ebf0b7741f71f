//! In-memory implementation of every store capability.
//!
//! Used by tests and local demos. Supports injecting failures and latency so
//! transient-fetch handling can be exercised without a database.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::alert::{Alert, AlertUpsert};
use crate::calibration::RawReading;
use crate::device::Device;
use crate::error::{StoreError, StoreResult};
use crate::rule::{AlertRule, RuleKind};
use crate::store::{AlertStore, DeviceStore, ReadingStore, RuleStore, TelemetryStore};
use crate::telemetry::TelemetrySnapshot;
use crate::types::{DbId, DeviceId, Timestamp};

#[derive(Debug, Default)]
struct Inner {
    devices: Vec<Device>,
    readings: HashMap<DeviceId, Vec<RawReading>>,
    rules: Vec<AlertRule>,
    alerts: Vec<Alert>,
    telemetry: HashMap<DeviceId, TelemetrySnapshot>,
    next_alert_id: DbId,
    failing_devices: HashSet<DeviceId>,
    failing_alert_writes: HashSet<(DeviceId, RuleKind)>,
    latency: Option<Duration>,
}

/// A process-local store holding devices, readings, rules, alerts and
/// telemetry.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a device.
    pub async fn upsert_device(&self, device: Device) {
        let mut inner = self.inner.write().await;
        match inner.devices.iter_mut().find(|d| d.id == device.id) {
            Some(existing) => *existing = device,
            None => inner.devices.push(device),
        }
    }

    /// Append a reading. Arrival order is kept as-is, like a real table.
    pub async fn push_reading(&self, device_id: &str, timestamp: Timestamp, raw_value: f64) {
        self.inner
            .write()
            .await
            .readings
            .entry(device_id.to_string())
            .or_default()
            .push(RawReading::new(timestamp, raw_value));
    }

    /// Insert or replace a rule by id.
    pub async fn upsert_rule(&self, rule: AlertRule) {
        let mut inner = self.inner.write().await;
        match inner.rules.iter_mut().find(|r| r.id == rule.id) {
            Some(existing) => *existing = rule,
            None => inner.rules.push(rule),
        }
    }

    pub async fn set_telemetry(&self, device_id: &str, snapshot: TelemetrySnapshot) {
        self.inner
            .write()
            .await
            .telemetry
            .insert(device_id.to_string(), snapshot);
    }

    /// Make every per-device call for `device_id` fail as unavailable.
    pub async fn fail_device(&self, device_id: &str) {
        self.inner
            .write()
            .await
            .failing_devices
            .insert(device_id.to_string());
    }

    pub async fn recover_device(&self, device_id: &str) {
        self.inner.write().await.failing_devices.remove(device_id);
    }

    /// Make alert writes for one device and kind fail as unavailable, leaving
    /// every other call for the device working.
    pub async fn fail_alert_writes(&self, device_id: &str, kind: RuleKind) {
        self.inner
            .write()
            .await
            .failing_alert_writes
            .insert((device_id.to_string(), kind));
    }

    pub async fn recover_alert_writes(&self, device_id: &str, kind: RuleKind) {
        self.inner
            .write()
            .await
            .failing_alert_writes
            .remove(&(device_id.to_string(), kind));
    }

    /// Delay every call by `latency`.
    pub async fn set_latency(&self, latency: Option<Duration>) {
        self.inner.write().await.latency = latency;
    }

    /// Every alert ever recorded, open and closed.
    pub async fn all_alerts(&self) -> Vec<Alert> {
        self.inner.read().await.alerts.clone()
    }

    /// Apply configured latency and failure injection for `device_id`.
    async fn gate(&self, store: &'static str, device_id: Option<&str>) -> StoreResult<()> {
        let (latency, failing) = {
            let inner = self.inner.read().await;
            let failing = device_id.is_some_and(|id| inner.failing_devices.contains(id));
            (inner.latency, failing)
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if failing {
            return Err(StoreError::unavailable(store, "injected failure"));
        }
        Ok(())
    }

    async fn gate_alert_write(&self, device_id: &str, kind: RuleKind) -> StoreResult<()> {
        self.gate("alert", Some(device_id)).await?;
        let failing = self
            .inner
            .read()
            .await
            .failing_alert_writes
            .contains(&(device_id.to_string(), kind));
        if failing {
            return Err(StoreError::unavailable("alert", "injected write failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl DeviceStore for InMemoryStore {
    async fn list_devices(&self) -> StoreResult<Vec<Device>> {
        self.gate("device", None).await?;
        Ok(self.inner.read().await.devices.clone())
    }

    async fn get_device(&self, device_id: &str) -> StoreResult<Option<Device>> {
        self.gate("device", Some(device_id)).await?;
        let inner = self.inner.read().await;
        Ok(inner.devices.iter().find(|d| d.id == device_id).cloned())
    }
}

#[async_trait]
impl ReadingStore for InMemoryStore {
    async fn list_readings(
        &self,
        device_id: &str,
        from: Timestamp,
        to: Timestamp,
    ) -> StoreResult<Vec<RawReading>> {
        self.gate("reading", Some(device_id)).await?;
        let inner = self.inner.read().await;
        let mut readings: Vec<RawReading> = inner
            .readings
            .get(device_id)
            .map(|all| {
                all.iter()
                    .filter(|r| from <= r.timestamp && r.timestamp < to)
                    .copied()
                    .collect()
            })
            .unwrap_or_default();
        readings.sort_by_key(|r| r.timestamp);
        Ok(readings)
    }
}

#[async_trait]
impl RuleStore for InMemoryStore {
    async fn list_rules(&self, device_id: Option<&str>) -> StoreResult<Vec<AlertRule>> {
        self.gate("rule", device_id).await?;
        let inner = self.inner.read().await;
        Ok(inner
            .rules
            .iter()
            .filter(|r| device_id.is_none() || r.device_id.as_deref() == device_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl AlertStore for InMemoryStore {
    async fn get_active_alert(
        &self,
        device_id: &str,
        kind: RuleKind,
    ) -> StoreResult<Option<Alert>> {
        self.gate("alert", Some(device_id)).await?;
        let inner = self.inner.read().await;
        Ok(inner
            .alerts
            .iter()
            .find(|a| a.is_active() && a.device_id == device_id && a.rule_kind == kind)
            .cloned())
    }

    async fn open_or_update_alert(
        &self,
        device_id: &str,
        kind: RuleKind,
        observed_value: Option<f64>,
        at: Timestamp,
    ) -> StoreResult<AlertUpsert> {
        self.gate_alert_write(device_id, kind).await?;
        let mut inner = self.inner.write().await;
        if let Some(open) = inner
            .alerts
            .iter_mut()
            .find(|a| a.is_active() && a.device_id == device_id && a.rule_kind == kind)
        {
            open.observed_value = observed_value;
            open.last_observed_at = open.last_observed_at.max(at);
            return Ok(AlertUpsert::Updated(open.clone()));
        }

        inner.next_alert_id += 1;
        let alert = Alert {
            id: inner.next_alert_id,
            device_id: device_id.to_string(),
            rule_kind: kind,
            observed_value,
            first_observed_at: at,
            last_observed_at: at,
            closed_at: None,
        };
        inner.alerts.push(alert.clone());
        Ok(AlertUpsert::Opened(alert))
    }

    async fn close_alert(
        &self,
        device_id: &str,
        kind: RuleKind,
        at: Timestamp,
    ) -> StoreResult<Option<Alert>> {
        self.gate_alert_write(device_id, kind).await?;
        let mut inner = self.inner.write().await;
        Ok(inner
            .alerts
            .iter_mut()
            .find(|a| a.is_active() && a.device_id == device_id && a.rule_kind == kind)
            .map(|open| {
                open.closed_at = Some(at);
                open.clone()
            }))
    }

    async fn list_recent_alerts(&self, since: Timestamp) -> StoreResult<Vec<Alert>> {
        self.gate("alert", None).await?;
        let inner = self.inner.read().await;
        let mut alerts: Vec<Alert> = inner
            .alerts
            .iter()
            .filter(|a| a.is_active() || a.first_observed_at >= since)
            .cloned()
            .collect();
        alerts.sort_by(|a, b| b.first_observed_at.cmp(&a.first_observed_at));
        Ok(alerts)
    }
}

#[async_trait]
impl TelemetryStore for InMemoryStore {
    async fn get_latest_telemetry(
        &self,
        device_id: &str,
    ) -> StoreResult<Option<TelemetrySnapshot>> {
        self.gate("telemetry", Some(device_id)).await?;
        Ok(self.inner.read().await.telemetry.get(device_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::{Duration, TimeZone, Utc};

    use super::*;

    fn t(minute: u32) -> Timestamp {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, minute, 0).unwrap()
    }

    #[tokio::test]
    async fn readings_are_filtered_half_open_and_sorted() {
        let store = InMemoryStore::new();
        store.push_reading("a", t(5), 5.0).await;
        store.push_reading("a", t(1), 1.0).await;
        store.push_reading("a", t(10), 10.0).await;

        let readings = store.list_readings("a", t(1), t(10)).await.unwrap();
        let values: Vec<f64> = readings.iter().map(|r| r.raw_value).collect();
        assert_eq!(values, vec![1.0, 5.0]);
    }

    #[tokio::test]
    async fn open_or_update_reuses_the_open_alert() {
        let store = InMemoryStore::new();
        let first = store
            .open_or_update_alert("a", RuleKind::High, Some(150.0), t(0))
            .await
            .unwrap();
        let first = assert_matches!(first, AlertUpsert::Opened(alert) => alert);
        let second = store
            .open_or_update_alert("a", RuleKind::High, Some(160.0), t(1))
            .await
            .unwrap();
        let second = assert_matches!(second, AlertUpsert::Updated(alert) => alert);

        assert_eq!(first.id, second.id);
        assert_eq!(second.first_observed_at, t(0));
        assert_eq!(second.last_observed_at, t(1));
        assert_eq!(store.all_alerts().await.len(), 1);
    }

    #[tokio::test]
    async fn closed_alert_is_not_reused() {
        let store = InMemoryStore::new();
        store
            .open_or_update_alert("a", RuleKind::Low, Some(5.0), t(0))
            .await
            .unwrap();
        let closed = store.close_alert("a", RuleKind::Low, t(1)).await.unwrap();
        assert_matches!(closed, Some(alert) if alert.closed_at == Some(t(1)));
        assert!(store.close_alert("a", RuleKind::Low, t(2)).await.unwrap().is_none());

        let reopened = store
            .open_or_update_alert("a", RuleKind::Low, Some(4.0), t(3))
            .await
            .unwrap();
        assert_matches!(reopened, AlertUpsert::Opened(alert) if alert.first_observed_at == t(3));
        assert_eq!(store.all_alerts().await.len(), 2);
    }

    #[tokio::test]
    async fn recent_alerts_include_open_ones() {
        let store = InMemoryStore::new();
        let old = t(0) - Duration::days(3);
        store
            .open_or_update_alert("a", RuleKind::Battery, Some(3100.0), old)
            .await
            .unwrap();
        store
            .open_or_update_alert("b", RuleKind::High, Some(300.0), old)
            .await
            .unwrap();
        store.close_alert("b", RuleKind::High, old).await.unwrap();

        let recent = store.list_recent_alerts(t(0) - Duration::days(1)).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].device_id, "a");
    }

    #[tokio::test]
    async fn injected_failure_is_per_device() {
        let store = InMemoryStore::new();
        store.fail_device("a").await;
        assert_matches!(
            store.list_readings("a", t(0), t(1)).await,
            Err(StoreError::Unavailable { store: "reading", .. })
        );
        assert!(store.list_readings("b", t(0), t(1)).await.is_ok());

        store.recover_device("a").await;
        assert!(store.list_readings("a", t(0), t(1)).await.is_ok());
    }

    #[tokio::test]
    async fn injected_alert_write_failure_is_per_kind() {
        let store = InMemoryStore::new();
        store.fail_alert_writes("a", RuleKind::Battery).await;

        assert_matches!(
            store.open_or_update_alert("a", RuleKind::Battery, Some(3100.0), t(0)).await,
            Err(StoreError::Unavailable { store: "alert", .. })
        );
        assert!(store
            .open_or_update_alert("a", RuleKind::High, Some(150.0), t(0))
            .await
            .is_ok());
        assert!(store.get_active_alert("a", RuleKind::Battery).await.unwrap().is_none());

        store.recover_alert_writes("a", RuleKind::Battery).await;
        assert!(store
            .open_or_update_alert("a", RuleKind::Battery, Some(3100.0), t(1))
            .await
            .is_ok());
    }
}
