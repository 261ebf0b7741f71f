//! Capabilities the core consumes from its collaborators.
//!
//! Each store is an injected trait object so the engine and the aggregator
//! can run against PostgreSQL in production and [`memory::InMemoryStore`]
//! in tests.

pub mod memory;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::alert::{Alert, AlertUpsert};
use crate::calibration::RawReading;
use crate::device::Device;
use crate::error::{StoreError, StoreResult};
use crate::rule::{AlertRule, RuleKind};
use crate::telemetry::TelemetrySnapshot;
use crate::types::Timestamp;

/// Read access to the sensor directory.
#[async_trait]
pub trait DeviceStore: Send + Sync {
    async fn list_devices(&self) -> StoreResult<Vec<Device>>;

    async fn get_device(&self, device_id: &str) -> StoreResult<Option<Device>>;
}

/// Read access to stored water level readings.
#[async_trait]
pub trait ReadingStore: Send + Sync {
    /// Readings with `from <= timestamp < to`, ascending by timestamp.
    async fn list_readings(
        &self,
        device_id: &str,
        from: Timestamp,
        to: Timestamp,
    ) -> StoreResult<Vec<RawReading>>;
}

/// Read access to alert rules.
#[async_trait]
pub trait RuleStore: Send + Sync {
    /// Rules for one device, or every rule when `device_id` is `None`.
    async fn list_rules(&self, device_id: Option<&str>) -> StoreResult<Vec<AlertRule>>;
}

/// Persistence for alert lifecycles.
#[async_trait]
pub trait AlertStore: Send + Sync {
    async fn get_active_alert(&self, device_id: &str, kind: RuleKind)
        -> StoreResult<Option<Alert>>;

    /// Refresh the open alert for `(device_id, kind)`, opening one with
    /// `first_observed_at = at` if none is open. Reports which of the two
    /// happened, decided atomically with the write.
    async fn open_or_update_alert(
        &self,
        device_id: &str,
        kind: RuleKind,
        observed_value: Option<f64>,
        at: Timestamp,
    ) -> StoreResult<AlertUpsert>;

    /// Close the open alert for `(device_id, kind)`. Returns the closed alert,
    /// or `None` when nothing was open.
    async fn close_alert(
        &self,
        device_id: &str,
        kind: RuleKind,
        at: Timestamp,
    ) -> StoreResult<Option<Alert>>;

    /// Alerts first observed at or after `since`, plus every still-open one,
    /// newest first.
    async fn list_recent_alerts(&self, since: Timestamp) -> StoreResult<Vec<Alert>>;
}

/// Read access to device health reports.
#[async_trait]
pub trait TelemetryStore: Send + Sync {
    async fn get_latest_telemetry(&self, device_id: &str)
        -> StoreResult<Option<TelemetrySnapshot>>;
}

/// The full set of collaborators, cheaply cloneable.
#[derive(Clone)]
pub struct Stores {
    pub devices: Arc<dyn DeviceStore>,
    pub readings: Arc<dyn ReadingStore>,
    pub rules: Arc<dyn RuleStore>,
    pub alerts: Arc<dyn AlertStore>,
    pub telemetry: Arc<dyn TelemetryStore>,
}

impl Stores {
    /// Use one backend for every capability.
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: DeviceStore + ReadingStore + RuleStore + AlertStore + TelemetryStore + 'static,
    {
        Self {
            devices: store.clone(),
            readings: store.clone(),
            rules: store.clone(),
            alerts: store.clone(),
            telemetry: store,
        }
    }
}

/// Run a store call under `timeout`, mapping expiry to [`StoreError::Timeout`].
pub async fn with_timeout<T, F>(store: &'static str, timeout: Duration, fut: F) -> StoreResult<T>
where
    F: Future<Output = StoreResult<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout { store, timeout }),
    }
}
