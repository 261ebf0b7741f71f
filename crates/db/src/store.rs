//! PostgreSQL-backed implementation of the core store capabilities.

use async_trait::async_trait;
use flooddash_core::alert::{Alert, AlertUpsert};
use flooddash_core::calibration::RawReading;
use flooddash_core::device::Device;
use flooddash_core::error::{StoreError, StoreResult};
use flooddash_core::rule::{AlertRule, RuleKind};
use flooddash_core::store::{AlertStore, DeviceStore, ReadingStore, RuleStore, TelemetryStore};
use flooddash_core::telemetry::TelemetrySnapshot;
use flooddash_core::types::Timestamp;

use crate::repositories::{AlertRepo, AlertRuleRepo, DeviceRepo, TelemetryRepo, WaterLevelRepo};
use crate::DbPool;

/// Every capability served from one connection pool.
///
/// Query failures surface as [`StoreError::Unavailable`]; the callers treat
/// them as transient.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn unavailable(store: &'static str) -> impl FnOnce(sqlx::Error) -> StoreError {
    move |e| {
        tracing::debug!(store, error = %e, "Query failed");
        StoreError::unavailable(store, e)
    }
}

#[async_trait]
impl DeviceStore for PgStore {
    async fn list_devices(&self) -> StoreResult<Vec<Device>> {
        let rows = DeviceRepo::list(&self.pool)
            .await
            .map_err(unavailable("device"))?;
        Ok(rows.into_iter().map(Device::from).collect())
    }

    async fn get_device(&self, device_id: &str) -> StoreResult<Option<Device>> {
        let row = DeviceRepo::find_by_id(&self.pool, device_id)
            .await
            .map_err(unavailable("device"))?;
        Ok(row.map(Device::from))
    }
}

#[async_trait]
impl ReadingStore for PgStore {
    async fn list_readings(
        &self,
        device_id: &str,
        from: Timestamp,
        to: Timestamp,
    ) -> StoreResult<Vec<RawReading>> {
        let rows = WaterLevelRepo::list_in_range(&self.pool, device_id, from, to)
            .await
            .map_err(unavailable("reading"))?;
        Ok(rows.into_iter().map(RawReading::from).collect())
    }
}

#[async_trait]
impl RuleStore for PgStore {
    async fn list_rules(&self, device_id: Option<&str>) -> StoreResult<Vec<AlertRule>> {
        let rows = AlertRuleRepo::list(&self.pool, device_id)
            .await
            .map_err(unavailable("rule"))?;
        Ok(rows.into_iter().map(AlertRule::from).collect())
    }
}

#[async_trait]
impl AlertStore for PgStore {
    async fn get_active_alert(
        &self,
        device_id: &str,
        kind: RuleKind,
    ) -> StoreResult<Option<Alert>> {
        let row = AlertRepo::find_active(&self.pool, device_id, kind.as_str())
            .await
            .map_err(unavailable("alert"))?;
        Ok(row.map(Alert::from))
    }

    async fn open_or_update_alert(
        &self,
        device_id: &str,
        kind: RuleKind,
        observed_value: Option<f64>,
        at: Timestamp,
    ) -> StoreResult<AlertUpsert> {
        let row = AlertRepo::open_or_update(&self.pool, device_id, kind.as_str(), observed_value, at)
            .await
            .map_err(unavailable("alert"))?;
        Ok(row.into())
    }

    async fn close_alert(
        &self,
        device_id: &str,
        kind: RuleKind,
        at: Timestamp,
    ) -> StoreResult<Option<Alert>> {
        let row = AlertRepo::close(&self.pool, device_id, kind.as_str(), at)
            .await
            .map_err(unavailable("alert"))?;
        Ok(row.map(Alert::from))
    }

    async fn list_recent_alerts(&self, since: Timestamp) -> StoreResult<Vec<Alert>> {
        let rows = AlertRepo::list_recent(&self.pool, since)
            .await
            .map_err(unavailable("alert"))?;
        Ok(rows.into_iter().map(Alert::from).collect())
    }
}

#[async_trait]
impl TelemetryStore for PgStore {
    async fn get_latest_telemetry(
        &self,
        device_id: &str,
    ) -> StoreResult<Option<TelemetrySnapshot>> {
        let row = TelemetryRepo::latest_for_device(&self.pool, device_id)
            .await
            .map_err(unavailable("telemetry"))?;
        Ok(row.map(TelemetrySnapshot::from))
    }
}
