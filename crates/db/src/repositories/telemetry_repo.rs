//! Repository for the `device_telemetry` table.

use sqlx::PgPool;

use crate::models::reading::TelemetryRow;

const COLUMNS: &str = "id, device_id, battery_mv, error_state, created_at";

/// Provides query operations for device health reports.
pub struct TelemetryRepo;

impl TelemetryRepo {
    /// The most recent report of one device.
    pub async fn latest_for_device(
        pool: &PgPool,
        device_id: &str,
    ) -> Result<Option<TelemetryRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM device_telemetry \
             WHERE device_id = $1 \
             ORDER BY created_at DESC, id DESC \
             LIMIT 1"
        );
        sqlx::query_as::<_, TelemetryRow>(&query)
            .bind(device_id)
            .fetch_optional(pool)
            .await
    }
}
