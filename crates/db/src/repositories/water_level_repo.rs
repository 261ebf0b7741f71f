//! Repository for the `water_levels` table (append-only time-series).

use flooddash_core::types::Timestamp;
use sqlx::PgPool;

use crate::models::reading::WaterLevelRow;

const COLUMNS: &str = "id, device_id, water_level, created_at";

/// Provides query operations for raw water level readings.
pub struct WaterLevelRepo;

impl WaterLevelRepo {
    /// Readings of one device with `from <= created_at < to`, oldest first.
    pub async fn list_in_range(
        pool: &PgPool,
        device_id: &str,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<Vec<WaterLevelRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM water_levels \
             WHERE device_id = $1 AND created_at >= $2 AND created_at < $3 \
             ORDER BY created_at ASC, id ASC"
        );
        sqlx::query_as::<_, WaterLevelRow>(&query)
            .bind(device_id)
            .bind(from)
            .bind(to)
            .fetch_all(pool)
            .await
    }
}
