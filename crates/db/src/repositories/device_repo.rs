//! Repository for the `devices` table.

use sqlx::PgPool;

use crate::models::device::DeviceRow;

const COLUMNS: &str = "device_id, name, offset_mm, lat, lng, created_at";

/// Provides read queries for the sensor directory.
pub struct DeviceRepo;

impl DeviceRepo {
    /// All sensors, ordered by id.
    pub async fn list(pool: &PgPool) -> Result<Vec<DeviceRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM devices ORDER BY device_id");
        sqlx::query_as::<_, DeviceRow>(&query).fetch_all(pool).await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        device_id: &str,
    ) -> Result<Option<DeviceRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM devices WHERE device_id = $1");
        sqlx::query_as::<_, DeviceRow>(&query)
            .bind(device_id)
            .fetch_optional(pool)
            .await
    }
}
