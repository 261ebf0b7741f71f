//! Repository for the `alert_rules` table.

use sqlx::PgPool;

use crate::models::alert::AlertRuleRow;

const COLUMNS: &str = "id, device_id, email, type, threshold, enabled, created_at";

/// Provides query operations for alert rules.
pub struct AlertRuleRepo;

impl AlertRuleRepo {
    /// Rules of one device, or every rule when `device_id` is `None`.
    pub async fn list(
        pool: &PgPool,
        device_id: Option<&str>,
    ) -> Result<Vec<AlertRuleRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM alert_rules \
             WHERE ($1::TEXT IS NULL OR device_id = $1) \
             ORDER BY id"
        );
        sqlx::query_as::<_, AlertRuleRow>(&query)
            .bind(device_id)
            .fetch_all(pool)
            .await
    }
}
