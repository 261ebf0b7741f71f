//! Repository for the `alerts` table.
//!
//! The partial unique index on `(device_id, type) WHERE closed_at IS NULL`
//! guarantees at most one open alert per device and kind; the upsert below
//! relies on it.

use flooddash_core::types::Timestamp;
use sqlx::PgPool;

use crate::models::alert::{AlertRow, UpsertedAlertRow};

const COLUMNS: &str = "id, device_id, type, value, first_observed_at, last_observed_at, closed_at";

/// Provides lifecycle operations for alerts.
pub struct AlertRepo;

impl AlertRepo {
    pub async fn find_active(
        pool: &PgPool,
        device_id: &str,
        rule_type: &str,
    ) -> Result<Option<AlertRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM alerts \
             WHERE device_id = $1 AND type = $2 AND closed_at IS NULL"
        );
        sqlx::query_as::<_, AlertRow>(&query)
            .bind(device_id)
            .bind(rule_type)
            .fetch_optional(pool)
            .await
    }

    /// Open an alert, or refresh the open one for the same device and kind.
    ///
    /// `first_observed_at` is only ever set on insert; `last_observed_at`
    /// never moves backwards. `inserted` is true when no alert was open
    /// (`xmax` is zero only for a freshly inserted tuple).
    pub async fn open_or_update(
        pool: &PgPool,
        device_id: &str,
        rule_type: &str,
        value: Option<f64>,
        at: Timestamp,
    ) -> Result<UpsertedAlertRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO alerts (device_id, type, value, first_observed_at, last_observed_at) \
             VALUES ($1, $2, $3, $4, $4) \
             ON CONFLICT (device_id, type) WHERE closed_at IS NULL DO UPDATE SET \
                value = EXCLUDED.value, \
                last_observed_at = GREATEST(alerts.last_observed_at, EXCLUDED.last_observed_at) \
             RETURNING {COLUMNS}, (xmax = 0) AS inserted"
        );
        sqlx::query_as::<_, UpsertedAlertRow>(&query)
            .bind(device_id)
            .bind(rule_type)
            .bind(value)
            .bind(at)
            .fetch_one(pool)
            .await
    }

    /// Close the open alert, if any. Returns the closed row.
    pub async fn close(
        pool: &PgPool,
        device_id: &str,
        rule_type: &str,
        at: Timestamp,
    ) -> Result<Option<AlertRow>, sqlx::Error> {
        let query = format!(
            "UPDATE alerts SET closed_at = $3 \
             WHERE device_id = $1 AND type = $2 AND closed_at IS NULL \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AlertRow>(&query)
            .bind(device_id)
            .bind(rule_type)
            .bind(at)
            .fetch_optional(pool)
            .await
    }

    /// Alerts first observed at or after `since`, plus every open alert,
    /// newest first.
    pub async fn list_recent(pool: &PgPool, since: Timestamp) -> Result<Vec<AlertRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM alerts \
             WHERE first_observed_at >= $1 OR closed_at IS NULL \
             ORDER BY first_observed_at DESC, id DESC"
        );
        sqlx::query_as::<_, AlertRow>(&query)
            .bind(since)
            .fetch_all(pool)
            .await
    }
}
