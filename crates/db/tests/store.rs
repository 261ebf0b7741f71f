//! Database-backed store tests. Require a PostgreSQL instance reachable via
//! `DATABASE_URL`; run with `cargo test -p flooddash-db -- --ignored`.

use chrono::{Duration, TimeZone, Utc};
use flooddash_core::alert::{Alert, AlertUpsert};
use flooddash_core::rule::RuleKind;
use flooddash_core::store::{AlertStore, DeviceStore, ReadingStore, RuleStore, TelemetryStore};
use flooddash_core::types::Timestamp;
use flooddash_db::PgStore;
use sqlx::PgPool;

fn t(minute: i64) -> Timestamp {
    Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap() + Duration::minutes(minute)
}

// The dashboard never writes devices, readings, telemetry or rules, so the
// fixtures insert them directly.

async fn insert_device(pool: &PgPool, device_id: &str, name: &str, offset_mm: f64) {
    sqlx::query("INSERT INTO devices (device_id, name, offset_mm, lat, lng) VALUES ($1, $2, $3, 47.0, 8.0)")
        .bind(device_id)
        .bind(name)
        .bind(offset_mm)
        .execute(pool)
        .await
        .unwrap();
}

async fn insert_water_level(pool: &PgPool, device_id: &str, level: f64, at: Timestamp) {
    sqlx::query("INSERT INTO water_levels (device_id, water_level, created_at) VALUES ($1, $2, $3)")
        .bind(device_id)
        .bind(level)
        .bind(at)
        .execute(pool)
        .await
        .unwrap();
}

async fn insert_rule(pool: &PgPool, device_id: Option<&str>, rule_type: &str, threshold: f64, email: &str) {
    sqlx::query(
        "INSERT INTO alert_rules (device_id, type, threshold, email, enabled) VALUES ($1, $2, $3, $4, TRUE)",
    )
    .bind(device_id)
    .bind(rule_type)
    .bind(threshold)
    .bind(email)
    .execute(pool)
    .await
    .unwrap();
}

async fn insert_telemetry(pool: &PgPool, device_id: &str, battery_mv: i32, at: Timestamp) {
    sqlx::query("INSERT INTO device_telemetry (device_id, battery_mv, created_at) VALUES ($1, $2, $3)")
        .bind(device_id)
        .bind(battery_mv)
        .bind(at)
        .execute(pool)
        .await
        .unwrap();
}

fn opened(upsert: AlertUpsert) -> Alert {
    match upsert {
        AlertUpsert::Opened(alert) => alert,
        AlertUpsert::Updated(alert) => panic!("expected a new alert, got update of {}", alert.id),
    }
}

fn updated(upsert: AlertUpsert) -> Alert {
    match upsert {
        AlertUpsert::Updated(alert) => alert,
        AlertUpsert::Opened(alert) => panic!("expected an update, got new alert {}", alert.id),
    }
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_bootstrap(pool: PgPool) {
    flooddash_db::health_check(&pool).await.unwrap();

    for table in ["devices", "water_levels", "device_telemetry", "alert_rules", "alerts"] {
        let count: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&pool)
            .await
            .unwrap_or_else(|e| panic!("{table} query failed: {e}"));
        assert_eq!(count.0, 0, "{table} should start empty");
    }
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_directory_and_readings(pool: PgPool) {
    insert_device(&pool, "flood-logger-01", "Bridge", 15.0).await;
    for (minute, level) in [(3, 130.0), (1, 110.0), (2, 120.0), (10, 200.0)] {
        insert_water_level(&pool, "flood-logger-01", level, t(minute)).await;
    }

    let store = PgStore::new(pool);
    let device = store.get_device("flood-logger-01").await.unwrap().unwrap();
    assert_eq!(device.effective_offset_mm(), 15.0);

    let readings = store
        .list_readings("flood-logger-01", t(1), t(10))
        .await
        .unwrap();
    let raw: Vec<f64> = readings.iter().map(|r| r.raw_value).collect();
    assert_eq!(raw, vec![110.0, 120.0, 130.0]);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_rules_and_telemetry(pool: PgPool) {
    insert_rule(&pool, Some("a"), "high", 100.0, "ops@example.com").await;
    insert_rule(&pool, None, "low", 10.0, "").await;
    for (minute, mv) in [(0, 3900), (5, 3100)] {
        insert_telemetry(&pool, "a", mv, t(minute)).await;
    }

    let store = PgStore::new(pool);
    assert_eq!(store.list_rules(Some("a")).await.unwrap().len(), 1);
    assert_eq!(store.list_rules(None).await.unwrap().len(), 2);

    let latest = store.get_latest_telemetry("a").await.unwrap().unwrap();
    assert_eq!(latest.battery_mv, Some(3100));
    assert!(store.get_latest_telemetry("b").await.unwrap().is_none());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_alert_lifecycle_deduplicates(pool: PgPool) {
    let store = PgStore::new(pool);

    let first = opened(
        store
            .open_or_update_alert("a", RuleKind::High, Some(150.0), t(0))
            .await
            .unwrap(),
    );
    let second = updated(
        store
            .open_or_update_alert("a", RuleKind::High, Some(160.0), t(1))
            .await
            .unwrap(),
    );
    assert_eq!(first.id, second.id);
    assert_eq!(second.first_observed_at, t(0));
    assert_eq!(second.last_observed_at, t(1));
    assert_eq!(second.observed_value, Some(160.0));

    let active = store.get_active_alert("a", RuleKind::High).await.unwrap();
    assert_eq!(active.map(|a| a.id), Some(first.id));

    let closed = store.close_alert("a", RuleKind::High, t(2)).await.unwrap().unwrap();
    assert_eq!(closed.closed_at, Some(t(2)));
    assert!(store.close_alert("a", RuleKind::High, t(3)).await.unwrap().is_none());

    let reopened = opened(
        store
            .open_or_update_alert("a", RuleKind::High, Some(170.0), t(4))
            .await
            .unwrap(),
    );
    assert_ne!(reopened.id, first.id);

    let recent = store.list_recent_alerts(t(-60)).await.unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].id, reopened.id);
}
