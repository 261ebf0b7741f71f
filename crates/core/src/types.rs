/// Rule and alert primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Sensors are keyed by their hardware identifier, e.g. `flood-logger-01`.
pub type DeviceId = String;
