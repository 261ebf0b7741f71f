//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is shared via `Arc<EventBus>` between the evaluation loop
//! that publishes and any number of subscribers.

use chrono::{DateTime, Utc};
use flooddash_core::rules::engine::AlertChange;
use flooddash_core::types::{DbId, DeviceId};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

pub const ALERT_OPENED: &str = "alert.opened";
pub const ALERT_UPDATED: &str = "alert.updated";
pub const ALERT_CLOSED: &str = "alert.closed";

// ---------------------------------------------------------------------------
// MonitorEvent
// ---------------------------------------------------------------------------

/// Something that happened to a sensor's alerts.
///
/// Constructed via [`MonitorEvent::new`] and enriched with the builder
/// methods, or derived from an engine result with
/// [`from_change`](MonitorEvent::from_change).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorEvent {
    /// Dot-separated event name, e.g. `"alert.opened"`.
    pub event_type: String,

    /// Sensor the event concerns.
    pub device_id: Option<DeviceId>,

    /// Alert record the event concerns.
    pub alert_id: Option<DbId>,

    /// Free-form JSON payload carrying event-specific data.
    pub payload: serde_json::Value,

    /// When the event was created (UTC).
    pub timestamp: DateTime<Utc>,
}

impl MonitorEvent {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            device_id: None,
            alert_id: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    pub fn with_device(mut self, device_id: impl Into<DeviceId>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    pub fn with_alert(mut self, alert_id: DbId) -> Self {
        self.alert_id = Some(alert_id);
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    /// Describe an alert transition.
    ///
    /// `notify_targets` are the opaque targets of the rules behind the alert;
    /// they are passed through untouched for whatever delivers notifications.
    pub fn from_change(change: &AlertChange, notify_targets: &[String]) -> Self {
        let event_type = match change {
            AlertChange::Opened(_) => ALERT_OPENED,
            AlertChange::Updated(_) => ALERT_UPDATED,
            AlertChange::Closed(_) => ALERT_CLOSED,
        };
        let alert = change.alert();
        Self::new(event_type)
            .with_device(alert.device_id.clone())
            .with_alert(alert.id)
            .with_payload(serde_json::json!({
                "kind": alert.rule_kind,
                "observed_value": alert.observed_value,
                "first_observed_at": alert.first_observed_at,
                "last_observed_at": alert.last_observed_at,
                "closed_at": alert.closed_at,
                "notify_targets": notify_targets,
            }))
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// ```rust
/// use flooddash_events::bus::{EventBus, MonitorEvent, ALERT_OPENED};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(MonitorEvent::new(ALERT_OPENED).with_device("flood-logger-01"));
/// ```
pub struct EventBus {
    sender: broadcast::Sender<MonitorEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full the oldest un-consumed messages are dropped
    /// and slow receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers. Dropped when nobody listens.
    pub fn publish(&self, event: MonitorEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
