//! Structured-log sink for alert lifecycle events.
//!
//! [`AlertJournal`] subscribes to the [`EventBus`](crate::bus::EventBus) and
//! writes one log record per event. Delivering notifications is left to
//! whatever consumes those records.

use tokio::sync::broadcast;

use crate::bus::{MonitorEvent, ALERT_CLOSED, ALERT_OPENED};

/// Background subscriber that journals every event.
pub struct AlertJournal;

impl AlertJournal {
    /// Run until the bus is dropped. Returns the number of events journaled.
    pub async fn run(mut receiver: broadcast::Receiver<MonitorEvent>) -> u64 {
        let mut recorded = 0;
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    Self::record(&event);
                    recorded += 1;
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Alert journal lagged, some events were not recorded");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!(recorded, "Event bus closed, alert journal shutting down");
                    break;
                }
            }
        }
        recorded
    }

    fn record(event: &MonitorEvent) {
        let device_id = event.device_id.as_deref().unwrap_or("-");
        match event.event_type.as_str() {
            ALERT_OPENED | ALERT_CLOSED => tracing::info!(
                event_type = %event.event_type,
                device_id,
                alert_id = ?event.alert_id,
                payload = %event.payload,
                "Alert event"
            ),
            _ => tracing::debug!(
                event_type = %event.event_type,
                device_id,
                alert_id = ?event.alert_id,
                "Alert event"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{EventBus, ALERT_UPDATED};

    #[tokio::test]
    async fn journal_drains_until_bus_closes() {
        let bus = EventBus::default();
        let handle = tokio::spawn(AlertJournal::run(bus.subscribe()));

        bus.publish(MonitorEvent::new(ALERT_OPENED).with_device("a"));
        bus.publish(MonitorEvent::new(ALERT_UPDATED).with_device("a"));
        bus.publish(MonitorEvent::new(ALERT_CLOSED).with_device("a"));
        drop(bus);

        assert_eq!(handle.await.unwrap(), 3);
    }
}
