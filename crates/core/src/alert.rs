//! Alert records produced by rule evaluation.

use serde::{Deserialize, Serialize};

use crate::rule::RuleKind;
use crate::types::{DbId, DeviceId, Timestamp};

/// One continuous episode of a rule condition holding for a device.
///
/// At most one alert per `(device_id, rule_kind)` is open at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: DbId,
    pub device_id: DeviceId,
    pub rule_kind: RuleKind,
    /// Value that triggered the alert at the latest evaluation, if the kind
    /// has a numeric payload (mm, mm/s or mV).
    pub observed_value: Option<f64>,
    pub first_observed_at: Timestamp,
    pub last_observed_at: Timestamp,
    /// Set once the condition stopped holding.
    pub closed_at: Option<Timestamp>,
}

impl Alert {
    pub fn is_active(&self) -> bool {
        self.closed_at.is_none()
    }
}

/// What an open-or-update call did to the store.
#[derive(Debug, Clone, PartialEq)]
pub enum AlertUpsert {
    /// No alert was open for the device and kind; this one was created.
    Opened(Alert),
    /// The open alert was refreshed.
    Updated(Alert),
}
