//! Alert rule definitions as configured by operators.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{DbId, DeviceId};

/// The condition family a rule watches.
///
/// Stored as text; any unrecognised value parses to [`RuleKind::Unknown`] so
/// a bad row never breaks evaluation or display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    High,
    Low,
    RateChange,
    Battery,
    Error,
    #[serde(other)]
    Unknown,
}

impl RuleKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RuleKind::High => "high",
            RuleKind::Low => "low",
            RuleKind::RateChange => "rate_change",
            RuleKind::Battery => "battery",
            RuleKind::Error => "error",
            RuleKind::Unknown => "unknown",
        }
    }

    /// Parse a stored kind. Never fails.
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "high" => RuleKind::High,
            "low" => RuleKind::Low,
            "rate_change" => RuleKind::RateChange,
            "battery" => RuleKind::Battery,
            "error" => RuleKind::Error,
            _ => RuleKind::Unknown,
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An operator-defined alert rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRule {
    pub id: DbId,
    /// `None` leaves the rule inert: it is never scheduled.
    pub device_id: Option<DeviceId>,
    pub kind: RuleKind,
    /// Millimetres; only meaningful for `high` and `low`.
    pub threshold: Option<f64>,
    pub enabled: bool,
    /// Where notifications go. Opaque to the engine.
    pub notify_target: Option<String>,
}

/// Why a rule can never fire as configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationGap {
    #[error("rule has no device")]
    NoDevice,
    #[error("{0} rule has no threshold")]
    MissingThreshold(RuleKind),
    #[error("rule kind is not recognised")]
    UnknownKind,
}

/// The evaluable form of a rule, one variant per kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RuleCondition {
    /// Latest calibrated value strictly above the threshold.
    Above(f64),
    /// Latest calibrated value strictly below the threshold.
    Below(f64),
    /// Change rate between the two most recent values above the engine limit.
    RapidChange,
    /// Battery below the engine floor.
    LowBattery,
    /// Device reports an error state.
    DeviceError,
}

impl AlertRule {
    /// Resolve the condition this rule checks, or the reason it never fires.
    pub fn condition(&self) -> Result<RuleCondition, ConfigurationGap> {
        if self.device_id.is_none() {
            return Err(ConfigurationGap::NoDevice);
        }
        match self.kind {
            RuleKind::High => self
                .threshold
                .map(RuleCondition::Above)
                .ok_or(ConfigurationGap::MissingThreshold(RuleKind::High)),
            RuleKind::Low => self
                .threshold
                .map(RuleCondition::Below)
                .ok_or(ConfigurationGap::MissingThreshold(RuleKind::Low)),
            RuleKind::RateChange => Ok(RuleCondition::RapidChange),
            RuleKind::Battery => Ok(RuleCondition::LowBattery),
            RuleKind::Error => Ok(RuleCondition::DeviceError),
            RuleKind::Unknown => Err(ConfigurationGap::UnknownKind),
        }
    }

    /// Whether the rule belongs to `device_id` and is switched on.
    pub fn applies_to(&self, device_id: &str) -> bool {
        self.enabled && self.device_id.as_deref() == Some(device_id)
    }
}
