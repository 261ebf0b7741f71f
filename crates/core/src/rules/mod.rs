//! Alert rule evaluation (threshold, rate-of-change, battery, error).
//!
//! [`evaluate`] is pure: it turns a rule set plus a device's latest signals
//! into verdicts. [`state`] tracks the per-rule ACTIVE/INACTIVE table and
//! [`engine`] wires both to the stores, committing alert open/update/close
//! transitions.

pub mod engine;
pub mod evaluate;
pub mod state;

use std::time::Duration;

/// Engine-level limits shared by every rule of a kind.
///
/// `rate_change` and `battery` rules carry no numeric parameter of their
/// own; their limits live here.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// `rate_change` fires when |Δlevel| / Δt exceeds this many mm per second.
    pub rate_limit_mm_per_sec: f64,
    /// `battery` fires below this voltage in millivolts.
    pub low_battery_mv: i32,
    /// How far back to look for the latest readings at each tick.
    pub lookback: Duration,
    /// Upper bound on every store call.
    pub fetch_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rate_limit_mm_per_sec: 0.5,
            low_battery_mv: 3300,
            lookback: Duration::from_secs(3600),
            fetch_timeout: Duration::from_secs(5),
        }
    }
}
