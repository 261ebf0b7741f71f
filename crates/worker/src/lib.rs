//! Evaluation daemon: periodically evaluates every sensor's alert rules and
//! publishes alert lifecycle events.

pub mod config;
pub mod scheduler;
