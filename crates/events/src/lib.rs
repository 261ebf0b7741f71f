//! Alert lifecycle events for the flood monitoring dashboard.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`MonitorEvent`]: the event envelope published for every alert
//!   transition.
//! - [`AlertJournal`]: background subscriber that records every event in the
//!   structured log, where notification tooling picks it up.

pub mod bus;
pub mod journal;

pub use bus::{EventBus, MonitorEvent};
pub use journal::AlertJournal;
