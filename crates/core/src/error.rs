use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// A transient failure talking to one of the external stores.
///
/// Never fatal: the affected device is skipped for the current tick and
/// retried on the next one.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("{store} store unavailable: {message}")]
    Unavailable {
        store: &'static str,
        message: String,
    },

    #[error("{store} store timed out after {}ms", timeout.as_millis())]
    Timeout {
        store: &'static str,
        timeout: Duration,
    },
}

impl StoreError {
    pub fn unavailable(store: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Unavailable {
            store,
            message: err.to_string(),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
