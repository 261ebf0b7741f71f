use std::sync::Arc;

use flooddash_core::series::WindowedAggregator;
use flooddash_core::store::Stores;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: every field is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Store capabilities (PostgreSQL in production, in-memory in tests).
    pub stores: Stores,
    /// Series aggregation over `stores.readings`.
    pub aggregator: WindowedAggregator,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(stores: Stores, config: ServerConfig) -> Self {
        let aggregator = WindowedAggregator::new(stores.readings.clone(), config.fetch_timeout());
        Self {
            stores,
            aggregator,
            config: Arc::new(config),
        }
    }
}
