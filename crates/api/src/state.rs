use std::sync::Arc;

use centinela_db::{DbPool, PgStore};
use centinela_notify::{Dispatcher, Provider};

use crate::config::AppConfig;
use crate::engine::AlertEngine;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything inside is behind an `Arc` or is a pool handle.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: DbPool,
    pub config: Arc<AppConfig>,
    /// Scan engine; also owns the producer side of the dispatch queue.
    pub engine: Arc<AlertEngine>,
}

impl AppState {
    /// Wire the engine over `pool` and `provider`.
    ///
    /// The returned [`Dispatcher`] is not running yet; the caller spawns it.
    pub fn new(pool: DbPool, config: AppConfig, provider: Arc<dyn Provider>) -> (Self, Dispatcher) {
        let (dispatcher, handle) = Dispatcher::new(provider, config.dispatcher.clone());
        let store = Arc::new(PgStore::new(pool.clone()));

        let engine = AlertEngine::new(
            store.clone(),
            store,
            handle,
            config.policy.clone(),
            config.dispatch_wait,
        );

        let state = Self {
            pool,
            config: Arc::new(config),
            engine: Arc::new(engine),
        };
        (state, dispatcher)
    }
}
