use std::sync::Arc;

use apilytics_core::geo::GeoLocator;
use apilytics_core::rate_limit::RateLimitStore;
use apilytics_pipeline::Pipeline;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: everything is behind an `Arc` or is already a handle.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool (health checks only; writes go through the pipeline).
    pub pool: apilytics_db::DbPool,
    pub config: Arc<ServerConfig>,
    /// Batchers and flush workers for every entity stream.
    pub pipeline: Arc<Pipeline>,
    /// Per-client admission counters.
    pub rate_limiter: Arc<dyn RateLimitStore>,
    /// Derives `location` from the client address.
    pub geo: Arc<dyn GeoLocator>,
}
