pub mod health;

use axum::routing::post;
use axum::Router;

use crate::handlers::ingest;
use crate::middleware::rate_limit;
use crate::state::AppState;

/// Build the `/api` route tree.
///
/// ```text
/// POST /log-request     one request event
/// POST /log-requests    batched request events
/// POST /monitor         register a monitored URL
/// POST /ping            one ping result
/// ```
///
/// Every route is behind per-client admission control.
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/log-request", post(ingest::log_request))
        .route("/log-requests", post(ingest::log_requests))
        .route("/monitor", post(ingest::register_monitor))
        .route("/ping", post(ingest::record_ping))
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            rate_limit::admission,
        ))
}
