//! Per-client admission control for the ingestion routes.

use apilytics_core::rate_limit::Admission;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::error::AppError;
use crate::middleware::client_ip::ClientAddr;
use crate::state::AppState;

/// Key used for callers whose address cannot be determined.
const UNKNOWN_CLIENT: &str = "unknown";

/// Admit or reject a request before it reaches a handler.
///
/// Rejected requests get a 429 immediately and never touch a batch. If the
/// store itself fails the request is admitted.
pub async fn admission(
    State(state): State<AppState>,
    ClientAddr(ip): ClientAddr,
    request: Request,
    next: Next,
) -> Response {
    let key = ip.map_or_else(|| UNKNOWN_CLIENT.to_string(), |ip| ip.to_string());

    match state.rate_limiter.admit(&key).await {
        Ok(Admission::Admitted { .. }) => next.run(request).await,
        Ok(Admission::Rejected { retry_after }) => {
            tracing::debug!(
                client = %key,
                retry_after_ms = retry_after.as_millis() as u64,
                "Request rate limited",
            );
            AppError::RateLimited { retry_after }.into_response()
        }
        Err(e) => {
            tracing::warn!(error = %e, client = %key, "Rate limit store failed, admitting request");
            next.run(request).await
        }
    }
}
