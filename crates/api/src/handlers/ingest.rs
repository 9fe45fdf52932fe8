//! Handlers for the ingestion endpoints.
//!
//! Every handler validates its payload, appends the resulting events to the
//! stream's open batch, and answers `202 Accepted`. None of them wait on a
//! database write.

use apilytics_core::record::{MonitorPayload, PingPayload, RequestBatchPayload, RequestPayload};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;

use crate::error::AppResult;
use crate::middleware::client_ip::ClientAddr;
use crate::response::{Accepted, DataResponse};
use crate::state::AppState;

type Ack = (StatusCode, Json<DataResponse<Accepted>>);

fn ack(accepted: usize) -> Ack {
    (
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: Accepted { accepted },
        }),
    )
}

/// POST /api/log-request
pub async fn log_request(
    State(state): State<AppState>,
    ClientAddr(ip): ClientAddr,
    payload: Result<Json<RequestPayload>, JsonRejection>,
) -> AppResult<Ack> {
    let Json(payload) = payload?;
    let location = ip.and_then(|ip| state.geo.locate(ip));
    let event = payload.validate(Utc::now())?.with_origin(ip, location);

    let accepted = state.pipeline.requests.submit(vec![event]).await?;
    Ok(ack(accepted))
}

/// POST /api/log-requests
///
/// Client libraries buffer requests and send them in one payload. The
/// payload is accepted whole or rejected whole.
pub async fn log_requests(
    State(state): State<AppState>,
    ClientAddr(ip): ClientAddr,
    payload: Result<Json<RequestBatchPayload>, JsonRejection>,
) -> AppResult<Ack> {
    let Json(payload) = payload?;
    let location = ip.and_then(|ip| state.geo.locate(ip));
    let events: Vec<_> = payload
        .validate(Utc::now())?
        .into_iter()
        .map(|event| event.with_origin(ip, location.clone()))
        .collect();

    if events.is_empty() {
        return Ok(ack(0));
    }
    let accepted = state.pipeline.requests.submit(events).await?;
    tracing::debug!(accepted, "Request batch received");
    Ok(ack(accepted))
}

/// POST /api/monitor
pub async fn register_monitor(
    State(state): State<AppState>,
    payload: Result<Json<MonitorPayload>, JsonRejection>,
) -> AppResult<Ack> {
    let Json(payload) = payload?;
    let event = payload.validate(Utc::now())?;

    let accepted = state.pipeline.monitors.submit(vec![event]).await?;
    Ok(ack(accepted))
}

/// POST /api/ping
pub async fn record_ping(
    State(state): State<AppState>,
    payload: Result<Json<PingPayload>, JsonRejection>,
) -> AppResult<Ack> {
    let Json(payload) = payload?;
    let event = payload.validate(Utc::now())?;

    let accepted = state.pipeline.pings.submit(vec![event]).await?;
    Ok(ack(accepted))
}
