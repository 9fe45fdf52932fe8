//! Tests for `AppError` → HTTP response mapping.
//!
//! These call `IntoResponse` directly on `AppError` values; no server or
//! database is involved.

use std::time::Duration;

use apilytics_api::error::AppError;
use apilytics_core::error::CoreError;
use apilytics_pipeline::PipelineError;
use assert_matches::assert_matches;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use http_body_util::BodyExt;

/// Helper: convert an `AppError` into its status code, headers, and parsed JSON body.
async fn error_to_response(
    err: AppError,
) -> (StatusCode, axum::http::HeaderMap, serde_json::Value) {
    let response = err.into_response();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    (status, headers, json)
}

#[tokio::test]
async fn validation_error_returns_400() {
    let err = AppError::Core(CoreError::Validation("unknown method 'FETCH'".into()));

    let (status, _, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "VALIDATION_ERROR");
    assert_eq!(json["error"], "unknown method 'FETCH'");
}

#[tokio::test]
async fn bad_request_error_returns_400() {
    let err = AppError::BadRequest("invalid JSON".into());

    let (status, _, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "BAD_REQUEST");
    assert_eq!(json["error"], "invalid JSON");
}

#[tokio::test]
async fn rate_limited_rounds_retry_after_up() {
    let err = AppError::RateLimited {
        retry_after: Duration::from_millis(400),
    };

    let (status, headers, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(headers[header::RETRY_AFTER], "1");
    assert_eq!(json["code"], "RATE_LIMITED");
    assert_eq!(json["retry_after_ms"], 400);
    assert_eq!(json["error"], "Too many requests. Try again in 400ms");
}

#[tokio::test]
async fn rate_limited_whole_seconds_are_kept() {
    let err = AppError::RateLimited {
        retry_after: Duration::from_secs(3),
    };

    let (_, headers, _) = error_to_response(err).await;

    assert_eq!(headers[header::RETRY_AFTER], "3");
}

#[tokio::test]
async fn pipeline_closed_maps_to_503() {
    let err = AppError::from(PipelineError::Closed);
    assert_matches!(err, AppError::Unavailable(_));

    let (status, _, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["code"], "UNAVAILABLE");
}

#[tokio::test]
async fn internal_errors_are_sanitized() {
    for err in [
        AppError::InternalError("connection string leaked".into()),
        AppError::Core(CoreError::Internal("secret detail".into())),
    ] {
        let (status, _, json) = error_to_response(err).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["code"], "INTERNAL_ERROR");
        assert_eq!(json["error"], "An internal error occurred");
    }
}
