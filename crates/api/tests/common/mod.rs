#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use apilytics_core::geo::StaticLocator;
use apilytics_core::rate_limit::{InMemoryStore, RateLimitPolicy};
use apilytics_pipeline::{Pacing, Pipeline, PipelineConfig};
use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tower::ServiceExt;

use apilytics_api::config::ServerConfig;
use apilytics_api::router::{build_app_router, with_middleware};
use apilytics_api::state::AppState;

/// Client address used by the request helpers.
pub const CLIENT_IP: &str = "203.0.113.7";

/// Location the test geo locator returns for [`CLIENT_IP`].
pub const CLIENT_LOCATION: &str = "FI";

/// Build a test `ServerConfig` with safe defaults.
///
/// The admission ceiling is high enough that ordinary tests never hit it.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: Vec::new(),
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        rate_limit: RateLimitPolicy {
            limit: 10_000,
            window: Duration::from_secs(60),
        },
        trust_forwarded_headers: true,
        log_file: None,
    }
}

/// Batches flush only on shutdown (no max-age tick during a test) and the
/// worker never pauses.
pub fn test_pipeline_config() -> PipelineConfig {
    PipelineConfig {
        batch_size: 1000,
        max_age: Duration::from_secs(3600),
        queue_capacity: 4,
        pacing: Pacing::Fixed(Duration::ZERO),
    }
}

/// Application under test plus a handle on its pipeline.
pub struct TestApp {
    router: Router,
    pub pipeline: Arc<Pipeline>,
}

impl TestApp {
    pub fn app(&self) -> Router {
        self.router.clone()
    }

    /// Flush everything buffered and stop the workers.
    pub async fn drain(&self) {
        assert!(
            self.pipeline.shutdown(Duration::from_secs(30)).await,
            "pipeline should drain"
        );
    }
}

/// Build the full application router with all middleware layers, using the
/// given database pool. Creates the schema first.
pub async fn build_test_app(pool: PgPool) -> TestApp {
    build_test_app_with(pool, test_config()).await
}

pub async fn build_test_app_with(pool: PgPool, config: ServerConfig) -> TestApp {
    let (state, pipeline) = test_state(pool, &config).await;

    TestApp {
        router: build_app_router(state, &config),
        pipeline,
    }
}

/// Create the schema, start a pipeline and assemble the shared state.
pub async fn test_state(pool: PgPool, config: &ServerConfig) -> (AppState, Arc<Pipeline>) {
    apilytics_db::ensure_schema(&pool).await.unwrap();

    let pipeline = Arc::new(Pipeline::start(pool.clone(), &test_pipeline_config()));
    let geo = StaticLocator::new(
        [(CLIENT_IP.parse().unwrap(), CLIENT_LOCATION.to_string())]
            .into_iter()
            .collect(),
    );

    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        pipeline: Arc::clone(&pipeline),
        rate_limiter: Arc::new(InMemoryStore::new(config.rate_limit)),
        geo: Arc::new(geo),
    };
    (state, pipeline)
}

/// Application built from `routes` under the shared middleware stack.
pub async fn build_test_app_from_routes(
    pool: PgPool,
    routes: Router<AppState>,
) -> TestApp {
    let config = test_config();
    let (state, pipeline) = test_state(pool, &config).await;

    TestApp {
        router: with_middleware(routes, &config).with_state(state),
        pipeline,
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    post_json_from(app, uri, body, CLIENT_IP).await
}

pub async fn post_json_from(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    client_ip: &str,
) -> Response<Body> {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-forwarded-for", client_ip)
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_raw(app: Router, uri: &str, body: &'static str) -> Response<Body> {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-forwarded-for", CLIENT_IP)
        .body(Body::from(body))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
