//! API routes.

use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;

use crate::handlers::files::stream_video;
use crate::handlers::health::{health, ready};
use crate::handlers::prompts::{decompose_prompt, enhance_prompt};
use crate::handlers::system::system_status;
use crate::handlers::videos::{
    cancel_video, create_video, delete_video, get_video, get_video_segments, get_video_status,
};
use crate::metrics::metrics_middleware;
use crate::middleware::{
    cors_layer, rate_limit_middleware, request_id, request_logging, security_headers, RateLimiterCache,
};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let video_routes = Router::new()
        .route("/videos/create", post(create_video))
        .route("/videos/:id", get(get_video))
        .route("/videos/:id", delete(delete_video))
        .route("/videos/:id/status", get(get_video_status))
        .route("/videos/:id/segments", get(get_video_segments))
        .route("/videos/:id/cancel", post(cancel_video));

    let prompt_routes = Router::new()
        .route("/prompts/enhance", post(enhance_prompt))
        .route("/prompts/decompose", post(decompose_prompt));

    let system_routes = Router::new().route("/system/status", get(system_status));

    let file_routes = Router::new().route("/files/:id/video", get(stream_video));

    let rate_limiter = std::sync::Arc::new(RateLimiterCache::new(state.config.rate_limit_rps));

    let api_routes = Router::new()
        .merge(video_routes)
        .merge(prompt_routes)
        .merge(system_routes)
        .merge(file_routes)
        .layer(middleware::from_fn_with_state(rate_limiter, rate_limit_middleware));

    let health_routes = Router::new()
        .route("/healthz", get(health))
        .route("/ready", get(ready));

    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .merge(api_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
