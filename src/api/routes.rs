use crate::api::{handlers, AppState};
use crate::metrics::MetricsLayer;
use axum::{
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::CorsLayer,
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Build the main API router
pub fn build_router(state: AppState, request_timeout: Duration) -> Router {
    let metrics_enabled = state.prometheus_enabled;

    let router = Router::new()
        // Health endpoint
        .route("/health", get(handlers::health_check))
        // Scoring
        .route("/predict", post(handlers::predict))
        .route("/batch_predict", post(handlers::batch_predict))
        // Model introspection
        .route("/model/info", get(handlers::model_info))
        .route("/metrics", get(handlers::metrics))
        .fallback(handlers::not_found)
        .route_layer(MetricsLayer::new(metrics_enabled))
        // Add state
        .with_state(state);

    with_service_layers(router, request_timeout)
}

/// Panic recovery, tracing, timeout and CORS around a finished router
fn with_service_layers(router: Router, request_timeout: Duration) -> Router {
    router
        .layer(CatchPanicLayer::custom(handlers::panic_response))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(TimeoutLayer::new(request_timeout))
        .layer(CorsLayer::permissive())
}
