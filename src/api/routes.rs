//! API Route Configuration

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{self, AppState};
use super::middleware::{logging_middleware, rate_limit_middleware};

/// Create the API router with all routes and middleware
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Health & Status
        .route("/health", get(handlers::health_check))
        .route("/stats", get(handlers::get_stats))
        // Analysis
        .route("/analyze", post(handlers::analyze_transaction))
        .route("/analyze/batch", post(handlers::batch_analyze))
        // Admission
        .route("/admissions", post(handlers::submit_admission))
        .route("/admissions/batch", post(handlers::submit_admission_batch))
        .route("/admissions/due", get(handlers::due_for_release))
        .route("/admissions/:id", get(handlers::get_admission))
        .route("/admissions/:id/release", post(handlers::release_admission))
        .route("/admissions/:id/block", post(handlers::force_block_admission));

    Router::new()
        .nest("/v1", api_v1)
        .route("/health", get(handlers::health_check))
        .with_state(state)
        // Middleware (order matters - bottom runs first)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(middleware::from_fn(logging_middleware))
        .layer(middleware::from_fn(rate_limit_middleware))
}
