use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers;
use super::state::AppState;

/// Create the application router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/receive", post(handlers::receive))
        .route("/health", get(handlers::health_check))
        .route("/test", get(handlers::test_endpoint))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
