//! API layer - routes, handlers, and middleware

pub mod handlers;
pub mod middleware;
pub mod responses;
pub mod routes;

use crate::state::AppState;
use axum::{extract::DefaultBodyLimit, response::IntoResponse, routing::get, Json, Router};
use serde_json::json;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    let max_body_size = state.config.server.max_request_body_size;
    let cors_origins = state.config.server.cors_origins.clone();

    Router::new()
        .route("/health", get(health_check))
        .merge(routes::resource_routes())
        .with_state(state)
        // Applied in reverse order
        .layer(axum::middleware::from_fn(
            middleware::security_headers_middleware,
        ))
        .layer(middleware::cors(&cors_origins))
        .layer(middleware::trace())
        .layer(DefaultBodyLimit::max(max_body_size))
}

async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "ris-server"
    }))
}
