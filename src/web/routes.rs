use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::handlers;
use super::state::AppState;

// API Routes - the report endpoint and a status check
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new().nest(
        "/api",
        Router::new()
            .route("/report", post(handlers::api::report))
            // System status
            .route("/status", get(handlers::api::system_status)),
    )
}
