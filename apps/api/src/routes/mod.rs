pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::apply::handlers;
use crate::state::AppState;

/// Builds the service router. `max_upload_bytes` caps the buffered form body,
/// CV included.
pub fn build_router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/apply", post(handlers::handle_apply))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}
