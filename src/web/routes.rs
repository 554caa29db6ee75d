use crate::state::AppState;
use axum::{routing::get, Router};

pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/api/stream", get(super::handlers::stream::stream_rows))

        // Health check
        .route("/health", get(super::handlers::health::health_check))

        .with_state(state)
}
