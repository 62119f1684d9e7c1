pub mod dashboard;
pub mod frontend;
pub mod webhook;

use crate::services::Store;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
}

pub fn router(state: AppState) -> Router {
    router_with_body_limit(state, webhook::MAX_BODY_BYTES)
}

fn router_with_body_limit(state: AppState, webhook_body_limit: usize) -> Router {
    Router::new()
        .route(
            "/webhook",
            post(webhook::receive_webhook).layer(DefaultBodyLimit::max(webhook_body_limit)),
        )
        .route("/api/events", get(dashboard::list_events))
        .route("/health", get(dashboard::health))
        .route("/test-db", get(dashboard::test_db))
        .fallback(frontend::serve_frontend)
        .with_state(state)
}
