use super::AppState;
use crate::schema::{EventAction, NewEvent, StoredEvent};
use crate::services::{StoreError, StoreStatus};
use axum::extract::{Query, State};
use axum::response::Json;
use chrono::Utc;
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::HashMap;

const DEFAULT_EVENT_LIMIT: i64 = 20;
const MAX_EVENT_LIMIT: i64 = 100;

/// Latest events for the UI. An unreachable store yields an empty list.
pub async fn list_events(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Vec<StoredEvent>> {
    let limit = params
        .get("limit")
        .and_then(|raw| raw.parse::<i64>().ok())
        .unwrap_or(DEFAULT_EVENT_LIMIT)
        .clamp(0, MAX_EVENT_LIMIT);

    Json(state.store.recent(limit).await)
}

#[derive(Debug, Serialize)]
pub struct HealthView {
    pub status: &'static str,
    pub timestamp: String,
    pub database: StoreStatus,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthView> {
    Json(HealthView {
        status: "healthy",
        timestamp: Utc::now().to_rfc3339(),
        database: state.store.status(),
    })
}

/// Pings the store and writes a synthetic record. Always answers 200; the
/// outcome is in the body.
pub async fn test_db(State(state): State<AppState>) -> Json<Value> {
    if !state.store.is_connected() {
        return Json(json!({
            "status": "error",
            "message": "Database client not initialized",
        }));
    }

    let result: Result<StoredEvent, StoreError> = async {
        state.store.ping().await?;
        state.store.append(diagnostic_event()).await
    }
    .await;

    match result {
        Ok(stored) => {
            tracing::info!(event_id = %stored.id, "database diagnostic passed");
            Json(json!({
                "status": "success",
                "message": "Database connection and insertion test passed",
            }))
        }
        Err(e) => {
            tracing::warn!(error = %e, "database diagnostic failed");
            Json(json!({ "status": "error", "message": e.to_string() }))
        }
    }
}

fn diagnostic_event() -> NewEvent {
    let micros = Utc::now().timestamp_micros();
    NewEvent {
        id: format!("test_{}.{:06}", micros / 1_000_000, micros % 1_000_000),
        request_id: "test_request".into(),
        author: "Test User".into(),
        action: EventAction::Test,
        from_branch: Some("test_branch".into()),
        to_branch: "main".into(),
    }
}
