use super::AppState;
use crate::services::{Store, normalize};
use axum::body::Bytes;
use axum::extract::State;
use axum::extract::rejection::BytesRejection;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde_json::{Value, json};
use tracing::Instrument;
use uuid::Uuid;

pub const EVENT_HEADER: &str = "x-github-event";
pub const DELIVERY_HEADER: &str = "x-github-delivery";
/// GitHub caps webhook payloads at 25 MB.
pub const MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

pub async fn receive_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    if !state.store.is_connected() {
        return error_response("Database not connected");
    }

    let body = match body {
        Ok(body) => body,
        Err(rejection) => {
            tracing::error!(error = %rejection, "failed to read webhook body");
            return error_response(&rejection.body_text());
        }
    };

    let event_type = header_str(&headers, EVENT_HEADER);
    let delivery_id = header_str(&headers, DELIVERY_HEADER)
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let span = tracing::info_span!("webhook", event_type, %delivery_id);

    async move {
        tracing::info!("received webhook event");

        let payload: Value = match serde_json::from_slice(&body) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(error = %e, "error processing webhook");
                return error_response(&e.to_string());
            }
        };

        persist(&state.store, event_type, &payload).await;

        (
            StatusCode::OK,
            Json(json!({ "status": "success", "event_type": event_type })),
        )
            .into_response()
    }
    .instrument(span)
    .await
}

/// Mapping and storage failures are logged here and never reach the sender.
async fn persist(store: &Store, event_type: Option<&str>, payload: &Value) {
    let event = match normalize(event_type, payload) {
        Ok(Some(event)) => event,
        Ok(None) => {
            tracing::debug!("event type or action not tracked, nothing stored");
            return;
        }
        Err(e) => {
            tracing::warn!(error = %e, "malformed webhook payload");
            return;
        }
    };

    match store.append(event).await {
        Ok(stored) => tracing::info!(
            event_id = %stored.id,
            action = %stored.action,
            author = %stored.author,
            to_branch = %stored.to_branch,
            "stored event"
        ),
        Err(e) => tracing::error!(error = %e, "failed to store event"),
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

pub(super) fn error_response(message: &str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "status": "error", "message": message })),
    )
        .into_response()
}
