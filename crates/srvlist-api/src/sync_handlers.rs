//! Sync trigger and status handlers.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use tracing::{info, warn};

use srvlist_core::TriggerMode;
use srvlist_sync::RunnerError;

use crate::ApiState;
use crate::handlers::{ApiResponse, error_response};

/// Exact match of `Authorization: Bearer <secret>`. An unset secret
/// matches nothing.
fn authorized(headers: &HeaderMap, secret: Option<&str>) -> bool {
    let Some(secret) = secret else {
        return false;
    };
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| token == secret)
}

/// GET|POST /api/v1/sync
pub async fn trigger_sync(State(state): State<ApiState>, headers: HeaderMap) -> impl IntoResponse {
    if !authorized(&headers, state.cron_secret.as_deref()) {
        warn!("sync trigger rejected");
        return error_response("unauthorized", StatusCode::UNAUTHORIZED).into_response();
    }

    let handle = match state.runner.submit() {
        Ok(handle) => handle,
        Err(e @ (RunnerError::QueueFull | RunnerError::Stopped)) => {
            return error_response(&e.to_string(), StatusCode::SERVICE_UNAVAILABLE).into_response();
        }
        Err(e) => {
            return error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR)
                .into_response();
        }
    };
    info!(run_id = handle.id, mode = ?state.trigger_mode, "sync triggered");

    match state.trigger_mode {
        TriggerMode::Detached => (
            StatusCode::ACCEPTED,
            ApiResponse::ok(serde_json::json!({ "run_id": handle.id, "status": "queued" })),
        )
            .into_response(),
        TriggerMode::Wait => match handle.wait().await {
            Ok(report) => ApiResponse::ok(report).into_response(),
            Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
        },
    }
}

/// GET /api/v1/sync/status
pub async fn sync_status(State(state): State<ApiState>) -> impl IntoResponse {
    ApiResponse::ok(state.runner.last_run().await).into_response()
}
