//! Call-control endpoints
//!
//! Outbound initiation and per-call operations. Unlike the webhook path,
//! these are awaited end to end and surface manager errors as HTTP errors.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use super::ApiState;
use crate::manager::{Call, HANGUP_REASON_REQUESTED, ManagerStats};
use crate::{Error, Result};

/// Request body for placing an outbound call
#[derive(Debug, Deserialize)]
pub struct InitiateRequest {
    /// Destination number
    pub to: String,

    /// Caller id override (defaults to the configured `from_number`)
    pub from: Option<String>,
}

/// Request body for speaking into a call
#[derive(Debug, Deserialize)]
pub struct SpeakRequest {
    /// Text to synthesize
    pub text: String,

    /// Voice identifier override
    pub voice: Option<String>,
}

/// Error payload for failed call operations
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Listing of tracked calls
#[derive(Serialize)]
pub struct CallListResponse {
    pub calls: Vec<Call>,
}

/// Build calls router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/", get(list_calls).post(initiate_call))
        .route("/stats", get(stats))
        .route("/{call_id}/speak", post(speak))
        .route("/{call_id}/hangup", post(hangup))
        .with_state(state)
}

/// Map a manager error onto an HTTP status
fn error_response(e: &Error) -> (StatusCode, Json<ErrorResponse>) {
    let status = match e {
        Error::Call(_) => StatusCode::NOT_FOUND,
        Error::CallEnded(_) => StatusCode::GONE,
        Error::Config(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::BAD_GATEWAY,
    };
    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
}

fn respond<T: Serialize>(result: Result<T>) -> axum::response::Response {
    use axum::response::IntoResponse;
    match result {
        Ok(value) => Json(value).into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}

/// Snapshot of all tracked calls
async fn list_calls(State(state): State<Arc<ApiState>>) -> Json<CallListResponse> {
    Json(CallListResponse {
        calls: state.manager.active_calls(),
    })
}

/// Manager table counters
async fn stats(State(state): State<Arc<ApiState>>) -> Json<ManagerStats> {
    Json(state.manager.stats())
}

/// Place an outbound call
async fn initiate_call(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<InitiateRequest>,
) -> axum::response::Response {
    respond(
        state
            .manager
            .initiate_call(&req.to, req.from.as_deref())
            .await,
    )
}

/// Speak text into an active call
async fn speak(
    State(state): State<Arc<ApiState>>,
    Path(call_id): Path<String>,
    Json(req): Json<SpeakRequest>,
) -> axum::response::Response {
    respond(
        state
            .manager
            .speak(&call_id, &req.text, req.voice.as_deref())
            .await
            .map(|()| serde_json::json!({ "ok": true })),
    )
}

/// Hang up an active call
async fn hangup(
    State(state): State<Arc<ApiState>>,
    Path(call_id): Path<String>,
) -> axum::response::Response {
    respond(
        state
            .manager
            .hangup(&call_id, HANGUP_REASON_REQUESTED)
            .await
            .map(|()| serde_json::json!({ "ok": true })),
    )
}
