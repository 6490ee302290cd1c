//! Provider webhook endpoint
//!
//! `POST /webhooks/voice` authenticates the request through the bound
//! provider, normalizes the payload, and feeds each event to the call
//! manager. The response status is whatever the provider's parser dictates —
//! providers retry on anything else, so the handler returns fast and lets
//! side effects finish in the background.

use std::collections::HashMap;
use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode};
use axum::routing::post;

use super::ApiState;
use crate::providers::WebhookContext;

/// Build webhooks router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/voice", post(handle_voice))
        .with_state(state)
}

/// Handle an incoming provider webhook
async fn handle_voice(
    State(state): State<Arc<ApiState>>,
    method: Method,
    headers: HeaderMap,
    body: String,
) -> StatusCode {
    let header_map: HashMap<String, String> = headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_lowercase(), v.to_string()))
        })
        .collect();

    // Providers sign the public URL they deliver to, not our local route
    let ctx = WebhookContext {
        method: method.to_string(),
        url: state.webhook_url.clone(),
        headers: header_map,
        body,
    };

    let provider = state.manager.provider();

    let verification = provider.verify_webhook(&ctx);
    if !verification.ok {
        tracing::warn!(
            provider = provider.name(),
            reason = verification.reason.as_deref().unwrap_or_default(),
            "webhook verification failed"
        );
        return StatusCode::FORBIDDEN;
    }

    let parse = provider.parse_webhook_event(&ctx);
    tracing::debug!(
        provider = provider.name(),
        events = parse.events.len(),
        "webhook parsed"
    );

    for event in &parse.events {
        state.manager.process_event(event);
    }

    StatusCode::from_u16(parse.status_code).unwrap_or(StatusCode::OK)
}
