//! HTTP surface for the Ringway gateway
//!
//! Hosts the provider webhook endpoint and a small call-control API. The
//! webhook handler answers the provider immediately; call side effects run in
//! background tasks owned by the manager.

pub mod calls;
pub mod health;
pub mod webhooks;

use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::Result;
use crate::manager::CallManager;

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    /// The call manager driving all state
    pub manager: CallManager,

    /// Public URL the provider signs webhooks against
    pub webhook_url: String,
}

/// Build the full router.
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .merge(health::router())
        .nest("/api/calls", calls::router(state.clone()))
        .nest("/webhooks", webhooks::router(state))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any))
}

/// Serve the API on the given port until the process exits.
///
/// # Errors
///
/// Returns an error if the listener can't bind or the server fails.
pub async fn serve(state: Arc<ApiState>, port: u16) -> Result<()> {
    let app = router(state);
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(port, "webhook server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
