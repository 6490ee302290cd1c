//! Telephony provider adapters
//!
//! Each vendor implements the [`VoiceCallProvider`] trait; the call manager
//! and the webhook surface depend only on this contract and treat every
//! provider polymorphically.

mod plivo;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

pub use plivo::PlivoProvider;

use crate::config::VoiceCallConfig;
use crate::events::NormalizedEvent;
use crate::{Error, Result};

/// HTTP request context handed to a provider for webhook verification and
/// parsing
#[derive(Debug, Clone)]
pub struct WebhookContext {
    /// HTTP method of the webhook request
    pub method: String,

    /// Public URL the provider delivered the webhook to (the URL it signed)
    pub url: String,

    /// Request headers, names lowercased
    pub headers: HashMap<String, String>,

    /// Raw request body
    pub body: String,
}

impl WebhookContext {
    /// Look up a header by lowercase name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

/// Result of webhook authentication
#[derive(Debug, Clone)]
pub struct WebhookVerification {
    /// Whether the request is authentic
    pub ok: bool,

    /// Rejection reason when not ok
    pub reason: Option<String>,
}

impl WebhookVerification {
    /// An accepted verification.
    #[must_use]
    pub const fn accepted() -> Self {
        Self {
            ok: true,
            reason: None,
        }
    }

    /// A rejected verification with a reason.
    #[must_use]
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            ok: false,
            reason: Some(reason.into()),
        }
    }
}

/// Result of webhook payload parsing: zero or more normalized events plus the
/// HTTP status to return to the provider
#[derive(Debug, Clone)]
pub struct WebhookParse {
    /// Normalized events extracted from the payload
    pub events: Vec<NormalizedEvent>,

    /// HTTP status code to answer the webhook with
    pub status_code: u16,
}

impl WebhookParse {
    /// An empty parse with the given status.
    #[must_use]
    pub const fn empty(status_code: u16) -> Self {
        Self {
            events: Vec::new(),
            status_code,
        }
    }
}

/// Input for placing an outbound call
#[derive(Debug, Clone)]
pub struct InitiateCallInput {
    /// Destination number
    pub to: String,

    /// Caller id
    pub from: String,

    /// URL the provider should deliver call webhooks to
    pub answer_url: String,
}

/// Result of placing an outbound call
#[derive(Debug, Clone)]
pub struct InitiateCallResult {
    /// Provider-assigned identifier for the new call leg
    pub provider_call_id: String,

    /// Provider-reported status (e.g. "initiated")
    pub status: String,
}

/// Input for terminating a call
#[derive(Debug, Clone)]
pub struct HangupCallInput {
    /// Provider-assigned call identifier
    pub provider_call_id: String,

    /// Recorded reason for the hangup (e.g. "hangup-bot")
    pub reason: String,
}

/// Input for playing synthesized speech into a call
#[derive(Debug, Clone)]
pub struct PlayTtsInput {
    /// Provider-assigned call identifier
    pub provider_call_id: String,

    /// Text to speak
    pub text: String,

    /// Voice identifier, provider-specific
    pub voice: Option<String>,
}

/// Input for starting speech capture on a call
#[derive(Debug, Clone)]
pub struct StartListeningInput {
    /// Provider-assigned call identifier
    pub provider_call_id: String,
}

/// Input for stopping speech capture on a call
#[derive(Debug, Clone)]
pub struct StopListeningInput {
    /// Provider-assigned call identifier
    pub provider_call_id: String,
}

/// Trait for telephony provider adapters
///
/// Verification and parsing are synchronous (pure functions of the request);
/// call-control operations reach the vendor's API and are async.
#[async_trait]
pub trait VoiceCallProvider: Send + Sync {
    /// Get the provider name
    fn name(&self) -> &'static str;

    /// Authenticate an inbound webhook request
    fn verify_webhook(&self, ctx: &WebhookContext) -> WebhookVerification;

    /// Translate a raw webhook payload into zero or more normalized events
    /// plus the HTTP status to return to the provider
    fn parse_webhook_event(&self, ctx: &WebhookContext) -> WebhookParse;

    /// Place an outbound call
    async fn initiate_call(&self, input: InitiateCallInput) -> Result<InitiateCallResult>;

    /// Terminate a call
    async fn hangup_call(&self, input: HangupCallInput) -> Result<()>;

    /// Play synthesized speech into an active call
    async fn play_tts(&self, input: PlayTtsInput) -> Result<()>;

    /// Start capturing caller speech
    async fn start_listening(&self, input: StartListeningInput) -> Result<()>;

    /// Stop capturing caller speech
    async fn stop_listening(&self, input: StopListeningInput) -> Result<()>;
}

/// Resolve a provider adapter from configuration.
///
/// # Errors
///
/// Returns [`Error::Config`] for an unknown provider name or missing
/// credentials.
pub fn make_provider(config: &VoiceCallConfig) -> Result<Arc<dyn VoiceCallProvider>> {
    match config.provider.as_str() {
        "plivo" => {
            let auth_id = config
                .auth_id
                .clone()
                .ok_or_else(|| Error::Config("plivo requires auth_id".to_string()))?;
            let auth_token = config
                .auth_token
                .clone()
                .ok_or_else(|| Error::Config("plivo requires auth_token".to_string()))?;
            Ok(Arc::new(PlivoProvider::new(
                auth_id,
                auth_token,
                config.webhook_url.clone(),
            )))
        }
        other => Err(Error::Config(format!("unknown voice provider: {other}"))),
    }
}
