//! Plivo provider adapter
//!
//! Implements webhook signature verification, webhook payload normalization,
//! and call-control operations against the Plivo REST API. Media transport is
//! Plivo's concern; only call control lives here.

use std::collections::HashMap;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use async_trait::async_trait;

use crate::events::{CallDirection, EventType, NormalizedEvent};
use crate::{Error, Result};

use super::{
    HangupCallInput, InitiateCallInput, InitiateCallResult, PlayTtsInput, StartListeningInput,
    StopListeningInput, VoiceCallProvider, WebhookContext, WebhookParse, WebhookVerification,
};

type HmacSha256 = Hmac<Sha256>;

/// Plivo REST API base URL
const API_BASE: &str = "https://api.plivo.com/v1";

/// Signature header on Plivo webhooks
const SIGNATURE_HEADER: &str = "x-plivo-signature-v2";

/// Nonce header paired with the signature
const NONCE_HEADER: &str = "x-plivo-signature-v2-nonce";

/// Plivo telephony provider
pub struct PlivoProvider {
    auth_id: String,
    auth_token: String,
    webhook_url: String,
    client: reqwest::Client,
    api_base: String,
}

impl PlivoProvider {
    /// Create a Plivo adapter with account credentials and the public webhook
    /// URL used for callback registration.
    #[must_use]
    pub fn new(
        auth_id: impl Into<String>,
        auth_token: impl Into<String>,
        webhook_url: impl Into<String>,
    ) -> Self {
        Self {
            auth_id: auth_id.into(),
            auth_token: auth_token.into(),
            webhook_url: webhook_url.into(),
            client: reqwest::Client::new(),
            api_base: API_BASE.to_string(),
        }
    }

    /// Override the API base URL (for tests against a local server).
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Compute the V2 webhook signature: base64 HMAC-SHA256 of URL + nonce
    /// keyed by the auth token.
    fn compute_signature(&self, url: &str, nonce: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(self.auth_token.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(url.as_bytes());
        mac.update(nonce.as_bytes());
        BASE64.encode(mac.finalize().into_bytes())
    }

    fn call_url(&self, path: &str) -> String {
        format!("{}/Account/{}/{path}", self.api_base, self.auth_id)
    }

    /// Check a REST response, mapping non-success statuses to
    /// [`Error::Provider`] with the body attached.
    async fn check_response(resp: reqwest::Response, op: &str) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        Err(Error::Provider(format!("plivo {op} failed: {status} {body}")))
    }
}

/// Map a Plivo callback to a normalized event type.
///
/// Plivo reports lifecycle both through `Event` names (XML application
/// callbacks) and `CallStatus` values (status-change callbacks).
fn map_event_type(params: &HashMap<String, String>) -> Option<EventType> {
    if let Some(event) = params.get("Event") {
        return match event.as_str() {
            "StartApp" => Some(EventType::CallInitiated),
            "Ring" => Some(EventType::CallRinging),
            "Answer" => Some(EventType::CallAnswered),
            "Speech" => Some(EventType::CallSpeech),
            "Digits" => Some(EventType::CallDtmf),
            "PlayFinished" => Some(EventType::CallPlaybackFinished),
            "Hangup" => Some(EventType::CallHangup),
            _ => None,
        };
    }
    match params.get("CallStatus").map(String::as_str) {
        Some("ringing") => Some(EventType::CallInitiated),
        Some("in-progress") => Some(EventType::CallAnswered),
        Some("completed" | "busy" | "failed" | "no-answer") => Some(EventType::CallHangup),
        _ => None,
    }
}

/// Derive a dedup id for a callback.
///
/// Plivo doesn't assign webhook event ids; the (call, event kind, sequence)
/// triple identifies a delivery across retries.
fn derive_event_id(params: &HashMap<String, String>, call_uuid: &str) -> String {
    let kind = params
        .get("Event")
        .or_else(|| params.get("CallStatus"))
        .map_or("unknown", String::as_str);
    let seq = params
        .get("SequenceNumber")
        .or_else(|| params.get("EventTimestamp"))
        .map_or("0", String::as_str);
    format!("plivo:{call_uuid}:{kind}:{seq}")
}

#[derive(Serialize)]
struct InitiateCallRequest<'a> {
    to: &'a str,
    from: &'a str,
    answer_url: &'a str,
    answer_method: &'static str,
    hangup_url: &'a str,
    hangup_method: &'static str,
}

#[derive(Deserialize)]
struct InitiateCallResponse {
    request_uuid: String,
}

#[derive(Serialize)]
struct SpeakRequest<'a> {
    text: &'a str,
    voice: &'a str,
    language: &'static str,
}

#[derive(Serialize)]
struct RecordRequest<'a> {
    time_limit: u32,
    callback_url: &'a str,
    callback_method: &'static str,
    transcription_type: &'static str,
    transcription_url: &'a str,
}

#[async_trait]
impl VoiceCallProvider for PlivoProvider {
    fn name(&self) -> &'static str {
        "plivo"
    }

    fn verify_webhook(&self, ctx: &WebhookContext) -> WebhookVerification {
        let Some(signature) = ctx.header(SIGNATURE_HEADER) else {
            return WebhookVerification::rejected("missing signature header");
        };
        let Some(nonce) = ctx.header(NONCE_HEADER) else {
            return WebhookVerification::rejected("missing nonce header");
        };

        let expected = self.compute_signature(&ctx.url, nonce);
        // Plivo may send several signatures when the auth token was rotated
        if signature.split(',').any(|s| s.trim() == expected) {
            WebhookVerification::accepted()
        } else {
            WebhookVerification::rejected("signature mismatch")
        }
    }

    fn parse_webhook_event(&self, ctx: &WebhookContext) -> WebhookParse {
        let params: HashMap<String, String> =
            url::form_urlencoded::parse(ctx.body.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect();

        let Some(call_uuid) = params.get("CallUUID") else {
            tracing::debug!("plivo webhook without CallUUID, ignoring");
            return WebhookParse::empty(400);
        };

        let Some(event_type) = map_event_type(&params) else {
            tracing::debug!(call_uuid = %call_uuid, "unrecognized plivo callback, ignoring");
            return WebhookParse::empty(200);
        };

        let direction = match params.get("Direction").map(String::as_str) {
            Some("outbound") => CallDirection::Outbound,
            _ => CallDirection::Inbound,
        };

        let event = NormalizedEvent {
            id: derive_event_id(&params, call_uuid),
            event_type,
            call_id: None,
            provider_call_id: call_uuid.clone(),
            timestamp: Utc::now(),
            direction,
            from: params.get("From").cloned().unwrap_or_default(),
            to: params.get("To").cloned().unwrap_or_default(),
            transcript: params
                .get("Speech")
                .or_else(|| params.get("Transcription"))
                .cloned(),
            digits: params.get("Digits").cloned(),
            hangup_cause: params.get("HangupCause").cloned(),
        };

        WebhookParse {
            events: vec![event],
            status_code: 200,
        }
    }

    async fn initiate_call(&self, input: InitiateCallInput) -> Result<InitiateCallResult> {
        let resp = self
            .client
            .post(self.call_url("Call/"))
            .basic_auth(&self.auth_id, Some(&self.auth_token))
            .json(&InitiateCallRequest {
                to: &input.to,
                from: &input.from,
                answer_url: &input.answer_url,
                answer_method: "POST",
                hangup_url: &input.answer_url,
                hangup_method: "POST",
            })
            .send()
            .await?;

        let resp = Self::check_response(resp, "initiate").await?;
        let body: InitiateCallResponse = resp.json().await?;

        Ok(InitiateCallResult {
            provider_call_id: body.request_uuid,
            status: "initiated".to_string(),
        })
    }

    async fn hangup_call(&self, input: HangupCallInput) -> Result<()> {
        tracing::debug!(
            provider_call_id = %input.provider_call_id,
            reason = %input.reason,
            "hanging up call"
        );
        let resp = self
            .client
            .delete(self.call_url(&format!("Call/{}/", input.provider_call_id)))
            .basic_auth(&self.auth_id, Some(&self.auth_token))
            .send()
            .await?;

        Self::check_response(resp, "hangup").await.map(|_| ())
    }

    async fn play_tts(&self, input: PlayTtsInput) -> Result<()> {
        let resp = self
            .client
            .post(self.call_url(&format!("Call/{}/Speak/", input.provider_call_id)))
            .basic_auth(&self.auth_id, Some(&self.auth_token))
            .json(&SpeakRequest {
                text: &input.text,
                voice: input.voice.as_deref().unwrap_or("WOMAN"),
                language: "en-US",
            })
            .send()
            .await?;

        Self::check_response(resp, "speak").await.map(|_| ())
    }

    async fn start_listening(&self, input: StartListeningInput) -> Result<()> {
        let resp = self
            .client
            .post(self.call_url(&format!("Call/{}/Record/", input.provider_call_id)))
            .basic_auth(&self.auth_id, Some(&self.auth_token))
            .json(&RecordRequest {
                time_limit: 60,
                callback_url: &self.webhook_url,
                callback_method: "POST",
                transcription_type: "auto",
                transcription_url: &self.webhook_url,
            })
            .send()
            .await?;

        Self::check_response(resp, "record").await.map(|_| ())
    }

    async fn stop_listening(&self, input: StopListeningInput) -> Result<()> {
        let resp = self
            .client
            .delete(self.call_url(&format!("Call/{}/Record/", input.provider_call_id)))
            .basic_auth(&self.auth_id, Some(&self.auth_token))
            .send()
            .await?;

        Self::check_response(resp, "stop record").await.map(|_| ())
    }
}
