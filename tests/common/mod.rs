//! Shared test utilities

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use ringway::{
    CallDirection, Error, EventType, HangupCallInput, InboundPolicy, InitiateCallInput,
    InitiateCallResult, NormalizedEvent, PlayTtsInput, Result, StartListeningInput,
    StopListeningInput, VoiceCallConfig, VoiceCallProvider, WebhookContext, WebhookParse,
    WebhookVerification,
};

/// Recording fake provider; verification accepts unless an `x-test-reject`
/// header is present, and parsing decodes the body as one JSON
/// `NormalizedEvent`.
#[derive(Default)]
pub struct FakeProvider {
    pub hangup_calls: Mutex<Vec<HangupCallInput>>,
    pub play_tts_calls: Mutex<Vec<PlayTtsInput>>,
    pub start_listening_calls: Mutex<Vec<StartListeningInput>>,
    pub stop_listening_calls: Mutex<Vec<StopListeningInput>>,
    pub fail_initiate: bool,
    pub fail_play_tts: bool,
}

impl FakeProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_initiate() -> Arc<Self> {
        Arc::new(Self {
            fail_initiate: true,
            ..Self::default()
        })
    }

    pub fn hangups(&self) -> Vec<HangupCallInput> {
        self.hangup_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl VoiceCallProvider for FakeProvider {
    fn name(&self) -> &'static str {
        "plivo"
    }

    fn verify_webhook(&self, ctx: &WebhookContext) -> WebhookVerification {
        if ctx.header("x-test-reject").is_some() {
            WebhookVerification::rejected("test rejection")
        } else {
            WebhookVerification::accepted()
        }
    }

    fn parse_webhook_event(&self, ctx: &WebhookContext) -> WebhookParse {
        match serde_json::from_str::<NormalizedEvent>(&ctx.body) {
            Ok(event) => WebhookParse {
                events: vec![event],
                status_code: 200,
            },
            Err(_) => WebhookParse::empty(400),
        }
    }

    async fn initiate_call(&self, _input: InitiateCallInput) -> Result<InitiateCallResult> {
        if self.fail_initiate {
            return Err(Error::Provider("initiate refused".to_string()));
        }
        Ok(InitiateCallResult {
            provider_call_id: "request-uuid".to_string(),
            status: "initiated".to_string(),
        })
    }

    async fn hangup_call(&self, input: HangupCallInput) -> Result<()> {
        self.hangup_calls.lock().unwrap().push(input);
        Ok(())
    }

    async fn play_tts(&self, input: PlayTtsInput) -> Result<()> {
        if self.fail_play_tts {
            return Err(Error::Provider("tts refused".to_string()));
        }
        self.play_tts_calls.lock().unwrap().push(input);
        Ok(())
    }

    async fn start_listening(&self, input: StartListeningInput) -> Result<()> {
        self.start_listening_calls.lock().unwrap().push(input);
        Ok(())
    }

    async fn stop_listening(&self, input: StopListeningInput) -> Result<()> {
        self.stop_listening_calls.lock().unwrap().push(input);
        Ok(())
    }
}

/// Base configuration for manager tests
pub fn test_config() -> VoiceCallConfig {
    VoiceCallConfig {
        enabled: true,
        from_number: Some("+15550000000".to_string()),
        webhook_url: "https://example.com/webhooks/voice".to_string(),
        store_path: std::env::temp_dir().join("ringway-tests"),
        max_call_duration_secs: 60,
        ..VoiceCallConfig::default()
    }
}

/// Allowlist configuration admitting exactly the given numbers
pub fn allowlist_config(allow: &[&str]) -> VoiceCallConfig {
    VoiceCallConfig {
        inbound_policy: InboundPolicy::Allowlist,
        allow_from: allow.iter().map(ToString::to_string).collect(),
        ..test_config()
    }
}

/// Blocklist configuration rejecting exactly the given numbers
pub fn blocklist_config(block: &[&str]) -> VoiceCallConfig {
    VoiceCallConfig {
        inbound_policy: InboundPolicy::Blocklist,
        block_from: block.iter().map(ToString::to_string).collect(),
        ..test_config()
    }
}

/// An inbound call-initiated event
pub fn inbound_initiated(id: &str, provider_call_id: &str, from: &str) -> NormalizedEvent {
    NormalizedEvent::new(
        id,
        EventType::CallInitiated,
        provider_call_id,
        CallDirection::Inbound,
    )
    .with_numbers(from, "+15550000000")
}

/// A call-answered event
pub fn answered(id: &str, provider_call_id: &str) -> NormalizedEvent {
    NormalizedEvent::new(
        id,
        EventType::CallAnswered,
        provider_call_id,
        CallDirection::Inbound,
    )
}

/// A call-speech event with a transcript payload
pub fn speech(id: &str, provider_call_id: &str, transcript: &str) -> NormalizedEvent {
    NormalizedEvent::new(
        id,
        EventType::CallSpeech,
        provider_call_id,
        CallDirection::Inbound,
    )
    .with_transcript(transcript)
}

/// A call-hangup event
pub fn hangup(id: &str, provider_call_id: &str) -> NormalizedEvent {
    NormalizedEvent::new(
        id,
        EventType::CallHangup,
        provider_call_id,
        CallDirection::Inbound,
    )
}

/// Poll until `check` passes or the budget elapses; panics on timeout.
pub async fn wait_until(what: &str, check: impl Fn() -> bool) {
    for _ in 0..100 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}

/// Give spawned fire-and-forget tasks a moment to run.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}
