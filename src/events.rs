//! Normalized call events
//!
//! Provider adapters translate raw webhook payloads into these
//! provider-agnostic events; the call manager consumes them. Events carry a
//! globally unique `id` so redeliveries can be discarded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Direction of a call leg
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallDirection {
    /// Call placed by a remote party to us
    Inbound,
    /// Call placed by this gateway
    Outbound,
}

impl std::fmt::Display for CallDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inbound => write!(f, "inbound"),
            Self::Outbound => write!(f, "outbound"),
        }
    }
}

/// Type of a normalized call event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventType {
    /// A call leg came into existence (inbound ring or outbound request)
    CallInitiated,
    /// The remote end is ringing
    CallRinging,
    /// The call was answered
    CallAnswered,
    /// Recognized caller speech with a transcript payload
    CallSpeech,
    /// A DTMF digit was pressed
    CallDtmf,
    /// Queued TTS playback finished
    CallPlaybackFinished,
    /// The call ended (either party)
    CallHangup,
}

/// Provider-agnostic representation of a telephony occurrence
///
/// `call_id` is the internal identifier and may be absent on first inbound
/// contact; `provider_call_id` is always present and is what webhooks carry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedEvent {
    /// Globally unique event id, used for deduplication
    pub id: String,

    /// Event type
    #[serde(rename = "type")]
    pub event_type: EventType,

    /// Internal call identifier (absent on first inbound contact)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,

    /// Provider-assigned call identifier
    pub provider_call_id: String,

    /// When the event occurred
    pub timestamp: DateTime<Utc>,

    /// Call direction
    pub direction: CallDirection,

    /// Caller number
    pub from: String,

    /// Callee number
    pub to: String,

    /// Transcript text (`call-speech` only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,

    /// DTMF digits (`call-dtmf` only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digits: Option<String>,

    /// Provider hangup cause (`call-hangup` only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hangup_cause: Option<String>,
}

impl NormalizedEvent {
    /// Create an event with the given identity fields and no payload.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        event_type: EventType,
        provider_call_id: impl Into<String>,
        direction: CallDirection,
    ) -> Self {
        Self {
            id: id.into(),
            event_type,
            call_id: None,
            provider_call_id: provider_call_id.into(),
            timestamp: Utc::now(),
            direction,
            from: String::new(),
            to: String::new(),
            transcript: None,
            digits: None,
            hangup_cause: None,
        }
    }

    /// Return this event with `from`/`to` set.
    #[must_use]
    pub fn with_numbers(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.from = from.into();
        self.to = to.into();
        self
    }

    /// Return this event with a transcript payload.
    #[must_use]
    pub fn with_transcript(mut self, transcript: impl Into<String>) -> Self {
        self.transcript = Some(transcript.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_uses_kebab_case_wire_names() {
        let json = serde_json::to_string(&EventType::CallInitiated).unwrap();
        assert_eq!(json, "\"call-initiated\"");
        let parsed: EventType = serde_json::from_str("\"call-hangup\"").unwrap();
        assert_eq!(parsed, EventType::CallHangup);
    }

    #[test]
    fn event_round_trips_through_json() {
        let event = NormalizedEvent::new(
            "evt-1",
            EventType::CallSpeech,
            "pc-1",
            CallDirection::Inbound,
        )
        .with_numbers("+15551234567", "+15550000000")
        .with_transcript("hello there");

        let json = serde_json::to_string(&event).unwrap();
        let parsed: NormalizedEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id, "evt-1");
        assert_eq!(parsed.event_type, EventType::CallSpeech);
        assert_eq!(parsed.transcript.as_deref(), Some("hello there"));
        assert!(parsed.call_id.is_none());
    }
}
