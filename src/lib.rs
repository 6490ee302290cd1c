//! Ringway - Telephony voice-call gateway for AI assistants
//!
//! This library coordinates voice-call sessions driven by asynchronous
//! provider webhook events: inbound admission policy, call lifecycle state,
//! duration limits, serialized playback/listening, and transcript waits.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │               Telephony Provider                     │
//! │        webhooks in  │  call-control REST out         │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │              Provider Adapter                        │
//! │   verify  │  normalize events  │  initiate/hangup   │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                Call Manager                          │
//! │   dedup │ policy │ lifecycle │ timers │ waiters     │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! The manager consumes normalized events and dispatches side effects back
//! through the provider adapter; callers of the event path never observe
//! errors for malformed, duplicate, or stale events.

pub mod api;
pub mod config;
pub mod error;
pub mod events;
pub mod manager;
pub mod providers;

pub use config::{InboundPolicy, VoiceCallConfig};
pub use error::{Error, Result};
pub use events::{CallDirection, EventType, NormalizedEvent};
pub use manager::{
    Call, CallManager, CallState, HANGUP_REASON_MAX_DURATION, HANGUP_REASON_REJECTED,
    HANGUP_REASON_REQUESTED, ManagerStats,
};
pub use providers::{
    HangupCallInput, InitiateCallInput, InitiateCallResult, PlayTtsInput, PlivoProvider,
    StartListeningInput, StopListeningInput, VoiceCallProvider, WebhookContext, WebhookParse,
    WebhookVerification, make_provider,
};
