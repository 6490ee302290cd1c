//! Call session records and lifecycle states

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::events::CallDirection;

/// Lifecycle state of a call
///
/// `listening` and `speaking` are mutually exclusive for a given call;
/// starting one while the other is active must first stop the other so the
/// provider never receives conflicting simultaneous audio directives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CallState {
    /// Outbound call placed, awaiting provider confirmation
    Initiating,
    /// The call leg exists and is ringing
    Ringing,
    /// The call is connected with no audio directive active
    InProgress,
    /// Actively capturing caller speech
    Listening,
    /// TTS playback in progress
    Speaking,
    /// Terminal state
    Ended,
}

impl CallState {
    /// Whether this state is terminal.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Ended)
    }
}

/// Mutable session record for one call leg
///
/// Owned exclusively by the [`CallManager`](super::CallManager) for its
/// lifetime; everything handed out of the manager is a clone.
#[derive(Debug, Clone, Serialize)]
pub struct Call {
    /// Internal call identifier
    pub call_id: String,

    /// Provider-assigned call identifier
    pub provider_call_id: String,

    /// Call direction
    pub direction: CallDirection,

    /// Caller number
    pub from: String,

    /// Callee number
    pub to: String,

    /// Current lifecycle state
    pub state: CallState,

    /// When the record was created
    pub created_at: DateTime<Utc>,
}

impl Call {
    /// Create a call record in the given initial state.
    #[must_use]
    pub fn new(
        call_id: impl Into<String>,
        provider_call_id: impl Into<String>,
        direction: CallDirection,
        from: impl Into<String>,
        to: impl Into<String>,
        state: CallState,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            provider_call_id: provider_call_id.into(),
            direction,
            from: from.into(),
            to: to.into(),
            state,
            created_at: Utc::now(),
        }
    }

    /// Generate a fresh internal call id.
    #[must_use]
    pub fn generate_id() -> String {
        Uuid::new_v4().to_string()
    }
}
