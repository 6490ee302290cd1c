//! Inbound call admission policy
//!
//! Evaluated once per inbound `call-initiated` event, before any call record
//! exists. Numbers are normalized on both sides of the comparison so that
//! formatting differences ("+1 555 123-4567" vs "+15551234567") don't defeat
//! the policy.

use crate::config::{InboundPolicy, VoiceCallConfig};

/// Normalize a phone number for policy comparison.
///
/// Keeps a leading `+` and all digits; strips spaces, dashes, dots, and
/// parentheses.
#[must_use]
pub fn normalize_number(raw: &str) -> String {
    let trimmed = raw.trim();
    let mut normalized = String::with_capacity(trimmed.len());
    for (i, c) in trimmed.chars().enumerate() {
        if c.is_ascii_digit() || (c == '+' && i == 0) {
            normalized.push(c);
        }
    }
    normalized
}

/// Decide whether an inbound call from `from` is admitted.
#[must_use]
pub fn admits_inbound(config: &VoiceCallConfig, from: &str) -> bool {
    let from = normalize_number(from);
    match config.inbound_policy {
        InboundPolicy::Open => true,
        InboundPolicy::Allowlist => config
            .allow_from
            .iter()
            .any(|n| normalize_number(n) == from),
        InboundPolicy::Blocklist => !config
            .block_from
            .iter()
            .any(|n| normalize_number(n) == from),
    }
}
