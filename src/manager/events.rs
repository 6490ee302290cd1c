//! Normalized event processing
//!
//! One event at a time is applied against the manager's tables: dedup first,
//! correlation, admission policy for fresh inbound calls, then the lifecycle
//! transition. The event id is marked processed as the last step on every
//! branch, so a redelivery never repeats an action — even one whose side
//! effect failed.

use std::sync::Arc;

use crate::events::{CallDirection, EventType, NormalizedEvent};
use crate::providers::HangupCallInput;

use super::{
    Call, CallManager, CallState, HANGUP_REASON_REJECTED, Tables, WaiterOutcome, policy,
};

impl CallManager {
    /// Apply one normalized event to the shared state.
    ///
    /// Synchronous bookkeeping; provider side effects (policy hangups) are
    /// spawned and not awaited. Malformed, duplicate, and unknown-call events
    /// are discarded silently — callers never observe an error.
    pub fn process_event(&self, event: &NormalizedEvent) {
        let mut tables = self.lock_tables();

        if tables.processed_events.contains(&event.id) {
            tracing::debug!(event_id = %event.id, "duplicate event, skipping");
            return;
        }

        // Inbound webhooks carry only the provider's identifier; resolve ours
        let resolved = tables
            .provider_call_ids
            .get(&event.provider_call_id)
            .cloned()
            .or_else(|| {
                event
                    .call_id
                    .clone()
                    .filter(|id| tables.active_calls.contains_key(id))
            });

        match resolved {
            None if event.event_type == EventType::CallInitiated
                && event.direction == CallDirection::Inbound =>
            {
                self.admit_inbound(&mut tables, event);
            }
            Some(call_id) => self.apply_transition(&mut tables, &call_id, event),
            None => {
                // Stale or unknown call: providers redeliver events after a
                // call has already ended
                tracing::debug!(
                    event_id = %event.id,
                    provider_call_id = %event.provider_call_id,
                    "event for unknown call, skipping"
                );
            }
        }

        tables.processed_events.insert(&event.id);
    }

    /// Evaluate admission policy for a fresh inbound call attempt.
    fn admit_inbound(&self, tables: &mut Tables, event: &NormalizedEvent) {
        if !policy::admits_inbound(&self.inner.config, &event.from) {
            tracing::info!(
                from = %event.from,
                provider_call_id = %event.provider_call_id,
                policy = %self.inner.config.inbound_policy,
                "inbound call rejected by policy"
            );

            // Fire-and-forget: the rejection hangup completes in the
            // background and its failure never reaches the event's caller
            let provider = Arc::clone(&self.inner.provider);
            let provider_call_id = event.provider_call_id.clone();
            drop(tokio::spawn(async move {
                if let Err(e) = provider
                    .hangup_call(HangupCallInput {
                        provider_call_id: provider_call_id.clone(),
                        reason: HANGUP_REASON_REJECTED.to_string(),
                    })
                    .await
                {
                    tracing::warn!(
                        provider_call_id = %provider_call_id,
                        error = %e,
                        "failed to hang up rejected call"
                    );
                }
            }));
            return;
        }

        let call_id = event
            .call_id
            .clone()
            .unwrap_or_else(Call::generate_id);
        let call = Call::new(
            call_id.clone(),
            event.provider_call_id.clone(),
            CallDirection::Inbound,
            event.from.clone(),
            event.to.clone(),
            CallState::Ringing,
        );

        tracing::info!(
            call_id = %call_id,
            provider_call_id = %event.provider_call_id,
            from = %event.from,
            "inbound call accepted"
        );

        tables
            .provider_call_ids
            .insert(event.provider_call_id.clone(), call_id.clone());
        tables.active_calls.insert(call_id.clone(), call);
        let timer = self.spawn_max_duration_timer(call_id.clone());
        tables.max_duration_timers.insert(call_id, timer);
    }

    /// Apply a lifecycle transition for an already-tracked call. Transitions
    /// that make no sense for the current state are no-ops, not errors —
    /// providers may reorder or redeliver.
    fn apply_transition(&self, tables: &mut Tables, call_id: &str, event: &NormalizedEvent) {
        match event.event_type {
            EventType::CallInitiated | EventType::CallRinging => {
                if let Some(call) = tables.active_calls.get_mut(call_id) {
                    if call.state == CallState::Initiating {
                        call.state = CallState::Ringing;
                    }
                }
            }
            EventType::CallAnswered => {
                if let Some(call) = tables.active_calls.get_mut(call_id) {
                    if matches!(call.state, CallState::Initiating | CallState::Ringing) {
                        call.state = CallState::InProgress;
                        tracing::info!(call_id, "call answered");
                    }
                }
            }
            EventType::CallSpeech => {
                if let Some(call) = tables.active_calls.get_mut(call_id) {
                    if call.state == CallState::Listening {
                        call.state = CallState::InProgress;
                    }
                }
                match event.transcript.clone() {
                    Some(text) => {
                        if let Some(waiter) = tables.transcript_waiters.remove(call_id) {
                            let _ = waiter.tx.send(WaiterOutcome::Transcript(text));
                        }
                    }
                    None => {
                        tracing::debug!(call_id, "speech event without transcript payload");
                    }
                }
            }
            EventType::CallDtmf => {
                tracing::debug!(
                    call_id,
                    digits = event.digits.as_deref().unwrap_or_default(),
                    "dtmf received"
                );
            }
            EventType::CallPlaybackFinished => {
                if let Some(call) = tables.active_calls.get_mut(call_id) {
                    if call.state == CallState::Speaking {
                        call.state = CallState::InProgress;
                    }
                }
            }
            EventType::CallHangup => {
                tracing::info!(
                    call_id,
                    cause = event.hangup_cause.as_deref().unwrap_or_default(),
                    "call ended"
                );
                Self::remove_call_locked(tables, call_id);
            }
        }
    }
}
