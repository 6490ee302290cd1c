//! Call manager: shared call state and coordination
//!
//! The manager owns the active-call table, the provider-call-id correlation
//! table, the processed-event dedup set, transcript waiters, and max-duration
//! timers. All mutation happens here, inside [`CallManager::process_event`]
//! or the awaited call operations; everything handed out is a snapshot.
//!
//! Bookkeeping is synchronous under one lock (never held across an await);
//! provider side effects triggered by events run as spawned tasks whose
//! failures are logged and never unwind event processing.

pub mod call;
pub mod dedup;
mod events;
pub mod policy;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;

pub use call::{Call, CallState};
pub use dedup::EventDedup;

use crate::config::VoiceCallConfig;
use crate::events::CallDirection;
use crate::providers::{
    HangupCallInput, InitiateCallInput, PlayTtsInput, StartListeningInput, StopListeningInput,
    VoiceCallProvider,
};
use crate::{Error, Result};

/// Hangup reason recorded when inbound policy rejects a caller
pub const HANGUP_REASON_REJECTED: &str = "hangup-bot";

/// Hangup reason recorded when the max-duration timer fires
pub const HANGUP_REASON_MAX_DURATION: &str = "hangup-max-duration";

/// Hangup reason for explicit application-requested termination
pub const HANGUP_REASON_REQUESTED: &str = "hangup-requested";

/// Resolution delivered to a pending transcript waiter
#[derive(Debug, Clone, PartialEq, Eq)]
enum WaiterOutcome {
    /// A `call-speech` event arrived with this transcript
    Transcript(String),
    /// The call ended before a transcript arrived
    CallEnded,
    /// A newer waiter was registered for the same call
    Replaced,
}

/// A pending transcript waiter; `seq` lets a timed-out waiter remove itself
/// without clobbering a replacement registered in the meantime.
struct Waiter {
    seq: u64,
    tx: oneshot::Sender<WaiterOutcome>,
}

/// Counters over the manager's tables, exported for observability
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ManagerStats {
    /// Calls currently tracked
    pub active_calls: usize,
    /// Max-duration timers currently scheduled
    pub scheduled_timers: usize,
    /// Transcript waiters currently pending
    pub pending_waiters: usize,
    /// Event ids recorded in the dedup set
    pub processed_events: usize,
}

/// The context tables. A call is reachable from `active_calls` by internal id
/// and from `provider_call_ids` by provider id; at most one waiter and one
/// timer per call at any instant.
#[derive(Default)]
struct Tables {
    active_calls: HashMap<String, Call>,
    provider_call_ids: HashMap<String, String>,
    processed_events: EventDedup,
    transcript_waiters: HashMap<String, Waiter>,
    max_duration_timers: HashMap<String, AbortHandle>,
    waiter_seq: u64,
}

struct Inner {
    provider: Arc<dyn VoiceCallProvider>,
    config: VoiceCallConfig,
    tables: Mutex<Tables>,
}

/// Coordinates voice-call sessions against one telephony provider
///
/// Cheap to clone; clones share the same underlying state.
#[derive(Clone)]
pub struct CallManager {
    inner: Arc<Inner>,
}

impl CallManager {
    /// Create a manager bound to a provider and configuration.
    #[must_use]
    pub fn new(provider: Arc<dyn VoiceCallProvider>, config: VoiceCallConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                provider,
                config,
                tables: Mutex::new(Tables::default()),
            }),
        }
    }

    /// The bound provider instance.
    #[must_use]
    pub fn provider(&self) -> Arc<dyn VoiceCallProvider> {
        Arc::clone(&self.inner.provider)
    }

    /// The configuration the manager was built with.
    #[must_use]
    pub fn config(&self) -> &VoiceCallConfig {
        &self.inner.config
    }

    fn lock_tables(&self) -> MutexGuard<'_, Tables> {
        self.inner
            .tables
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of all tracked calls, oldest first.
    #[must_use]
    pub fn active_calls(&self) -> Vec<Call> {
        let tables = self.lock_tables();
        let mut calls: Vec<Call> = tables.active_calls.values().cloned().collect();
        calls.sort_by_key(|c| c.created_at);
        calls
    }

    /// Number of tracked calls.
    #[must_use]
    pub fn active_call_count(&self) -> usize {
        self.lock_tables().active_calls.len()
    }

    /// Snapshot of one call by internal id.
    #[must_use]
    pub fn get_call(&self, call_id: &str) -> Option<Call> {
        self.lock_tables().active_calls.get(call_id).cloned()
    }

    /// Counters over the manager's tables.
    #[must_use]
    pub fn stats(&self) -> ManagerStats {
        let tables = self.lock_tables();
        ManagerStats {
            active_calls: tables.active_calls.len(),
            scheduled_timers: tables.max_duration_timers.len(),
            pending_waiters: tables.transcript_waiters.len(),
            processed_events: tables.processed_events.len(),
        }
    }

    /// Place an outbound call and register it.
    ///
    /// Awaited end to end: on provider failure nothing is registered and the
    /// error surfaces to the caller.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when no caller id is available and
    /// [`Error::Provider`]/[`Error::Http`] when the provider rejects the
    /// initiation.
    pub async fn initiate_call(&self, to: &str, from: Option<&str>) -> Result<Call> {
        let from = from
            .map(ToString::to_string)
            .or_else(|| self.inner.config.from_number.clone())
            .ok_or_else(|| {
                Error::Config("no caller id: pass `from` or configure from_number".to_string())
            })?;

        let result = self
            .inner
            .provider
            .initiate_call(InitiateCallInput {
                to: to.to_string(),
                from: from.clone(),
                answer_url: self.inner.config.webhook_url.clone(),
            })
            .await?;

        let call_id = Call::generate_id();
        let call = Call::new(
            call_id.clone(),
            result.provider_call_id.clone(),
            CallDirection::Outbound,
            from,
            to,
            CallState::Initiating,
        );

        tracing::info!(
            call_id = %call_id,
            provider_call_id = %result.provider_call_id,
            to = %call.to,
            "outbound call initiated"
        );

        let timer = self.spawn_max_duration_timer(call_id.clone());
        let mut tables = self.lock_tables();
        tables
            .provider_call_ids
            .insert(result.provider_call_id, call_id.clone());
        tables.active_calls.insert(call_id.clone(), call.clone());
        tables.max_duration_timers.insert(call_id, timer);

        Ok(call)
    }

    /// Play synthesized speech into a call.
    ///
    /// Listening is stopped first so the provider never holds conflicting
    /// audio directives. The call stays in `speaking` until the provider
    /// reports playback finished (or a speech/hangup event supersedes it).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Call`] for an unknown call and propagates provider
    /// failures, restoring the call to `in-progress`.
    pub async fn speak(&self, call_id: &str, text: &str, voice: Option<&str>) -> Result<()> {
        let (provider_call_id, state) = self.snapshot_call(call_id)?;

        if state == CallState::Listening {
            self.inner
                .provider
                .stop_listening(StopListeningInput {
                    provider_call_id: provider_call_id.clone(),
                })
                .await?;
            self.transition(call_id, CallState::InProgress);
        }

        self.transition(call_id, CallState::Speaking);

        let played = self
            .inner
            .provider
            .play_tts(PlayTtsInput {
                provider_call_id,
                text: text.to_string(),
                voice: voice.map(ToString::to_string),
            })
            .await;

        if let Err(e) = played {
            self.transition_if(call_id, CallState::Speaking, CallState::InProgress);
            return Err(e);
        }
        Ok(())
    }

    /// Start capturing caller speech on a call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Call`] for an unknown call and propagates provider
    /// failures.
    pub async fn start_listening(&self, call_id: &str) -> Result<()> {
        let (provider_call_id, state) = self.snapshot_call(call_id)?;

        if state == CallState::Speaking {
            // No provider directive stops playback early; leaving `speaking`
            // here keeps a later playback-finished callback from clobbering
            // the listening state.
            tracing::debug!(call_id, "superseding active playback with listening");
        }

        self.inner
            .provider
            .start_listening(StartListeningInput { provider_call_id })
            .await?;
        self.transition(call_id, CallState::Listening);
        Ok(())
    }

    /// Stop capturing caller speech on a call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Call`] for an unknown call and propagates provider
    /// failures.
    pub async fn stop_listening(&self, call_id: &str) -> Result<()> {
        let (provider_call_id, _) = self.snapshot_call(call_id)?;

        self.inner
            .provider
            .stop_listening(StopListeningInput { provider_call_id })
            .await?;
        self.transition_if(call_id, CallState::Listening, CallState::InProgress);
        Ok(())
    }

    /// Terminate a call and run terminal cleanup.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Call`] for an unknown call. Provider hangup failure
    /// is propagated, but cleanup runs regardless — the record is gone either
    /// way.
    pub async fn hangup(&self, call_id: &str, reason: &str) -> Result<()> {
        let (provider_call_id, _) = self.snapshot_call(call_id)?;

        let result = self
            .inner
            .provider
            .hangup_call(HangupCallInput {
                provider_call_id,
                reason: reason.to_string(),
            })
            .await;

        let mut tables = self.lock_tables();
        Self::remove_call_locked(&mut tables, call_id);
        drop(tables);

        tracing::info!(call_id, reason, "call hung up");
        result
    }

    /// Wait for the next spoken transcript on a call.
    ///
    /// At most one waiter per call: registering a second waiter replaces the
    /// first, which fails with [`Error::Call`]. The waiter is rejected with
    /// [`Error::CallEnded`] if the call terminates first, and with
    /// [`Error::Timeout`] if `timeout` elapses.
    ///
    /// # Errors
    ///
    /// See above; also [`Error::Call`] when the call is unknown at
    /// registration time.
    pub async fn wait_for_transcript(
        &self,
        call_id: &str,
        timeout: Option<Duration>,
    ) -> Result<String> {
        let (tx, rx) = oneshot::channel();
        let seq = {
            let mut tables = self.lock_tables();
            if !tables.active_calls.contains_key(call_id) {
                return Err(Error::Call(format!("no active call {call_id}")));
            }
            tables.waiter_seq += 1;
            let seq = tables.waiter_seq;
            if let Some(prev) = tables
                .transcript_waiters
                .insert(call_id.to_string(), Waiter { seq, tx })
            {
                let _ = prev.tx.send(WaiterOutcome::Replaced);
            }
            seq
        };

        let outcome = if let Some(limit) = timeout {
            match tokio::time::timeout(limit, rx).await {
                Ok(received) => received,
                Err(_) => {
                    let mut tables = self.lock_tables();
                    if tables
                        .transcript_waiters
                        .get(call_id)
                        .is_some_and(|w| w.seq == seq)
                    {
                        tables.transcript_waiters.remove(call_id);
                    }
                    return Err(Error::Timeout(format!(
                        "no transcript on call {call_id} within {}s",
                        limit.as_secs()
                    )));
                }
            }
        } else {
            rx.await
        };

        match outcome {
            Ok(WaiterOutcome::Transcript(text)) => Ok(text),
            Ok(WaiterOutcome::Replaced) => Err(Error::Call(format!(
                "transcript wait on call {call_id} replaced by a newer waiter"
            ))),
            // A dropped sender means the manager itself went away mid-wait;
            // treat it the same as the call ending.
            Ok(WaiterOutcome::CallEnded) | Err(_) => Err(Error::CallEnded(format!(
                "call {call_id} ended before a transcript arrived"
            ))),
        }
    }

    /// Snapshot (`provider_call_id`, state) of an active call.
    fn snapshot_call(&self, call_id: &str) -> Result<(String, CallState)> {
        let tables = self.lock_tables();
        tables.active_calls.get(call_id).map_or_else(
            || Err(Error::Call(format!("no active call {call_id}"))),
            |call| Ok((call.provider_call_id.clone(), call.state)),
        )
    }

    /// Set the state of an active call; no-op when the call is gone.
    fn transition(&self, call_id: &str, next: CallState) {
        let mut tables = self.lock_tables();
        if let Some(call) = tables.active_calls.get_mut(call_id) {
            call.state = next;
        }
    }

    /// Set the state only when the call is currently in `expected`.
    fn transition_if(&self, call_id: &str, expected: CallState, next: CallState) {
        let mut tables = self.lock_tables();
        if let Some(call) = tables.active_calls.get_mut(call_id) {
            if call.state == expected {
                call.state = next;
            }
        }
    }

    /// Schedule the one-shot max-duration timer for a call and return its
    /// abort handle. Aborting is idempotent; aborting an already-fired timer
    /// is a no-op.
    fn spawn_max_duration_timer(&self, call_id: String) -> AbortHandle {
        let manager = self.clone();
        let limit = Duration::from_secs(self.inner.config.max_call_duration_secs);
        let task = tokio::spawn(async move {
            tokio::time::sleep(limit).await;
            manager.enforce_max_duration(&call_id).await;
        });
        task.abort_handle()
    }

    /// Timer body: force-end a call that outlived the configured maximum.
    async fn enforce_max_duration(&self, call_id: &str) {
        let provider_call_id = {
            let tables = self.lock_tables();
            match tables.active_calls.get(call_id) {
                Some(call) => call.provider_call_id.clone(),
                // Already terminated; nothing to enforce
                None => return,
            }
        };

        tracing::info!(call_id, "max call duration reached, hanging up");

        if let Err(e) = self
            .inner
            .provider
            .hangup_call(HangupCallInput {
                provider_call_id,
                reason: HANGUP_REASON_MAX_DURATION.to_string(),
            })
            .await
        {
            tracing::warn!(call_id, error = %e, "max-duration hangup failed");
        }

        let mut tables = self.lock_tables();
        Self::remove_call_locked(&mut tables, call_id);
    }

    /// Terminal cleanup with the tables lock held: remove the call from both
    /// correlation tables, cancel its timer, and reject its waiter. Safe to
    /// call twice for the same id.
    fn remove_call_locked(tables: &mut Tables, call_id: &str) -> Option<Call> {
        let call = tables.active_calls.remove(call_id)?;
        tables.provider_call_ids.remove(&call.provider_call_id);

        if let Some(timer) = tables.max_duration_timers.remove(call_id) {
            timer.abort();
        }
        if let Some(waiter) = tables.transcript_waiters.remove(call_id) {
            let _ = waiter.tx.send(WaiterOutcome::CallEnded);
        }

        Some(call)
    }
}
