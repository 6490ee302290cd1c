//! Call manager integration tests
//!
//! Exercises event processing, admission policy, deduplication, lifecycle
//! transitions, transcript waiters, and max-duration enforcement against a
//! recording fake provider.

use std::sync::Arc;
use std::time::Duration;

use ringway::manager::CallManager;
use ringway::{
    CallDirection, CallState, Error, EventType, NormalizedEvent, VoiceCallConfig,
    HANGUP_REASON_MAX_DURATION, HANGUP_REASON_REJECTED,
};

mod common;
use common::{
    allowlist_config, answered, blocklist_config, hangup, inbound_initiated, settle, speech,
    test_config, wait_until, FakeProvider,
};

fn manager_with(config: VoiceCallConfig) -> (CallManager, Arc<FakeProvider>) {
    let provider = FakeProvider::new();
    let manager = CallManager::new(provider.clone(), config);
    (manager, provider)
}

#[tokio::test]
async fn allowlist_rejects_unlisted_caller_with_hangup_bot() {
    let (manager, provider) = manager_with(allowlist_config(&["+15551234567"]));

    manager.process_event(&inbound_initiated(
        "evt-rejected",
        "provider-call-uuid-rejected",
        "+15559999999",
    ));

    wait_until("rejection hangup", || provider.hangups().len() == 1).await;

    let hangups = provider.hangups();
    assert_eq!(hangups[0].provider_call_id, "provider-call-uuid-rejected");
    assert_eq!(hangups[0].reason, HANGUP_REASON_REJECTED);

    // No call record was created
    assert_eq!(manager.active_call_count(), 0);
    assert_eq!(manager.stats().scheduled_timers, 0);
}

#[tokio::test]
async fn allowlist_accepts_listed_caller() {
    let (manager, provider) = manager_with(allowlist_config(&["+15551234567"]));

    manager.process_event(&inbound_initiated("evt-1", "pc-1", "+15551234567"));

    let calls = manager.active_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].provider_call_id, "pc-1");
    assert_eq!(calls[0].state, CallState::Ringing);
    assert_eq!(calls[0].direction, CallDirection::Inbound);

    // Correlated and timer scheduled
    assert_eq!(manager.stats().scheduled_timers, 1);

    settle().await;
    assert!(provider.hangups().is_empty());
}

#[tokio::test]
async fn allowlist_matching_ignores_number_formatting() {
    let (manager, _provider) = manager_with(allowlist_config(&["+1 (555) 123-4567"]));

    manager.process_event(&inbound_initiated("evt-1", "pc-1", "+15551234567"));

    assert_eq!(manager.active_call_count(), 1);
}

#[tokio::test]
async fn blocklist_rejects_listed_caller_only() {
    let (manager, provider) = manager_with(blocklist_config(&["+15559999999"]));

    manager.process_event(&inbound_initiated("evt-1", "pc-1", "+15559999999"));
    wait_until("blocklist hangup", || provider.hangups().len() == 1).await;
    assert_eq!(manager.active_call_count(), 0);

    manager.process_event(&inbound_initiated("evt-2", "pc-2", "+15551234567"));
    assert_eq!(manager.active_call_count(), 1);
}

#[tokio::test]
async fn duplicate_events_are_processed_once() {
    let (manager, _provider) = manager_with(test_config());

    let event = inbound_initiated("evt-1", "pc-1", "+15551234567");
    manager.process_event(&event);
    manager.process_event(&event);

    assert_eq!(manager.active_call_count(), 1);
    assert_eq!(manager.stats().scheduled_timers, 1);
}

#[tokio::test]
async fn duplicate_rejection_hangs_up_exactly_once() {
    let (manager, provider) = manager_with(allowlist_config(&["+15551234567"]));

    let event = inbound_initiated("evt-1", "pc-1", "+15559999999");
    manager.process_event(&event);
    manager.process_event(&event);

    settle().await;
    assert_eq!(provider.hangups().len(), 1);
}

#[tokio::test]
async fn events_for_unknown_calls_are_discarded() {
    let (manager, _provider) = manager_with(test_config());

    manager.process_event(&answered("evt-1", "pc-never-seen"));
    manager.process_event(&hangup("evt-2", "pc-never-seen"));

    assert_eq!(manager.active_call_count(), 0);
}

#[tokio::test]
async fn answered_transitions_ringing_to_in_progress() {
    let (manager, _provider) = manager_with(test_config());

    manager.process_event(&inbound_initiated("evt-1", "pc-1", "+15551234567"));
    manager.process_event(&answered("evt-2", "pc-1"));

    let call = &manager.active_calls()[0];
    assert_eq!(call.state, CallState::InProgress);
}

#[tokio::test]
async fn hangup_event_runs_terminal_cleanup() {
    let (manager, _provider) = manager_with(test_config());

    manager.process_event(&inbound_initiated("evt-1", "pc-1", "+15551234567"));
    assert_eq!(manager.stats().scheduled_timers, 1);

    manager.process_event(&hangup("evt-2", "pc-1"));

    let stats = manager.stats();
    assert_eq!(stats.active_calls, 0);
    assert_eq!(stats.scheduled_timers, 0);
    assert_eq!(stats.pending_waiters, 0);
}

#[tokio::test]
async fn waiter_resolves_with_transcript_exactly_once() {
    let (manager, _provider) = manager_with(test_config());
    manager.process_event(&inbound_initiated("evt-1", "pc-1", "+15551234567"));
    let call_id = manager.active_calls()[0].call_id.clone();

    let waiting = {
        let manager = manager.clone();
        let call_id = call_id.clone();
        tokio::spawn(async move {
            manager
                .wait_for_transcript(&call_id, Some(Duration::from_secs(2)))
                .await
        })
    };

    wait_until("waiter registration", || manager.stats().pending_waiters == 1).await;
    manager.process_event(&speech("evt-2", "pc-1", "hello from the caller"));

    let transcript = waiting.await.unwrap().unwrap();
    assert_eq!(transcript, "hello from the caller");
    assert_eq!(manager.stats().pending_waiters, 0);
}

#[tokio::test]
async fn waiter_is_rejected_when_the_call_ends() {
    let (manager, _provider) = manager_with(test_config());
    manager.process_event(&inbound_initiated("evt-1", "pc-1", "+15551234567"));
    let call_id = manager.active_calls()[0].call_id.clone();

    let waiting = {
        let manager = manager.clone();
        tokio::spawn(async move {
            manager
                .wait_for_transcript(&call_id, Some(Duration::from_secs(2)))
                .await
        })
    };

    wait_until("waiter registration", || manager.stats().pending_waiters == 1).await;
    manager.process_event(&hangup("evt-2", "pc-1"));

    let result = waiting.await.unwrap();
    assert!(matches!(result, Err(Error::CallEnded(_))));
}

#[tokio::test]
async fn second_waiter_replaces_the_first() {
    let (manager, _provider) = manager_with(test_config());
    manager.process_event(&inbound_initiated("evt-1", "pc-1", "+15551234567"));
    let call_id = manager.active_calls()[0].call_id.clone();

    let first = {
        let manager = manager.clone();
        let call_id = call_id.clone();
        tokio::spawn(async move {
            manager
                .wait_for_transcript(&call_id, Some(Duration::from_secs(2)))
                .await
        })
    };
    wait_until("first waiter", || manager.stats().pending_waiters == 1).await;

    let second = {
        let manager = manager.clone();
        let call_id = call_id.clone();
        tokio::spawn(async move {
            manager
                .wait_for_transcript(&call_id, Some(Duration::from_secs(2)))
                .await
        })
    };

    // The first waiter fails fast once replaced
    let first_result = first.await.unwrap();
    assert!(matches!(first_result, Err(Error::Call(_))));

    manager.process_event(&speech("evt-2", "pc-1", "for the second waiter"));
    let second_result = second.await.unwrap().unwrap();
    assert_eq!(second_result, "for the second waiter");
}

#[tokio::test]
async fn waiting_on_unknown_call_fails_immediately() {
    let (manager, _provider) = manager_with(test_config());
    let result = manager.wait_for_transcript("no-such-call", None).await;
    assert!(matches!(result, Err(Error::Call(_))));
}

#[tokio::test]
async fn waiter_times_out_when_no_speech_arrives() {
    let (manager, _provider) = manager_with(test_config());
    manager.process_event(&inbound_initiated("evt-1", "pc-1", "+15551234567"));
    let call_id = manager.active_calls()[0].call_id.clone();

    let result = manager
        .wait_for_transcript(&call_id, Some(Duration::from_millis(50)))
        .await;

    assert!(matches!(result, Err(Error::Timeout(_))));
    assert_eq!(manager.stats().pending_waiters, 0);
}

#[tokio::test]
async fn max_duration_timer_force_ends_the_call() {
    let config = VoiceCallConfig {
        max_call_duration_secs: 1,
        ..test_config()
    };
    let (manager, provider) = manager_with(config);

    manager.process_event(&inbound_initiated("evt-1", "pc-1", "+15551234567"));
    assert_eq!(manager.active_call_count(), 1);

    wait_until("max-duration hangup", || {
        provider
            .hangups()
            .iter()
            .any(|h| h.reason == HANGUP_REASON_MAX_DURATION)
    })
    .await;

    let stats = manager.stats();
    assert_eq!(stats.active_calls, 0);
    assert_eq!(stats.scheduled_timers, 0);
}

#[tokio::test]
async fn canceled_timer_never_fires() {
    let config = VoiceCallConfig {
        max_call_duration_secs: 1,
        ..test_config()
    };
    let (manager, provider) = manager_with(config);

    manager.process_event(&inbound_initiated("evt-1", "pc-1", "+15551234567"));
    manager.process_event(&hangup("evt-2", "pc-1"));
    assert_eq!(manager.stats().scheduled_timers, 0);

    // Sleep past the would-be deadline; no hangup may be issued
    tokio::time::sleep(Duration::from_millis(1300)).await;
    assert!(provider.hangups().is_empty());
}

#[tokio::test]
async fn outbound_initiation_registers_the_call() {
    let (manager, _provider) = manager_with(test_config());

    let call = manager.initiate_call("+15557654321", None).await.unwrap();
    assert_eq!(call.state, CallState::Initiating);
    assert_eq!(call.direction, CallDirection::Outbound);
    assert_eq!(call.provider_call_id, "request-uuid");
    assert_eq!(call.from, "+15550000000");

    let stats = manager.stats();
    assert_eq!(stats.active_calls, 1);
    assert_eq!(stats.scheduled_timers, 1);

    // Provider events for the new leg correlate through the provider call id
    manager.process_event(&NormalizedEvent::new(
        "evt-1",
        EventType::CallAnswered,
        "request-uuid",
        CallDirection::Outbound,
    ));
    assert_eq!(
        manager.get_call(&call.call_id).unwrap().state,
        CallState::InProgress
    );
}

#[tokio::test]
async fn failed_initiation_leaves_no_partial_state() {
    let provider = FakeProvider::failing_initiate();
    let manager = CallManager::new(provider, test_config());

    let result = manager.initiate_call("+15557654321", None).await;
    assert!(matches!(result, Err(Error::Provider(_))));

    let stats = manager.stats();
    assert_eq!(stats.active_calls, 0);
    assert_eq!(stats.scheduled_timers, 0);
}

#[tokio::test]
async fn initiation_without_caller_id_is_a_config_error() {
    let config = VoiceCallConfig {
        from_number: None,
        ..test_config()
    };
    let (manager, _provider) = manager_with(config);

    let result = manager.initiate_call("+15557654321", None).await;
    assert!(matches!(result, Err(Error::Config(_))));
}

#[tokio::test]
async fn speak_stops_listening_first() {
    let (manager, provider) = manager_with(test_config());
    manager.process_event(&inbound_initiated("evt-1", "pc-1", "+15551234567"));
    manager.process_event(&answered("evt-2", "pc-1"));
    let call_id = manager.active_calls()[0].call_id.clone();

    manager.start_listening(&call_id).await.unwrap();
    assert_eq!(manager.get_call(&call_id).unwrap().state, CallState::Listening);

    manager.speak(&call_id, "one moment", None).await.unwrap();

    // Listening was stopped before playback started
    assert_eq!(provider.stop_listening_calls.lock().unwrap().len(), 1);
    assert_eq!(provider.play_tts_calls.lock().unwrap().len(), 1);
    assert_eq!(manager.get_call(&call_id).unwrap().state, CallState::Speaking);

    // Playback completion returns the call to in-progress
    manager.process_event(&NormalizedEvent::new(
        "evt-3",
        EventType::CallPlaybackFinished,
        "pc-1",
        CallDirection::Inbound,
    ));
    assert_eq!(
        manager.get_call(&call_id).unwrap().state,
        CallState::InProgress
    );
}

#[tokio::test]
async fn failed_playback_restores_in_progress() {
    let provider = Arc::new(FakeProvider {
        fail_play_tts: true,
        ..FakeProvider::default()
    });
    let manager = CallManager::new(provider.clone(), test_config());
    manager.process_event(&inbound_initiated("evt-1", "pc-1", "+15551234567"));
    manager.process_event(&answered("evt-2", "pc-1"));
    let call_id = manager.active_calls()[0].call_id.clone();

    let result = manager.speak(&call_id, "nope", None).await;
    assert!(matches!(result, Err(Error::Provider(_))));
    assert_eq!(
        manager.get_call(&call_id).unwrap().state,
        CallState::InProgress
    );
}

#[tokio::test]
async fn speech_event_returns_listening_call_to_in_progress() {
    let (manager, _provider) = manager_with(test_config());
    manager.process_event(&inbound_initiated("evt-1", "pc-1", "+15551234567"));
    manager.process_event(&answered("evt-2", "pc-1"));
    let call_id = manager.active_calls()[0].call_id.clone();

    manager.start_listening(&call_id).await.unwrap();
    manager.process_event(&speech("evt-3", "pc-1", "done talking"));

    assert_eq!(
        manager.get_call(&call_id).unwrap().state,
        CallState::InProgress
    );
}

#[tokio::test]
async fn explicit_hangup_removes_the_call() {
    let (manager, provider) = manager_with(test_config());
    manager.process_event(&inbound_initiated("evt-1", "pc-1", "+15551234567"));
    let call_id = manager.active_calls()[0].call_id.clone();

    manager.hangup(&call_id, "hangup-requested").await.unwrap();

    assert_eq!(manager.active_call_count(), 0);
    assert_eq!(provider.hangups().len(), 1);
    assert_eq!(provider.hangups()[0].reason, "hangup-requested");
}
