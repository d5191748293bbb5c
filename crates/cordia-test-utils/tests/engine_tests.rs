// SPDX-FileCopyrightText: 2026 Cordia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sequence engine behavior driven directly, without the scheduler.

use chrono::Duration;

use cordia_bus::EventChain;
use cordia_core::CordiaError;
use cordia_core::types::{Direction, EventKind, SequenceStatus, StepCondition};
use cordia_sequence::AdvanceOutcome;
use cordia_test_utils::{TestHarness, step};

const SENDER: &str = "+491234567890";

async fn enrolled_harness(steps: Vec<cordia_core::types::FollowUpStep>) -> (TestHarness, String) {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.seed_default_sequence(steps).await.unwrap();
    let outcome = harness.whatsapp_webhook(SENDER, "Hi, tell me more").await.unwrap();
    let state_id = harness
        .storage
        .open_states_for_lead(&harness.tenant, &outcome.lead_id)
        .await
        .unwrap()[0]
        .id
        .clone();
    (harness, state_id)
}

/// `advance` twice for the same step: one send, one step_executed event,
/// the repeat returns the recorded outcome.
#[tokio::test]
async fn advance_is_idempotent_per_step() {
    let (harness, state_id) = enrolled_harness(vec![
        step(0, 0, StepCondition::Always, "intro"),
        step(1, 2, StepCondition::NoReply, "nudge"),
    ])
    .await;

    let first = harness
        .engine
        .advance(&harness.tenant, &state_id, EventChain::root())
        .await
        .unwrap();
    let AdvanceOutcome::Dispatched { message_id } = first else {
        panic!("expected dispatch, got {first:?}");
    };

    // Force the cursor back as a crash-retry would see it, then repeat.
    let mut state = harness
        .storage
        .get_sequence_state(&harness.tenant, &state_id)
        .await
        .unwrap()
        .unwrap();
    state.current_step_index = 0;
    let version = state.row_version;
    assert!(
        harness
            .storage
            .update_sequence_state(&state, version)
            .await
            .unwrap()
    );

    let second = harness
        .engine
        .advance(&harness.tenant, &state_id, EventChain::root())
        .await
        .unwrap();
    match second {
        AdvanceOutcome::Duplicate { prior } => {
            assert_eq!(prior["message_id"], message_id);
        }
        other => panic!("expected duplicate, got {other:?}"),
    }

    assert_eq!(harness.whatsapp.sent_count(), 1);
    let executed = harness
        .event_log
        .list_for_replay(&harness.tenant, Some(EventKind::SequenceStepExecuted), None, 10)
        .await
        .unwrap();
    assert_eq!(executed.len(), 1);
    let sent = harness
        .event_log
        .list_for_replay(&harness.tenant, Some(EventKind::MessageSent), None, 10)
        .await
        .unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].correlation_id, executed[0].correlation_id);
}

/// Once the hold backoff has capped at seven days, each further hold
/// surfaces a `sequence.stalled` event for observability.
#[tokio::test]
async fn capped_holds_emit_a_stalled_event() {
    let (harness, state_id) = enrolled_harness(vec![
        step(0, 0, StepCondition::RepliedPositive, "intro"),
        step(1, 2, StepCondition::Always, "nudge"),
    ])
    .await;

    for _ in 0..4 {
        let outcome = harness
            .engine
            .advance(&harness.tenant, &state_id, EventChain::root())
            .await
            .unwrap();
        let AdvanceOutcome::Held { until } = outcome else {
            panic!("expected hold, got {outcome:?}");
        };
        harness.clock.set(until);
    }

    let stalled = harness
        .event_log
        .list_for_replay(&harness.tenant, Some(EventKind::SequenceStalled), None, 10)
        .await
        .unwrap();
    assert_eq!(stalled.len(), 1, "only the capped hold emits");
    assert_eq!(stalled[0].payload["hold_count"], 4);
}

/// A failed condition holds with doubling backoff, capped at seven days.
#[tokio::test]
async fn failed_condition_holds_with_backoff() {
    let (harness, state_id) = enrolled_harness(vec![
        step(0, 0, StepCondition::RepliedPositive, "intro"),
        step(1, 2, StepCondition::Always, "nudge"),
    ])
    .await;

    // "Hi, tell me more" scores neutral, so replied_positive fails.
    let now = harness.clock.now();
    let outcome = harness
        .engine
        .advance(&harness.tenant, &state_id, EventChain::root())
        .await
        .unwrap();
    match outcome {
        AdvanceOutcome::Held { until } => assert_eq!(until, now + Duration::days(1)),
        other => panic!("expected hold, got {other:?}"),
    }

    harness.clock.set(now + Duration::days(1));
    let outcome = harness
        .engine
        .advance(&harness.tenant, &state_id, EventChain::root())
        .await
        .unwrap();
    match outcome {
        AdvanceOutcome::Held { until } => {
            assert_eq!(until, now + Duration::days(1) + Duration::days(2));
        }
        other => panic!("expected hold, got {other:?}"),
    }

    assert_eq!(harness.whatsapp.sent_count(), 0);
    let state = harness
        .storage
        .get_sequence_state(&harness.tenant, &state_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(state.status, SequenceStatus::WaitingResponse);
    assert_eq!(state.hold_count, 2);
    assert_eq!(state.current_step_index, 0);
}

/// A send failure keeps the cursor, persists the failed outbound message,
/// and emits `send.failed`.
#[tokio::test]
async fn send_failure_does_not_advance() {
    let (harness, state_id) = enrolled_harness(vec![
        step(0, 0, StepCondition::Always, "intro"),
        step(1, 2, StepCondition::NoReply, "nudge"),
    ])
    .await;

    harness.whatsapp.fail_next(CordiaError::ChannelUnavailable {
        channel: "whatsapp".into(),
        source: None,
    });

    let err = harness
        .engine
        .advance(&harness.tenant, &state_id, EventChain::root())
        .await
        .unwrap_err();
    assert!(matches!(err, CordiaError::ChannelUnavailable { .. }));

    let state = harness
        .storage
        .get_sequence_state(&harness.tenant, &state_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(state.current_step_index, 0, "failed send must not advance");
    assert_eq!(state.hold_count, 1);

    let messages = harness
        .storage
        .recent_messages(&harness.tenant, &state.lead_id, 10)
        .await
        .unwrap();
    let failed = messages
        .iter()
        .find(|m| m.direction == Direction::Outbound)
        .expect("failed outbound must be persisted");
    assert_eq!(failed.meta["failed"], true);

    let failures = harness
        .event_log
        .list_for_replay(&harness.tenant, Some(EventKind::SendFailed), None, 10)
        .await
        .unwrap();
    assert_eq!(failures.len(), 1);

    // The vendor recovered: a later advance dispatches normally.
    harness.clock.advance(Duration::days(1));
    let outcome = harness
        .engine
        .advance(&harness.tenant, &state_id, EventChain::root())
        .await
        .unwrap();
    assert!(matches!(outcome, AdvanceOutcome::Dispatched { .. }));
    assert_eq!(harness.whatsapp.sent_count(), 1);
}

/// `paused_until` short-circuits advance until it passes.
#[tokio::test]
async fn pause_short_circuits_until_reached() {
    let (harness, state_id) = enrolled_harness(vec![
        step(0, 0, StepCondition::Always, "intro"),
        step(1, 2, StepCondition::Always, "nudge"),
    ])
    .await;

    let until = harness.clock.now() + Duration::days(3);
    harness.engine.pause(&harness.tenant, &state_id, until).await.unwrap();

    let outcome = harness
        .engine
        .advance(&harness.tenant, &state_id, EventChain::root())
        .await
        .unwrap();
    assert!(matches!(outcome, AdvanceOutcome::Skipped { reason: "paused" }));
    assert_eq!(harness.whatsapp.sent_count(), 0);

    harness.clock.set(until + Duration::minutes(1));
    let outcome = harness
        .engine
        .advance(&harness.tenant, &state_id, EventChain::root())
        .await
        .unwrap();
    assert!(matches!(outcome, AdvanceOutcome::Dispatched { .. }));
    assert_eq!(harness.whatsapp.sent_count(), 1);
}

/// The last step's dispatch completes the sequence.
#[tokio::test]
async fn dispatching_the_last_step_completes() {
    let (harness, state_id) =
        enrolled_harness(vec![step(0, 0, StepCondition::Always, "intro")]).await;

    let outcome = harness
        .engine
        .advance(&harness.tenant, &state_id, EventChain::root())
        .await
        .unwrap();
    assert!(matches!(outcome, AdvanceOutcome::Dispatched { .. }));

    let state = harness
        .storage
        .get_sequence_state(&harness.tenant, &state_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(state.status, SequenceStatus::Completed);
    assert!(state.completed_at.is_some());

    let completed = harness
        .event_log
        .list_for_replay(&harness.tenant, Some(EventKind::SequenceCompleted), None, 10)
        .await
        .unwrap();
    assert_eq!(completed.len(), 1);

    // Terminal states skip further advances.
    let outcome = harness
        .engine
        .advance(&harness.tenant, &state_id, EventChain::root())
        .await
        .unwrap();
    assert!(matches!(outcome, AdvanceOutcome::Skipped { reason: "terminal" }));
}

/// A stopped state is terminal and never picked up again.
#[tokio::test]
async fn stop_is_terminal() {
    let (harness, state_id) = enrolled_harness(vec![
        step(0, 0, StepCondition::Always, "intro"),
        step(1, 2, StepCondition::Always, "nudge"),
    ])
    .await;

    harness.engine.stop(&harness.tenant, &state_id).await.unwrap();
    let state = harness
        .storage
        .get_sequence_state(&harness.tenant, &state_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(state.status, SequenceStatus::Stopped);

    harness.clock.advance(Duration::seconds(60));
    let stats = harness.tick().await.unwrap();
    assert_eq!(stats.claimed, 0);
    assert_eq!(harness.whatsapp.sent_count(), 0);
}
