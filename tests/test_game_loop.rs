//! End-to-end loop coverage: a full session from lobby to reclamation,
//! multi-episode continuation through the reset barrier, and the
//! acknowledgment timeout.

mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use simroom::{Coordinator, ParticipantId, Registry, RoomConfig, ServerEvent, SlotPolicySpec};

use common::{RecordingSink, no_policy_loader, scripted_factory};

async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..500 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within 5s");
}

fn received(sink: &RecordingSink, participant: &ParticipantId, want: fn(&ServerEvent) -> bool) -> bool {
    sink.events_for(participant).iter().any(|event| want(event))
}

#[tokio::test]
async fn full_session_lifecycle_with_id_reclamation() {
    common::init_logging();
    let config = RoomConfig::builder()
        .max_concurrent_sessions(1)
        .fps(100)
        .num_episodes(1)
        .slot("agent-0", SlotPolicySpec::Human)
        .slot("agent-1", SlotPolicySpec::Human)
        .build();
    let sink = RecordingSink::new();
    let (env_factory, _, _) = scripted_factory(3);
    let registry = Arc::new(Registry::new(
        Arc::new(config),
        env_factory,
        no_policy_loader(),
        Arc::clone(&sink) as Arc<dyn simroom::EventSink>,
    ));
    let coordinator = Coordinator::new(
        Arc::clone(&registry),
        Arc::clone(&sink) as Arc<dyn simroom::EventSink>,
    );

    let alice = ParticipantId::new("alice");
    let bob = ParticipantId::new("bob");

    // A joins and waits alone.
    coordinator.on_connect(&alice);
    coordinator.on_join(&alice).await;
    assert!(matches!(
        sink.events_for(&alice).as_slice(),
        [ServerEvent::WaitingRoomStatus {
            human_count: 1,
            needed: 1,
            ..
        }]
    ));

    // B fills the room; both hear the start.
    coordinator.on_connect(&bob);
    coordinator.on_join(&bob).await;
    for participant in [&alice, &bob] {
        assert!(received(&sink, participant, |event| matches!(
            event,
            ServerEvent::SessionStarted { .. }
        )));
    }

    // Three scripted steps end the only episode; both hear the end.
    for participant in [&alice, &bob] {
        wait_until(|| {
            received(&sink, participant, |event| {
                matches!(event, ServerEvent::SessionEnded { .. })
            })
        })
        .await;
    }

    // The loop ticked and broadcast state along the way.
    let events = sink.events_for(&alice);
    assert!(events.iter().any(|event| matches!(event, ServerEvent::InputRequest)));
    let max_tick = events
        .iter()
        .filter_map(|event| match event {
            ServerEvent::StateUpdate { tick, .. } => Some(*tick),
            _ => None,
        })
        .max();
    assert_eq!(max_tick, Some(3));

    // The id was reclaimed: a third client joins a fresh waiting room
    // instead of bouncing off capacity.
    wait_until(|| registry.free_session_ids().len() == 1).await;
    let charlie = ParticipantId::new("charlie");
    coordinator.on_connect(&charlie);
    coordinator.on_join(&charlie).await;
    assert!(matches!(
        sink.events_for(&charlie).as_slice(),
        [ServerEvent::WaitingRoomStatus { .. }]
    ));
}

#[tokio::test]
async fn episodes_continue_after_everyone_acknowledges() {
    common::init_logging();
    let config = RoomConfig::builder()
        .max_concurrent_sessions(1)
        .fps(100)
        .num_episodes(2)
        .reset_timeout_ms(2_000)
        .slot("agent-0", SlotPolicySpec::Human)
        .slot("agent-1", SlotPolicySpec::Human)
        .build();
    let sink = RecordingSink::new();
    let (env_factory, _, resets) = scripted_factory(2);
    let registry = Arc::new(Registry::new(
        Arc::new(config),
        env_factory,
        no_policy_loader(),
        Arc::clone(&sink) as Arc<dyn simroom::EventSink>,
    ));
    let coordinator = Coordinator::new(
        Arc::clone(&registry),
        Arc::clone(&sink) as Arc<dyn simroom::EventSink>,
    );

    let alice = ParticipantId::new("alice");
    let bob = ParticipantId::new("bob");
    for participant in [&alice, &bob] {
        coordinator.on_connect(participant);
        coordinator.on_join(participant).await;
    }
    let id = registry.session_id_for(&alice).expect("joined");

    // First episode ends; both are asked to acknowledge.
    wait_until(|| {
        received(&sink, &alice, |event| {
            matches!(event, ServerEvent::ResetPending { .. })
        })
    })
    .await;

    // One acknowledgment is not enough.
    coordinator.on_reset_ack(&alice, id);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!received(&sink, &alice, |event| matches!(
        event,
        ServerEvent::SessionEnded { .. }
    )));

    // The second acknowledgment resumes the session; it then runs its
    // final episode to completion.
    coordinator.on_reset_ack(&bob, id);
    wait_until(|| {
        received(&sink, &alice, |event| {
            matches!(event, ServerEvent::SessionEnded { .. })
        })
    })
    .await;

    // The environment was reset once at start and once at the boundary.
    assert_eq!(resets.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn unacknowledged_reset_times_out_and_resumes() {
    common::init_logging();
    let config = RoomConfig::builder()
        .max_concurrent_sessions(1)
        .fps(100)
        .num_episodes(2)
        .reset_timeout_ms(100)
        .slot("agent-0", SlotPolicySpec::Human)
        .build();
    let sink = RecordingSink::new();
    let (env_factory, _, resets) = scripted_factory(2);
    let registry = Arc::new(Registry::new(
        Arc::new(config),
        env_factory,
        no_policy_loader(),
        Arc::clone(&sink) as Arc<dyn simroom::EventSink>,
    ));
    let coordinator = Coordinator::new(
        Arc::clone(&registry),
        Arc::clone(&sink) as Arc<dyn simroom::EventSink>,
    );

    let alice = ParticipantId::new("alice");
    coordinator.on_connect(&alice);
    coordinator.on_join(&alice).await;

    // Alice never acknowledges; the barrier gives up after 100ms and the
    // session still runs both episodes.
    wait_until(|| {
        received(&sink, &alice, |event| {
            matches!(event, ServerEvent::SessionEnded { .. })
        })
    })
    .await;
    assert_eq!(resets.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn environment_failure_terminates_only_that_session() {
    common::init_logging();
    let config = RoomConfig::builder()
        .max_concurrent_sessions(1)
        .fps(100)
        .num_episodes(1)
        .slot("agent-0", SlotPolicySpec::Human)
        .build();
    let sink = RecordingSink::new();
    let env_factory: simroom::EnvFactory =
        Arc::new(|| Box::new(common::ScriptedEnv::failing_on_reset()));
    let registry = Arc::new(Registry::new(
        Arc::new(config),
        env_factory,
        no_policy_loader(),
        Arc::clone(&sink) as Arc<dyn simroom::EventSink>,
    ));
    let coordinator = Coordinator::new(
        Arc::clone(&registry),
        Arc::clone(&sink) as Arc<dyn simroom::EventSink>,
    );

    let alice = ParticipantId::new("alice");
    coordinator.on_connect(&alice);
    coordinator.on_join(&alice).await;

    // The initial reset explodes; the loop skips ticking, announces the
    // end, and reclaims the id so the server keeps serving.
    wait_until(|| {
        received(&sink, &alice, |event| {
            matches!(event, ServerEvent::SessionEnded { .. })
        })
    })
    .await;
    wait_until(|| registry.free_session_ids().len() == 1).await;
}

#[tokio::test]
async fn leaver_mid_reset_cannot_wedge_the_barrier() {
    common::init_logging();
    let config = RoomConfig::builder()
        .max_concurrent_sessions(1)
        .fps(100)
        .num_episodes(2)
        .reset_timeout_ms(2_000)
        .slot("agent-0", SlotPolicySpec::Human)
        .slot("agent-1", SlotPolicySpec::Human)
        .build();
    let sink = RecordingSink::new();
    let (env_factory, _, _) = scripted_factory(2);
    let registry = Arc::new(Registry::new(
        Arc::new(config),
        env_factory,
        no_policy_loader(),
        Arc::clone(&sink) as Arc<dyn simroom::EventSink>,
    ));
    let coordinator = Coordinator::new(
        Arc::clone(&registry),
        Arc::clone(&sink) as Arc<dyn simroom::EventSink>,
    );

    let alice = ParticipantId::new("alice");
    let bob = ParticipantId::new("bob");
    for participant in [&alice, &bob] {
        coordinator.on_connect(participant);
        coordinator.on_join(participant).await;
    }
    let id = registry.session_id_for(&alice).expect("joined");

    wait_until(|| {
        received(&sink, &alice, |event| {
            matches!(event, ServerEvent::ResetPending { .. })
        })
    })
    .await;

    // Alice acknowledges; Bob leaves instead. Leaving an active session
    // tears it down, and Bob's removal from the pending set lets the
    // blocked loop observe that and wind the session up without waiting
    // out the full acknowledgment budget.
    coordinator.on_reset_ack(&alice, id);
    coordinator.on_leave(&bob).await;

    wait_until(|| registry.free_session_ids().len() == 1).await;
    // Only one loop task ever drove the session; the id came back once.
    assert_eq!(registry.free_session_ids(), vec![simroom::SessionId::new(0)]);
}
