//! Queue navigation against in-memory capabilities.

mod support;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use bridge_traits::BridgeError;
use core_playback::{
    MaterializeOutcome, NavigationOutcome, PlaybackError, PlaybackToggle, PrefetchConfig, QueueNavigator, SlotRole,
    Track, TrackCatalog, TrackId,
};
use core_runtime::events::{CoreEvent, QueueEvent};
use sha2::{Digest, Sha256};
use support::{audio_body, eventually, ids, slot_dir, Harness, BUFFER_ROOT};

fn id(value: &str) -> TrackId {
    TrackId::from(value)
}

async fn assert_queue_consistent(navigator: &QueueNavigator, catalog_len: usize) {
    let snapshot = navigator.snapshot().await;
    assert_eq!(snapshot.pending.len() + snapshot.history.len(), catalog_len);

    let pending: HashSet<_> = snapshot.pending.iter().collect();
    let history: HashSet<_> = snapshot.history.iter().collect();
    assert_eq!(pending.len(), snapshot.pending.len(), "duplicate in pending");
    assert_eq!(history.len(), snapshot.history.len(), "duplicate in history");
    assert!(pending.is_disjoint(&history));

    let numbers: HashSet<u8> = snapshot.slots.iter().map(|s| s.slot.number).collect();
    assert_eq!(numbers.len(), 3, "roles must map to distinct slots");
    let roles: HashSet<SlotRole> = snapshot.slots.iter().map(|s| s.role).collect();
    assert_eq!(roles.len(), 3);

    let binding = |role: SlotRole| {
        snapshot
            .slots
            .iter()
            .find(|s| s.role == role)
            .and_then(|s| s.slot.track_id.clone())
    };
    let history = &snapshot.history;
    assert_eq!(binding(SlotRole::Current), history.last().cloned());
    assert_eq!(binding(SlotRole::Next), snapshot.pending.last().cloned());
    let previous = history.len().checked_sub(2).and_then(|i| history.get(i)).cloned();
    assert_eq!(binding(SlotRole::Previous), previous);
}

#[tokio::test]
async fn five_track_scenario() {
    let harness = Harness::new();
    let navigator = harness.navigator(&["A", "B", "C", "D", "E"]).await;

    assert_eq!(navigator.start().await.unwrap(), id("E"));
    assert_eq!(navigator.history().await, ids(&["E"]));
    assert_eq!(navigator.pending().await, ids(&["A", "B", "C", "D"]));
    assert_eq!(navigator.slot_binding(SlotRole::Next).await, Some(id("D")));
    assert_eq!(navigator.slot_binding(SlotRole::Previous).await, None);

    assert_eq!(navigator.next().await.unwrap(), NavigationOutcome::Navigated(id("D")));
    assert_eq!(navigator.history().await, ids(&["E", "D"]));
    assert_eq!(navigator.pending().await, ids(&["A", "B", "C"]));
    assert_eq!(navigator.slot_binding(SlotRole::Current).await, Some(id("D")));
    assert_eq!(navigator.slot_binding(SlotRole::Next).await, Some(id("C")));
    assert_eq!(navigator.slot_binding(SlotRole::Previous).await, Some(id("E")));

    assert_eq!(navigator.previous().await.unwrap(), NavigationOutcome::Navigated(id("E")));
    assert_eq!(navigator.history().await, ids(&["E"]));
    assert_eq!(navigator.pending().await, ids(&["A", "B", "C", "D"]));
    assert_eq!(navigator.slot_binding(SlotRole::Next).await, Some(id("D")));

    assert_eq!(harness.controller.played_ids(), vec!["E", "D", "E"]);
    navigator.close().await.unwrap();
}

#[tokio::test]
async fn construction_binds_and_prefetches_the_first_two_tracks() {
    let harness = Harness::new();
    let navigator = harness.navigator(&["A", "B", "C"]).await;

    assert!(navigator.current_track().await.is_none());
    assert_eq!(navigator.slot_binding(SlotRole::Current).await, Some(id("C")));
    assert_eq!(navigator.slot_binding(SlotRole::Next).await, Some(id("B")));
    assert_eq!(navigator.slot_binding(SlotRole::Previous).await, None);

    let current = navigator.wait_for_prefetch(SlotRole::Current).await.expect("CURRENT was scheduled");
    assert!(matches!(current, Ok(MaterializeOutcome::Ready { .. })));
    let next = navigator.wait_for_prefetch(SlotRole::Next).await.expect("NEXT was scheduled");
    assert!(matches!(next, Ok(MaterializeOutcome::Ready { .. })));
    assert_eq!(harness.fetcher.fetch_count("C"), 1);
    assert_eq!(harness.fetcher.fetch_count("B"), 1);
    assert_eq!(harness.fetcher.fetch_count("A"), 0);

    // Starting plays the prefetched content.
    assert_eq!(navigator.start().await.unwrap(), id("C"));
    assert_eq!(harness.controller.played_ids(), vec!["C"]);
    assert_eq!(harness.fetcher.fetch_count("C"), 1);
    assert_eq!(harness.fetcher.fetch_count("B"), 1);
}

#[tokio::test]
async fn start_joins_the_worker_started_at_construction() {
    let harness = Harness::new();
    harness.fetcher.close_gate("C");
    let navigator = harness.navigator(&["A", "B", "C"]).await;

    let fetcher = Arc::clone(&harness.fetcher);
    eventually(move || fetcher.fetch_count("C") == 1).await;

    let (started, _) = tokio::join!(navigator.start(), async {
        tokio::task::yield_now().await;
        harness.fetcher.open_gate("C");
    });
    assert_eq!(started.unwrap(), id("C"));
    assert_eq!(harness.fetcher.fetch_count("C"), 1);
}

#[tokio::test]
async fn last_catalog_entry_plays_first() {
    let harness = Harness::new();
    let navigator = harness.navigator(&["first", "middle", "last"]).await;

    navigator.start().await.unwrap();
    let current = navigator.current_track().await.unwrap();
    assert_eq!(current.id, id("last"));
    assert_eq!(current.title, "Title last");
}

#[tokio::test]
async fn previous_with_single_history_changes_nothing() {
    let harness = Harness::new();
    let navigator = harness.navigator(&["A", "B", "C", "D", "E"]).await;
    navigator.start().await.unwrap();
    navigator.wait_for_prefetch(SlotRole::Next).await;

    let before = navigator.snapshot().await;
    assert_eq!(navigator.previous().await.unwrap(), NavigationOutcome::BoundaryReached);
    let after = navigator.snapshot().await;

    assert_eq!(before, after);
    assert_eq!(harness.controller.played_ids(), vec!["E"]);
}

#[tokio::test]
async fn next_with_empty_pending_changes_nothing() {
    let harness = Harness::new();
    let navigator = harness.navigator(&["only"]).await;
    navigator.start().await.unwrap();

    assert!(navigator.pending().await.is_empty());
    assert_eq!(navigator.slot_binding(SlotRole::Next).await, None);

    let before = navigator.snapshot().await;
    assert_eq!(navigator.next().await.unwrap(), NavigationOutcome::BoundaryReached);
    assert_eq!(navigator.snapshot().await, before);
}

#[tokio::test]
async fn queue_invariants_hold_across_a_walk() {
    let tracks = ["t0", "t1", "t2", "t3", "t4", "t5"];
    let harness = Harness::new();
    let navigator = harness.navigator(&tracks).await;

    navigator.start().await.unwrap();
    assert_queue_consistent(&navigator, tracks.len()).await;

    // Forward-heavy walk that also hits both boundaries.
    let steps = "nnpnppppnnnnnnnpnpnn";
    for step in steps.chars() {
        match step {
            'n' => navigator.next().await.unwrap(),
            _ => navigator.previous().await.unwrap(),
        };
        assert_queue_consistent(&navigator, tracks.len()).await;
    }

    navigator.close().await.unwrap();
}

#[tokio::test]
async fn next_then_previous_restores_bindings() {
    let harness = Harness::new();
    let navigator = harness.navigator(&["A", "B", "C", "D", "E"]).await;
    navigator.start().await.unwrap();
    navigator.next().await.unwrap();
    navigator.next().await.unwrap();

    let current = navigator.slot_binding(SlotRole::Current).await;
    let next = navigator.slot_binding(SlotRole::Next).await;
    let previous = navigator.slot_binding(SlotRole::Previous).await;
    assert_eq!(current, Some(id("C")));

    navigator.next().await.unwrap();
    navigator.previous().await.unwrap();

    assert_eq!(navigator.slot_binding(SlotRole::Current).await, current);
    assert_eq!(navigator.slot_binding(SlotRole::Next).await, next);
    assert_eq!(navigator.slot_binding(SlotRole::Previous).await, previous);
}

#[tokio::test]
async fn rotation_reuses_materialized_slots() {
    let harness = Harness::new();
    let navigator = harness.navigator(&["A", "B", "C", "D", "E"]).await;
    navigator.start().await.unwrap();
    navigator.wait_for_prefetch(SlotRole::Next).await;

    navigator.next().await.unwrap();
    navigator.previous().await.unwrap();

    assert_eq!(harness.fetcher.fetch_count("E"), 1);
    assert_eq!(harness.fetcher.fetch_count("D"), 1);
}

#[tokio::test]
async fn played_handle_points_at_written_bytes() {
    let harness = Harness::new();
    let navigator = harness.navigator(&["A", "B"]).await;
    navigator.start().await.unwrap();

    let played = harness.controller.played();
    let path = &played[0].path;
    assert!(path.starts_with(BUFFER_ROOT));
    assert_eq!(harness.fs.file(path), Some(audio_body("B")));
    assert!(harness
        .loader
        .loads()
        .iter()
        .any(|(loaded, bytes)| loaded == path && *bytes == audio_body("B")));
}

#[tokio::test]
async fn artwork_is_stored_next_to_audio() {
    let harness = Harness::new();
    harness.source.with_artwork("B");
    let navigator = harness.navigator(&["A", "B"]).await;
    navigator.start().await.unwrap();

    let artwork = harness.controller.played()[0].artwork.clone().expect("artwork path");
    assert_eq!(harness.fs.file(&artwork), Some(b"art-B".to_vec()));
}

#[tokio::test]
async fn next_failure_does_not_block_current() {
    let harness = Harness::new();
    harness
        .fetcher
        .fail_with("D", BridgeError::Network("connection reset".to_string()));
    let navigator = harness.navigator(&["A", "B", "C", "D", "E"]).await;

    assert_eq!(navigator.start().await.unwrap(), id("E"));
    assert_eq!(harness.controller.played_ids(), vec!["E"]);

    let result = navigator.wait_for_prefetch(SlotRole::Next).await.expect("NEXT was scheduled");
    assert!(matches!(result, Err(PlaybackError::NetworkFetch { .. })));
    let next = navigator.slot_snapshot(SlotRole::Next).await;
    assert!(next.stale);
    assert!(next.last_error.is_some());
    assert_eq!(navigator.is_playing().await.unwrap(), Some(true));

    // Landing on the failed track retries it and surfaces the failure.
    let attempts = harness.fetcher.fetch_count("D");
    let error = navigator.next().await.unwrap_err();
    assert!(matches!(error, PlaybackError::NetworkFetch { .. }));
    assert_eq!(harness.fetcher.fetch_count("D"), attempts + 1);

    harness.fetcher.clear_failure("D");
    assert_eq!(navigator.restart().await.unwrap(), id("D"));
    assert_eq!(harness.controller.played_ids(), vec!["E", "D"]);
}

#[tokio::test]
async fn certificate_failures_keep_their_category() {
    let harness = Harness::new();
    harness
        .fetcher
        .fail_with("B", BridgeError::Certificate("self-signed".to_string()));
    let navigator = harness.navigator(&["A", "B"]).await;

    let error = navigator.start().await.unwrap_err();
    assert!(matches!(error, PlaybackError::Certificate { .. }));
    assert!(error.is_network_error());
}

#[tokio::test]
async fn auth_failure_prevents_start() {
    let harness = Harness::new();
    harness.source.deny("E");
    let navigator = harness.navigator(&["A", "B", "C", "D", "E"]).await;

    let error = navigator.start().await.unwrap_err();
    assert!(matches!(error, PlaybackError::Auth { .. }));
    assert!(harness.controller.played().is_empty());
    assert_eq!(navigator.is_playing().await.unwrap(), None);
}

#[tokio::test]
async fn integrity_mismatch_fails_current() {
    let harness = Harness::new();
    let good = hex::encode(Sha256::digest(audio_body("B")));
    let catalog = TrackCatalog::from_tracks(vec![
        Track::new("A", "A").with_content_hash("00".repeat(32)),
        Track::new("B", "B").with_content_hash(good.to_uppercase()),
    ]);
    let navigator = QueueNavigator::new(catalog, harness.core_config(), PrefetchConfig::default())
        .await
        .unwrap();

    assert_eq!(navigator.start().await.unwrap(), id("B"));

    let error = navigator.next().await.unwrap_err();
    match error {
        PlaybackError::NetworkFetch { message, .. } => assert!(message.contains("hash mismatch")),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn lifecycle_errors_are_explicit() {
    let harness = Harness::new();
    let navigator = harness.navigator(&["A", "B"]).await;

    assert!(navigator.current_track().await.is_none());
    assert_eq!(navigator.is_playing().await.unwrap(), None);
    assert!(matches!(navigator.next().await, Err(PlaybackError::InvalidState(_))));
    assert!(matches!(navigator.previous().await, Err(PlaybackError::InvalidState(_))));
    assert!(matches!(navigator.restart().await, Err(PlaybackError::InvalidState(_))));

    navigator.start().await.unwrap();
    assert!(matches!(navigator.start().await, Err(PlaybackError::InvalidState(_))));
}

#[tokio::test]
async fn empty_catalog_is_rejected() {
    let harness = Harness::new();
    let result = QueueNavigator::new(
        TrackCatalog::from_tracks(Vec::new()),
        harness.core_config(),
        PrefetchConfig::default(),
    )
    .await;
    assert!(matches!(result, Err(PlaybackError::Config(_))));
}

#[tokio::test]
async fn restart_replays_without_refetching() {
    let harness = Harness::new();
    let navigator = harness.navigator(&["A", "B"]).await;
    navigator.start().await.unwrap();
    let first_session = harness.controller.last_session().unwrap();

    assert_eq!(navigator.restart().await.unwrap(), id("B"));
    assert_eq!(harness.controller.played_ids(), vec!["B", "B"]);
    assert_eq!(harness.fetcher.fetch_count("B"), 1);
    assert!(harness.controller.stopped().contains(&first_session));
}

#[tokio::test]
async fn toggle_starts_pauses_and_resumes() {
    let harness = Harness::new();
    let navigator = harness.navigator(&["A", "B"]).await;

    assert_eq!(
        navigator.toggle_play_pause().await.unwrap(),
        PlaybackToggle::Started(id("B"))
    );
    assert_eq!(navigator.is_playing().await.unwrap(), Some(true));

    assert_eq!(navigator.toggle_play_pause().await.unwrap(), PlaybackToggle::Paused);
    assert_eq!(navigator.is_playing().await.unwrap(), Some(false));

    assert_eq!(navigator.toggle_play_pause().await.unwrap(), PlaybackToggle::Resumed);
    assert_eq!(navigator.is_playing().await.unwrap(), Some(true));
}

#[tokio::test]
async fn end_of_track_advances_the_queue() {
    let harness = Harness::new();
    let navigator = Arc::new(harness.navigator(&["A", "B", "C"]).await);
    assert!(navigator.spawn_end_of_track_listener().is_some());
    assert!(navigator.spawn_end_of_track_listener().is_none());

    navigator.start().await.unwrap();
    let session = harness.controller.last_session().unwrap();
    assert!(harness.controller.finish(session));

    let controller = Arc::clone(&harness.controller);
    eventually(move || controller.played_ids().len() == 2).await;
    assert_eq!(harness.controller.played_ids(), vec!["C", "B"]);
    assert_eq!(navigator.history().await, ids(&["C", "B"]));

    navigator.close().await.unwrap();
}

#[tokio::test]
async fn stale_end_of_track_is_ignored() {
    let harness = Harness::new();
    let navigator = harness.navigator(&["A", "B", "C"]).await;
    navigator.start().await.unwrap();
    let old_session = harness.controller.last_session().unwrap();

    navigator.next().await.unwrap();
    assert_eq!(navigator.handle_end_of_track(old_session).await.unwrap(), None);
    assert_eq!(navigator.history().await, ids(&["C", "B"]));

    let current_session = harness.controller.last_session().unwrap();
    assert_eq!(
        navigator.handle_end_of_track(current_session).await.unwrap(),
        Some(NavigationOutcome::Navigated(id("A")))
    );

    // Finishing the last track runs into the end of the queue.
    let last_session = harness.controller.last_session().unwrap();
    assert_eq!(
        navigator.handle_end_of_track(last_session).await.unwrap(),
        Some(NavigationOutcome::BoundaryReached)
    );
    assert_eq!(navigator.is_playing().await.unwrap(), None);
}

#[tokio::test]
async fn close_is_idempotent_and_releases_storage() {
    let harness = Harness::new();
    let navigator = harness.navigator(&["A", "B", "C", "D", "E"]).await;
    navigator.start().await.unwrap();
    navigator.next().await.unwrap();
    navigator.wait_for_prefetch(SlotRole::Next).await;
    assert!(!harness.fs.entries_under(BUFFER_ROOT).is_empty());

    navigator.close().await.unwrap();
    assert!(harness.fs.entries_under(BUFFER_ROOT).is_empty());
    assert!(harness.controller.stopped().contains(&harness.controller.last_session().unwrap()));

    navigator.close().await.unwrap();
    assert!(harness.fs.entries_under(BUFFER_ROOT).is_empty());

    assert!(matches!(navigator.next().await, Err(PlaybackError::InvalidState(_))));
    assert!(matches!(navigator.toggle_play_pause().await, Err(PlaybackError::InvalidState(_))));
    assert!(navigator.is_closed().await);
}

#[tokio::test]
async fn close_cancels_in_flight_prefetch() {
    let harness = Harness::new();
    harness.fetcher.close_gate("D");
    let navigator = harness.navigator(&["A", "B", "C", "D", "E"]).await;
    navigator.start().await.unwrap();

    let fetcher = Arc::clone(&harness.fetcher);
    eventually(move || fetcher.fetch_count("D") == 1).await;

    navigator.close().await.unwrap();
    assert!(harness.fs.entries_under(BUFFER_ROOT).is_empty());

    harness.fetcher.open_gate("D");
    tokio::task::yield_now().await;
    assert!(harness.fs.entries_under(BUFFER_ROOT).is_empty());
}

#[tokio::test]
async fn close_interrupts_a_start_waiting_on_current() {
    let harness = Harness::new();
    harness.fetcher.close_gate("E");
    let navigator = harness.navigator(&["A", "B", "C", "D", "E"]).await;

    let outcome = tokio::time::timeout(Duration::from_secs(5), async {
        tokio::join!(navigator.start(), async {
            let fetcher = Arc::clone(&harness.fetcher);
            eventually(move || fetcher.fetch_count("E") == 1).await;
            navigator.close().await
        })
    })
    .await
    .expect("close must not wait for a hung fetch");

    let (started, closed) = outcome;
    assert!(matches!(started, Err(PlaybackError::InvalidState(_))));
    closed.unwrap();
    assert!(harness.controller.played().is_empty());
    assert!(harness.fs.entries_under(BUFFER_ROOT).is_empty());
    assert!(matches!(navigator.start().await, Err(PlaybackError::InvalidState(_))));
}

#[tokio::test]
async fn waiting_for_prefetch_keeps_a_single_worker_per_slot() {
    let harness = Harness::new();
    harness.fetcher.close_gate("D");
    let navigator = harness.navigator(&["A", "B", "C", "D", "E"]).await;
    navigator.start().await.unwrap();

    let (waited, restarted) = tokio::join!(navigator.wait_for_prefetch(SlotRole::Next), async {
        let fetcher = Arc::clone(&harness.fetcher);
        eventually(move || fetcher.fetch_count("D") == 1).await;
        let restarted = navigator.restart().await;
        harness.fetcher.open_gate("D");
        restarted
    });

    assert_eq!(restarted.unwrap(), id("E"));
    assert!(matches!(waited, Some(Ok(MaterializeOutcome::Ready { .. }))));
    assert_eq!(harness.fetcher.fetch_count("D"), 1);
    assert!(navigator.slot_snapshot(SlotRole::Next).await.ready);
}

#[tokio::test]
async fn queries_are_answered_while_the_controller_is_slow() {
    let harness = Harness::new();
    let navigator = harness.navigator(&["A", "B"]).await;
    navigator.start().await.unwrap();
    harness.controller.hold_status();

    let (playing, current) = tokio::time::timeout(Duration::from_secs(5), async {
        tokio::join!(navigator.is_playing(), async {
            tokio::task::yield_now().await;
            let current = navigator.current_track().await;
            let _ = navigator.snapshot().await;
            harness.controller.release_status();
            current
        })
    })
    .await
    .expect("queries must not wait on the controller");

    assert_eq!(playing.unwrap(), Some(true));
    assert_eq!(current.unwrap().id, id("B"));
}

#[tokio::test]
async fn close_attempts_every_slot_when_one_fails() {
    let harness = Harness::new();
    let navigator = harness.navigator(&["A", "B", "C"]).await;
    navigator.start().await.unwrap();
    navigator.wait_for_prefetch(SlotRole::Next).await;
    harness.fs.fail_delete(slot_dir(1));

    let error = navigator.close().await.unwrap_err();
    assert!(matches!(error, PlaybackError::Storage(_)));
    assert!(harness.fs.entries_under(slot_dir(2)).is_empty());

    // Already closed.
    navigator.close().await.unwrap();
}

#[tokio::test]
async fn navigation_publishes_queue_events() {
    let harness = Harness::new();
    let mut events = harness.events.subscribe();
    let navigator = harness.navigator(&["A", "B"]).await;

    navigator.start().await.unwrap();
    navigator.next().await.unwrap();
    navigator.next().await.unwrap();

    let mut queue_events = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let CoreEvent::Queue(event) = event {
            queue_events.push(event);
        }
    }

    assert_eq!(
        queue_events,
        vec![
            QueueEvent::Started {
                track_id: "B".to_string(),
                pending: 1,
                history: 1,
            },
            QueueEvent::Advanced {
                track_id: "A".to_string(),
                pending: 0,
                history: 2,
            },
            QueueEvent::BoundaryReached {
                direction: "next".to_string(),
            },
        ]
    );
}
