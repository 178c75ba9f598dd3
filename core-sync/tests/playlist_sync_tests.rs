//! Integration tests for playlist sync
//!
//! These tests drive the engine end to end against an in-memory platform:
//! - Import and export of playlists
//! - First sync, snapshot baseline and idempotent re-diffs
//! - Remote and local additions/removals, with user selection
//! - Personal vs read-only remote playlists
//! - Inline errors and the per-playlist in-flight guard

mod common;

use bridge_traits::{ExternalTrack, PlatformKind};
use chrono::Utc;
use common::{harness, harness_with, spotify_track, BatchCall, FakePlatform, Harness};
use core_library::models::{NewPlaylist, NewTrack, TrackPlatformLink};
use core_library::repositories::{
    PlaylistRepository, SqliteSyncSnapshotRepository, SyncSnapshotRepository, TrackRepository,
};
use core_runtime::config::SyncSettings;
use core_runtime::events::{CoreEvent, LibraryEvent, SyncEvent};
use core_sync::{ChangeType, LinkState, SyncError, SyncOutcome};
use std::collections::HashMap;

const REMOTE: &str = "remote-set";

fn platform_with_set(is_personal: bool) -> FakePlatform {
    let client = FakePlatform::new();
    client.add_playlist(
        REMOTE,
        "Sunday Set",
        is_personal,
        vec![
            spotify_track("sp1", "Kerala", "Bonobo"),
            spotify_track("sp3", "Cirrus", "Bonobo"),
        ],
    );
    client
}

/// Import the remote set and store a first snapshot
async fn synced(h: &Harness) -> i64 {
    let summary = h.service.import_playlist(REMOTE, None, None).await.unwrap();
    let outcome = h.service.sync_playlist(summary.playlist_id, true).await.unwrap();
    match outcome {
        SyncOutcome::Applied(result) => assert!(result.snapshot_saved),
        SyncOutcome::Preview(_) => panic!("expected an applied sync"),
    }
    summary.playlist_id
}

// ============================================================================
// Import
// ============================================================================

#[tokio::test]
async fn test_import_playlist_keeps_order_and_fills_collection() {
    let client = FakePlatform::new();
    client.add_playlist(
        REMOTE,
        "Sunday Set",
        true,
        vec![
            spotify_track("sp1", "Kerala", "Bonobo"),
            spotify_track("sp2", "Bad Metadata", ""),
            spotify_track("sp3", "Cirrus", "Bonobo"),
        ],
    );
    let h = harness(client).await;

    let summary = h.service.import_playlist(REMOTE, None, None).await.unwrap();

    assert_eq!(summary.imported, 2);
    assert_eq!(summary.created, 2);
    assert_eq!(summary.warnings.len(), 1);
    assert!(summary.warnings[0].contains("Bad Metadata"));
    assert_eq!(summary.link.platform_id, REMOTE);
    assert!(summary.link.is_personal_playlist);

    let playlist = h
        .repositories
        .playlists
        .find_by_id(summary.playlist_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(playlist.name, "Sunday Set");
    assert_eq!(h.member_titles(summary.playlist_id).await, vec!["Kerala", "Cirrus"]);
    assert_eq!(
        h.member_ids(h.collection_id).await,
        h.member_ids(summary.playlist_id).await
    );
    assert_eq!(h.repositories.tracks.count().await.unwrap(), 2);
    assert_eq!(
        h.service.link_state(summary.playlist_id).await.unwrap(),
        LinkState::LinkedNoSnapshot
    );
}

#[tokio::test]
async fn test_reimport_replaces_playlist_contents() {
    let h = harness(platform_with_set(true)).await;
    let first = h.service.import_playlist(REMOTE, None, None).await.unwrap();

    h.client.drop_remote(REMOTE, "sp1");
    let second = h
        .service
        .import_playlist(REMOTE, None, Some(first.playlist_id))
        .await
        .unwrap();

    assert_eq!(second.playlist_id, first.playlist_id);
    assert_eq!(second.created, 0);
    assert_eq!(h.member_titles(first.playlist_id).await, vec!["Cirrus"]);
    // Tracks and Collection membership survive
    assert_eq!(h.repositories.tracks.count().await.unwrap(), 2);
    assert_eq!(h.member_ids(h.collection_id).await.len(), 2);
}

#[tokio::test]
async fn test_relinking_to_another_remote_starts_over() {
    let h = harness(platform_with_set(true)).await;
    let playlist_id = synced(&h).await;
    h.client.add_playlist(
        "remote-other",
        "Other Set",
        true,
        vec![
            spotify_track("sp2", "Kong", "Bonobo"),
            spotify_track("sp9", "Flashlight", "Bonobo"),
        ],
    );

    h.service
        .import_playlist("remote-other", None, Some(playlist_id))
        .await
        .unwrap();

    assert_eq!(
        h.service.link_state(playlist_id).await.unwrap(),
        LinkState::LinkedNoSnapshot
    );
    let changes = h.service.get_sync_changes(playlist_id).await.unwrap();
    assert!(changes.is_first_sync);
    assert!(changes.platform_removals.is_empty());
    assert!(changes.library_removals.is_empty());

    let outcome = h.service.sync_playlist(playlist_id, true).await.unwrap();
    let SyncOutcome::Applied(result) = outcome else {
        panic!("expected an applied sync");
    };
    assert_eq!(result.library_removed, 0);
    assert!(!h
        .client
        .calls()
        .iter()
        .any(|c| matches!(c, BatchCall::Remove(..))));
    assert_eq!(h.client.remote_ids("remote-other"), vec!["sp2", "sp9"]);
}

#[tokio::test]
async fn test_import_into_unknown_playlist_fails() {
    let h = harness(platform_with_set(true)).await;

    let result = h.service.import_playlist(REMOTE, None, Some(4242)).await;

    assert!(matches!(result, Err(SyncError::NotFound { .. })));
}

#[tokio::test]
async fn test_collection_is_never_an_import_target() {
    let h = harness(platform_with_set(true)).await;
    h.service.import_playlist(REMOTE, None, None).await.unwrap();
    h.client.add_playlist(
        "remote-other",
        "Other Set",
        true,
        vec![spotify_track("sp2", "Kong", "Bonobo")],
    );

    let explicit = h
        .service
        .import_playlist("remote-other", None, Some(h.collection_id))
        .await;
    assert!(matches!(explicit, Err(SyncError::Validation(_))));

    let by_name = h
        .service
        .import_playlist("remote-other", Some("Collection"), None)
        .await
        .unwrap();
    assert_ne!(by_name.playlist_id, h.collection_id);
    assert_eq!(h.member_titles(by_name.playlist_id).await, vec!["Kong"]);

    // The Collection keeps every imported track
    assert_eq!(h.member_ids(h.collection_id).await.len(), 3);

    let again = h
        .service
        .import_playlist("remote-other", Some("Collection"), None)
        .await
        .unwrap();
    assert_eq!(again.playlist_id, by_name.playlist_id);
}

// ============================================================================
// Snapshots and diffing
// ============================================================================

#[tokio::test]
async fn test_first_sync_then_snapshot_round_trip() {
    let h = harness(platform_with_set(true)).await;
    let summary = h.service.import_playlist(REMOTE, None, None).await.unwrap();

    let first = h.service.get_sync_changes(summary.playlist_id).await.unwrap();
    assert!(first.is_first_sync);
    assert!(!first.warnings.is_empty());
    assert_eq!(first.platform_additions.len(), 2);
    assert!(first.platform_additions.iter().all(|c| c.library_id.is_some()));
    assert!(first.library_additions.is_empty());

    h.service.save_sync_snapshot(summary.playlist_id).await.unwrap();
    assert_eq!(
        h.service.link_state(summary.playlist_id).await.unwrap(),
        LinkState::LinkedWithSnapshot
    );

    for _ in 0..2 {
        let changes = h.service.get_sync_changes(summary.playlist_id).await.unwrap();
        assert!(changes.is_empty(), "unexpected changes: {:?}", changes);
        assert!(!changes.is_first_sync);
        assert!(changes.errors.is_empty());
    }
}

#[tokio::test]
async fn test_diff_against_stored_snapshot() {
    let h = harness(FakePlatform::new()).await;
    let tracks = &h.repositories.tracks;
    let playlists = &h.repositories.playlists;

    let one = tracks
        .insert(&NewTrack {
            title: "One".to_string(),
            artist: "Artist".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    let two = tracks
        .insert(&NewTrack {
            title: "Two".to_string(),
            artist: "Artist".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    for (track_id, platform_id) in [(one.id, "p1"), (two.id, "p2")] {
        tracks
            .upsert_platform_link(&TrackPlatformLink {
                track_id,
                platform: PlatformKind::Spotify,
                platform_id: platform_id.to_string(),
                uri: None,
                metadata: serde_json::Value::Null,
                last_linked: Utc::now(),
            })
            .await
            .unwrap();
    }

    let playlist = playlists.insert(&NewPlaylist::new("Example")).await.unwrap();
    playlists.add_track(playlist.id, one.id, Utc::now()).await.unwrap();
    let link = playlists
        .upsert_platform_link(playlist.id, PlatformKind::Spotify, "remote-ex", true, Utc::now())
        .await
        .unwrap();

    h.client.add_playlist(
        "remote-ex",
        "Example",
        true,
        vec![
            spotify_track("p1", "One", "Artist"),
            spotify_track("p3", "Three", "Artist"),
        ],
    );

    let snapshot = format!(
        r#"{{
            "platform_tracks": {{"p1": {{"library_id": {one}}}, "p2": {{"library_id": {two}}}}},
            "library_tracks": {{"{one}": {{"platform_id": "p1"}}, "{two}": {{"platform_id": "p2"}}}}
        }}"#,
        one = one.id,
        two = two.id
    );
    SqliteSyncSnapshotRepository::new(h.pool.clone())
        .replace(link.id, &snapshot, Utc::now())
        .await
        .unwrap();

    let changes = h.service.get_sync_changes(playlist.id).await.unwrap();

    let ids = |list: &[core_sync::SyncChange]| -> Vec<Option<String>> {
        list.iter().map(|c| c.platform_id.clone()).collect()
    };
    assert_eq!(ids(&changes.platform_additions), vec![Some("p3".to_string())]);
    assert_eq!(ids(&changes.platform_removals), vec![Some("p2".to_string())]);
    assert_eq!(changes.platform_removals[0].library_id, Some(two.id));
    assert!(changes.library_additions.is_empty());
    assert_eq!(changes.library_removals.len(), 1);
    assert_eq!(changes.library_removals[0].library_id, Some(two.id));
    assert_eq!(changes.library_removals[0].platform_id.as_deref(), Some("p2"));
    assert_eq!(changes.library_removals[0].title, "Two");
}

#[tokio::test]
async fn test_remote_addition_is_imported() {
    let h = harness(platform_with_set(true)).await;
    let playlist_id = synced(&h).await;

    h.client.push_remote(REMOTE, spotify_track("sp4", "Kong", "Bonobo"));

    let changes = h.service.get_sync_changes(playlist_id).await.unwrap();
    assert_eq!(changes.total(), 1);
    assert_eq!(changes.platform_additions.len(), 1);
    let addition = &changes.platform_additions[0];
    assert_eq!(addition.change_type, ChangeType::PlatformAddition);
    assert_eq!(addition.platform_id.as_deref(), Some("sp4"));
    assert_eq!(addition.library_id, None);

    let result = h
        .service
        .apply_sync_changes(playlist_id, &HashMap::new())
        .await
        .unwrap();

    assert!(result.success());
    assert_eq!(result.platform_added, 1);
    assert!(result.snapshot_saved);
    assert_eq!(
        h.member_titles(playlist_id).await,
        vec!["Kerala", "Cirrus", "Kong"]
    );
    assert_eq!(h.member_ids(h.collection_id).await.len(), 3);
    assert!(h.service.get_sync_changes(playlist_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_remote_removal_keeps_track_row() {
    let h = harness(platform_with_set(true)).await;
    let playlist_id = synced(&h).await;
    let kerala = h
        .repositories
        .tracks
        .find_by_platform_id(PlatformKind::Spotify, "sp1")
        .await
        .unwrap()
        .unwrap();

    h.client.drop_remote(REMOTE, "sp1");

    let changes = h.service.get_sync_changes(playlist_id).await.unwrap();
    assert_eq!(changes.total(), 1);
    assert_eq!(changes.platform_removals[0].library_id, Some(kerala.id));
    assert_eq!(changes.platform_removals[0].title, "Kerala");

    let result = h
        .service
        .apply_sync_changes(playlist_id, &HashMap::new())
        .await
        .unwrap();

    assert_eq!(result.platform_removed, 1);
    assert_eq!(h.member_titles(playlist_id).await, vec!["Cirrus"]);
    assert!(h
        .repositories
        .tracks
        .find_by_id(kerala.id)
        .await
        .unwrap()
        .is_some());
    assert_eq!(h.repositories.tracks.count().await.unwrap(), 2);
    assert!(h
        .repositories
        .playlists
        .contains_track(h.collection_id, kerala.id)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_selection_skips_deselected_changes() {
    let h = harness(platform_with_set(true)).await;
    let playlist_id = synced(&h).await;

    h.client.drop_remote(REMOTE, "sp1");
    h.client.drop_remote(REMOTE, "sp3");

    let changes = h.service.get_sync_changes(playlist_id).await.unwrap();
    assert_eq!(changes.platform_removals.len(), 2);
    let kept = &changes.platform_removals[0];
    let selection = HashMap::from([(kept.id.clone(), false)]);

    let result = h
        .service
        .apply_sync_changes(playlist_id, &selection)
        .await
        .unwrap();

    assert_eq!(result.platform_removed, 1);
    assert_eq!(h.member_ids(playlist_id).await, vec![kept.library_id.unwrap()]);
}

#[tokio::test]
async fn test_apply_requires_a_preview() {
    let h = harness(platform_with_set(true)).await;
    let playlist_id = synced(&h).await;

    let result = h.service.apply_sync_changes(playlist_id, &HashMap::new()).await;
    assert!(matches!(result, Err(SyncError::NoPendingChanges { .. })));

    h.service.get_sync_changes(playlist_id).await.unwrap();
    h.service
        .apply_sync_changes(playlist_id, &HashMap::new())
        .await
        .unwrap();

    // The preview is consumed by the first apply
    let again = h.service.apply_sync_changes(playlist_id, &HashMap::new()).await;
    assert!(matches!(again, Err(SyncError::NoPendingChanges { .. })));
}

#[tokio::test]
async fn test_unlinked_playlist_is_not_found() {
    let h = harness(FakePlatform::new()).await;

    let result = h.service.get_sync_changes(h.collection_id).await;

    assert!(matches!(result, Err(SyncError::NotFound { .. })));
    assert_eq!(
        h.service.link_state(h.collection_id).await.unwrap(),
        LinkState::Unlinked
    );
}

// ============================================================================
// Library side
// ============================================================================

#[tokio::test]
async fn test_local_addition_is_pushed_in_one_batch() {
    let h = harness(platform_with_set(true)).await;
    let playlist_id = synced(&h).await;

    let night_owl = spotify_track("sp9", "Night Owl", "Galimatias");
    let lotus = spotify_track("sp10", "Lotus", "Galimatias");
    for track in [&night_owl, &lotus] {
        h.client.add_to_catalog(track.clone());
        let local = h
            .service
            .import_track(&ExternalTrack::Spotify(track.clone()))
            .await
            .unwrap();
        h.repositories
            .playlists
            .add_track(playlist_id, local.id, Utc::now())
            .await
            .unwrap();
    }

    let changes = h.service.get_sync_changes(playlist_id).await.unwrap();
    assert_eq!(changes.total(), 2);
    assert_eq!(changes.library_additions.len(), 2);
    assert_eq!(
        changes.library_additions[0].uri.as_deref(),
        Some("spotify:track:sp9")
    );

    let result = h
        .service
        .apply_sync_changes(playlist_id, &HashMap::new())
        .await
        .unwrap();

    assert!(result.success());
    assert_eq!(result.library_added, 2);
    assert_eq!(
        h.client.calls(),
        vec![BatchCall::Add(
            REMOTE.to_string(),
            vec![
                "spotify:track:sp9".to_string(),
                "spotify:track:sp10".to_string()
            ]
        )]
    );
    assert_eq!(h.client.remote_ids(REMOTE), vec!["sp1", "sp3", "sp9", "sp10"]);
    assert!(h.service.get_sync_changes(playlist_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_local_removal_is_pushed() {
    let h = harness(platform_with_set(true)).await;
    let playlist_id = synced(&h).await;
    let kerala = h
        .repositories
        .tracks
        .find_by_platform_id(PlatformKind::Spotify, "sp1")
        .await
        .unwrap()
        .unwrap();

    h.repositories
        .playlists
        .remove_track(playlist_id, kerala.id)
        .await
        .unwrap();

    let changes = h.service.get_sync_changes(playlist_id).await.unwrap();
    assert_eq!(changes.total(), 1);
    assert_eq!(changes.library_removals[0].library_id, Some(kerala.id));

    let result = h
        .service
        .apply_sync_changes(playlist_id, &HashMap::new())
        .await
        .unwrap();

    assert_eq!(result.library_removed, 1);
    assert_eq!(
        h.client.calls(),
        vec![BatchCall::Remove(
            REMOTE.to_string(),
            vec!["spotify:track:sp1".to_string()]
        )]
    );
    assert_eq!(h.client.remote_ids(REMOTE), vec!["sp3"]);
}

#[tokio::test]
async fn test_read_only_playlist_never_gets_library_changes() {
    let h = harness(platform_with_set(false)).await;
    let playlist_id = synced(&h).await;

    let kerala = h
        .repositories
        .tracks
        .find_by_platform_id(PlatformKind::Spotify, "sp1")
        .await
        .unwrap()
        .unwrap();
    h.repositories
        .playlists
        .remove_track(playlist_id, kerala.id)
        .await
        .unwrap();

    let extra = h
        .service
        .import_track(&ExternalTrack::Spotify(spotify_track("sp9", "Night Owl", "Galimatias")))
        .await
        .unwrap();
    h.repositories
        .playlists
        .add_track(playlist_id, extra.id, Utc::now())
        .await
        .unwrap();

    let changes = h.service.get_sync_changes(playlist_id).await.unwrap();

    assert!(changes.library_additions.is_empty());
    assert!(changes.library_removals.is_empty());
    assert!(changes.is_empty());
    assert!(h.client.calls().is_empty());
}

#[tokio::test]
async fn test_unlinked_local_track_is_skipped_with_warning() {
    let h = harness(platform_with_set(true)).await;
    let playlist_id = synced(&h).await;

    let local_only = h
        .repositories
        .tracks
        .insert(&NewTrack {
            title: "Dubplate".to_string(),
            artist: "Unknown".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    h.repositories
        .playlists
        .add_track(playlist_id, local_only.id, Utc::now())
        .await
        .unwrap();

    let changes = h.service.get_sync_changes(playlist_id).await.unwrap();
    assert_eq!(changes.library_additions.len(), 1);
    assert_eq!(changes.library_additions[0].platform_id, None);

    let result = h
        .service
        .apply_sync_changes(playlist_id, &HashMap::new())
        .await
        .unwrap();

    assert!(result.success());
    assert_eq!(result.library_added, 0);
    assert_eq!(result.warnings.len(), 1);
    assert!(result.warnings[0].contains("Dubplate"));
    assert!(h.client.calls().is_empty());
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_fetch_failure_is_reported_inline() {
    let h = harness(platform_with_set(true)).await;
    let playlist_id = synced(&h).await;

    h.client.set_fail_fetch(true);

    let changes = h.service.get_sync_changes(playlist_id).await.unwrap();
    assert!(changes.is_empty());
    assert_eq!(changes.errors.len(), 1);
    assert!(changes.errors[0].contains("503"));

    match h.service.sync_playlist(playlist_id, true).await.unwrap() {
        SyncOutcome::Applied(result) => {
            assert!(!result.success());
            assert_eq!(result.total_applied(), 0);
        }
        SyncOutcome::Preview(_) => panic!("expected an applied sync"),
    }
}

#[tokio::test]
async fn test_failed_batch_is_one_error() {
    let h = harness(platform_with_set(true)).await;
    let playlist_id = synced(&h).await;

    let extra = h
        .service
        .import_track(&ExternalTrack::Spotify(spotify_track("sp9", "Night Owl", "Galimatias")))
        .await
        .unwrap();
    h.repositories
        .playlists
        .add_track(playlist_id, extra.id, Utc::now())
        .await
        .unwrap();
    h.client.push_remote(REMOTE, spotify_track("sp4", "Kong", "Bonobo"));
    h.client.set_fail_batches(true);

    h.service.get_sync_changes(playlist_id).await.unwrap();
    let result = h
        .service
        .apply_sync_changes(playlist_id, &HashMap::new())
        .await
        .unwrap();

    assert!(!result.success());
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].contains("429"));
    assert_eq!(result.library_added, 0);
    // The remote addition still went through
    assert_eq!(result.platform_added, 1);
    assert!(result.snapshot_saved);
}

#[tokio::test]
async fn test_authentication() {
    let declined = FakePlatform::new().signed_out(false);
    declined.add_playlist(REMOTE, "Sunday Set", true, Vec::new());
    let h = harness(declined).await;

    let result = h.service.import_playlist(REMOTE, None, None).await;
    assert!(matches!(
        result,
        Err(SyncError::NotAuthenticated(PlatformKind::Spotify))
    ));

    let playlist = h
        .repositories
        .playlists
        .insert(&NewPlaylist::new("Linked"))
        .await
        .unwrap();
    h.repositories
        .playlists
        .upsert_platform_link(playlist.id, PlatformKind::Spotify, REMOTE, true, Utc::now())
        .await
        .unwrap();
    let changes = h.service.get_sync_changes(playlist.id).await.unwrap();
    assert_eq!(changes.errors.len(), 1);

    let accepted = FakePlatform::new().signed_out(true);
    accepted.add_playlist(REMOTE, "Sunday Set", true, Vec::new());
    let h = harness(accepted).await;
    assert!(h.service.import_playlist(REMOTE, None, None).await.is_ok());
}

#[tokio::test]
async fn test_overlapping_operations_are_rejected() {
    let h = harness(platform_with_set(true)).await;
    let playlist_id = synced(&h).await;

    h.client.set_gated(true);
    let service = h.service.clone();
    let running = tokio::spawn(async move { service.get_sync_changes(playlist_id).await });

    h.client.fetch_started.notified().await;

    let overlapping = h.service.sync_playlist(playlist_id, true).await;
    assert!(matches!(
        overlapping,
        Err(SyncError::SyncInProgress { playlist_id: id }) if id == playlist_id
    ));
    // Other playlists are not blocked
    assert_eq!(
        h.service.link_state(h.collection_id).await.unwrap(),
        LinkState::Unlinked
    );

    h.client.set_gated(false);
    h.client.release_fetch.notify_one();
    assert!(running.await.unwrap().unwrap().is_empty());

    assert!(h.service.get_sync_changes(playlist_id).await.is_ok());
}

// ============================================================================
// Export
// ============================================================================

#[tokio::test]
async fn test_export_playlist() {
    let h = harness(FakePlatform::new()).await;
    h.client.add_to_catalog(spotify_track("sp1", "Kerala", "Bonobo"));

    let kerala = h
        .service
        .import_track(&ExternalTrack::Spotify(spotify_track("sp1", "Kerala", "Bonobo")))
        .await
        .unwrap();
    let local_only = h
        .repositories
        .tracks
        .insert(&NewTrack {
            title: "Dubplate".to_string(),
            artist: "Unknown".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();

    let playlist = h
        .repositories
        .playlists
        .insert(&NewPlaylist::new("Export Me"))
        .await
        .unwrap();
    for id in [kerala.id, local_only.id] {
        h.repositories
            .playlists
            .add_track(playlist.id, id, Utc::now())
            .await
            .unwrap();
    }

    let summary = h.service.export_playlist(playlist.id, None).await.unwrap();

    assert_eq!(summary.external_playlist_id, "exported-1");
    assert_eq!(summary.exported, 1);
    assert_eq!(summary.warnings.len(), 1);
    assert_eq!(h.client.remote_ids("exported-1"), vec!["sp1"]);
    assert_eq!(
        h.service.link_state(playlist.id).await.unwrap(),
        LinkState::LinkedNoSnapshot
    );

    // A second export updates the same remote playlist
    let again = h.service.export_playlist(playlist.id, None).await.unwrap();
    assert_eq!(again.external_playlist_id, "exported-1");
}

#[tokio::test]
async fn test_export_matches_unlinked_tracks_when_enabled() {
    let h = harness_with(FakePlatform::new(), |context| {
        context.with_settings(SyncSettings::default().with_match_unlinked_on_export(true))
    })
    .await;
    h.client.add_to_catalog(spotify_track("sp7", "Dubplate", "Unknown"));

    let local_only = h
        .repositories
        .tracks
        .insert(&NewTrack {
            title: "Dubplate".to_string(),
            artist: "Unknown".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    let playlist = h
        .repositories
        .playlists
        .insert(&NewPlaylist::new("Export Me"))
        .await
        .unwrap();
    h.repositories
        .playlists
        .add_track(playlist.id, local_only.id, Utc::now())
        .await
        .unwrap();

    let summary = h
        .service
        .export_playlist(playlist.id, Some("Dubs"))
        .await
        .unwrap();

    assert_eq!(summary.exported, 1);
    assert!(summary.warnings.is_empty());
    let linked = h
        .repositories
        .tracks
        .find_by_platform_id(PlatformKind::Spotify, "sp7")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(linked.id, local_only.id);
    let remote = h.service.list_remote_playlists().await.unwrap();
    assert_eq!(remote[0].name, "Dubs");
}

// ============================================================================
// Events
// ============================================================================

#[tokio::test]
async fn test_events_are_emitted() {
    let h = harness(platform_with_set(true)).await;
    let mut events = h.events.subscribe();

    let summary = h.service.import_playlist(REMOTE, None, None).await.unwrap();
    h.service.get_sync_changes(summary.playlist_id).await.unwrap();

    let mut received = Vec::new();
    while let Ok(event) = events.try_recv() {
        received.push(event);
    }

    let imported_tracks = received
        .iter()
        .filter(|e| matches!(e, CoreEvent::Library(LibraryEvent::TrackImported { .. })))
        .count();
    assert_eq!(imported_tracks, 2);
    assert!(received.iter().any(|e| matches!(
        e,
        CoreEvent::Library(LibraryEvent::PlaylistImported { imported: 2, failed: 0, .. })
    )));
    assert!(received.iter().any(|e| matches!(
        e,
        CoreEvent::Sync(SyncEvent::PreviewReady {
            platform_additions: 2,
            has_errors: false,
            ..
        })
    )));
}
