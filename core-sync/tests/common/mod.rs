//! Shared fixtures for the sync engine integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::{
    ExternalTrack, FixedClock, PlatformClient, PlatformKind, PlatformPlaylist, SpotifyArtist,
    SpotifyTrack,
};
use chrono::{TimeZone, Utc};
use core_library::models::NewPlaylist;
use core_library::repositories::{PlaylistRepository, SqlitePlaylistRepository};
use core_library::create_test_pool;
use core_runtime::events::EventBus;
use core_sync::{AdapterRegistry, LibraryRepositories, PlaylistSyncService, SyncContext};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

// ============================================================================
// Fake platform
// ============================================================================

/// Remote playlist held by the fake
#[derive(Clone)]
pub struct RemotePlaylist {
    pub meta: PlatformPlaylist,
    pub tracks: Vec<SpotifyTrack>,
}

/// Batch call received by the fake
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchCall {
    Add(String, Vec<String>),
    Remove(String, Vec<String>),
}

/// In-memory Spotify-like platform
pub struct FakePlatform {
    authenticated: AtomicBool,
    accept_auth: AtomicBool,
    fail_fetch: AtomicBool,
    fail_batches: AtomicBool,
    playlists: Mutex<HashMap<String, RemotePlaylist>>,
    catalog: Mutex<Vec<SpotifyTrack>>,
    calls: Mutex<Vec<BatchCall>>,
    exports: AtomicUsize,
    /// When set, `get_playlist_tracks` signals `fetch_started` and waits
    gated: AtomicBool,
    pub fetch_started: Notify,
    pub release_fetch: Notify,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self {
            authenticated: AtomicBool::new(true),
            accept_auth: AtomicBool::new(true),
            fail_fetch: AtomicBool::new(false),
            fail_batches: AtomicBool::new(false),
            playlists: Mutex::new(HashMap::new()),
            catalog: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            exports: AtomicUsize::new(0),
            gated: AtomicBool::new(false),
            fetch_started: Notify::new(),
            release_fetch: Notify::new(),
        }
    }

    /// Start signed out; `authenticate` succeeds only if `accept` is set
    pub fn signed_out(self, accept: bool) -> Self {
        self.authenticated.store(false, Ordering::SeqCst);
        self.accept_auth.store(accept, Ordering::SeqCst);
        self
    }

    pub fn add_playlist(&self, id: &str, name: &str, is_personal: bool, tracks: Vec<SpotifyTrack>) {
        for track in &tracks {
            self.add_to_catalog(track.clone());
        }
        let meta = PlatformPlaylist {
            id: id.to_string(),
            name: name.to_string(),
            description: None,
            is_personal,
            track_count: Some(tracks.len() as u32),
        };
        self.playlists
            .lock()
            .unwrap()
            .insert(id.to_string(), RemotePlaylist { meta, tracks });
    }

    pub fn add_to_catalog(&self, track: SpotifyTrack) {
        let mut catalog = self.catalog.lock().unwrap();
        if !catalog.iter().any(|t| t.id == track.id) {
            catalog.push(track);
        }
    }

    /// Append a track remotely, as another client would
    pub fn push_remote(&self, playlist_id: &str, track: SpotifyTrack) {
        self.add_to_catalog(track.clone());
        if let Some(playlist) = self.playlists.lock().unwrap().get_mut(playlist_id) {
            playlist.tracks.push(track);
        }
    }

    /// Remove a track remotely, as another client would
    pub fn drop_remote(&self, playlist_id: &str, track_id: &str) {
        if let Some(playlist) = self.playlists.lock().unwrap().get_mut(playlist_id) {
            playlist.tracks.retain(|t| t.id != track_id);
        }
    }

    pub fn remote_ids(&self, playlist_id: &str) -> Vec<String> {
        self.playlists
            .lock()
            .unwrap()
            .get(playlist_id)
            .map(|p| p.tracks.iter().map(|t| t.id.clone()).collect())
            .unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<BatchCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn set_fail_fetch(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_batches(&self, fail: bool) {
        self.fail_batches.store(fail, Ordering::SeqCst);
    }

    pub fn set_gated(&self, gated: bool) {
        self.gated.store(gated, Ordering::SeqCst);
    }

    fn find_in_catalog(&self, id: &str) -> Option<SpotifyTrack> {
        self.catalog
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.id == id || t.uri.as_deref() == Some(id) || uri(&t.id) == id)
            .cloned()
    }
}

fn uri(id: &str) -> String {
    format!("spotify:track:{}", id)
}

fn matches_id(track: &SpotifyTrack, ids: &[String]) -> bool {
    ids.iter().any(|id| *id == track.id || *id == uri(&track.id))
}

#[async_trait]
impl PlatformClient for FakePlatform {
    fn platform(&self) -> PlatformKind {
        PlatformKind::Spotify
    }

    async fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }

    async fn authenticate(&self) -> BridgeResult<bool> {
        let accepted = self.accept_auth.load(Ordering::SeqCst);
        self.authenticated.store(accepted, Ordering::SeqCst);
        Ok(accepted)
    }

    async fn get_all_playlists(&self) -> BridgeResult<Vec<PlatformPlaylist>> {
        let mut all: Vec<_> = self
            .playlists
            .lock()
            .unwrap()
            .values()
            .map(|p| p.meta.clone())
            .collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all)
    }

    async fn get_playlist_tracks(&self, playlist_id: &str) -> BridgeResult<Vec<ExternalTrack>> {
        if self.gated.load(Ordering::SeqCst) {
            self.fetch_started.notify_one();
            self.release_fetch.notified().await;
        }

        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(BridgeError::OperationFailed("503 Service Unavailable".to_string()));
        }

        self.playlists
            .lock()
            .unwrap()
            .get(playlist_id)
            .map(|p| p.tracks.iter().cloned().map(ExternalTrack::Spotify).collect())
            .ok_or_else(|| BridgeError::NotFound(playlist_id.to_string()))
    }

    async fn import_playlist_to_local(
        &self,
        playlist_id: &str,
    ) -> BridgeResult<(Vec<ExternalTrack>, PlatformPlaylist)> {
        let playlist = self
            .playlists
            .lock()
            .unwrap()
            .get(playlist_id)
            .cloned()
            .ok_or_else(|| BridgeError::NotFound(playlist_id.to_string()))?;
        let tracks = playlist
            .tracks
            .into_iter()
            .map(ExternalTrack::Spotify)
            .collect();
        Ok((tracks, playlist.meta))
    }

    async fn add_tracks_to_playlist(
        &self,
        playlist_id: &str,
        track_ids: &[String],
    ) -> BridgeResult<bool> {
        self.calls
            .lock()
            .unwrap()
            .push(BatchCall::Add(playlist_id.to_string(), track_ids.to_vec()));
        if self.fail_batches.load(Ordering::SeqCst) {
            return Err(BridgeError::OperationFailed("429 Too Many Requests".to_string()));
        }

        let found: Vec<_> = track_ids
            .iter()
            .filter_map(|id| self.find_in_catalog(id))
            .collect();
        let mut playlists = self.playlists.lock().unwrap();
        let Some(playlist) = playlists.get_mut(playlist_id) else {
            return Ok(false);
        };
        playlist.tracks.extend(found);
        Ok(true)
    }

    async fn remove_tracks_from_playlist(
        &self,
        playlist_id: &str,
        track_ids: &[String],
    ) -> BridgeResult<bool> {
        self.calls
            .lock()
            .unwrap()
            .push(BatchCall::Remove(playlist_id.to_string(), track_ids.to_vec()));
        if self.fail_batches.load(Ordering::SeqCst) {
            return Err(BridgeError::OperationFailed("429 Too Many Requests".to_string()));
        }

        let mut playlists = self.playlists.lock().unwrap();
        let Some(playlist) = playlists.get_mut(playlist_id) else {
            return Ok(false);
        };
        playlist.tracks.retain(|t| !matches_id(t, track_ids));
        Ok(true)
    }

    async fn export_tracks_to_playlist(
        &self,
        name: &str,
        track_ids: &[String],
        existing_playlist_id: Option<&str>,
    ) -> BridgeResult<String> {
        let id = match existing_playlist_id {
            Some(id) => id.to_string(),
            None => format!("exported-{}", self.exports.fetch_add(1, Ordering::SeqCst) + 1),
        };
        let tracks = track_ids
            .iter()
            .filter_map(|id| self.find_in_catalog(id))
            .collect();
        self.add_playlist(&id, name, true, tracks);
        Ok(id)
    }

    async fn search_tracks(&self, query: &str, limit: usize) -> BridgeResult<Vec<ExternalTrack>> {
        let query = query.to_lowercase();
        Ok(self
            .catalog
            .lock()
            .unwrap()
            .iter()
            .filter(|t| {
                let artist = t
                    .artists
                    .first()
                    .map(|a| a.name.to_lowercase())
                    .unwrap_or_default();
                query.contains(&t.name.to_lowercase()) && query.contains(&artist)
            })
            .take(limit)
            .cloned()
            .map(ExternalTrack::Spotify)
            .collect())
    }
}

// ============================================================================
// Builders
// ============================================================================

pub fn spotify_track(id: &str, title: &str, artist: &str) -> SpotifyTrack {
    SpotifyTrack {
        id: id.to_string(),
        uri: Some(uri(id)),
        name: title.to_string(),
        artists: vec![SpotifyArtist {
            id: None,
            name: artist.to_string(),
        }],
        album: None,
        duration_ms: Some(200_000),
        added_at: None,
    }
}

pub struct Harness {
    pub pool: SqlitePool,
    pub client: Arc<FakePlatform>,
    pub repositories: LibraryRepositories,
    pub service: Arc<PlaylistSyncService>,
    pub events: EventBus,
    pub collection_id: i64,
}

pub async fn harness(client: FakePlatform) -> Harness {
    harness_with(client, |context| context).await
}

pub async fn harness_with(
    client: FakePlatform,
    configure: impl FnOnce(SyncContext) -> SyncContext,
) -> Harness {
    let pool = create_test_pool().await.unwrap();
    let collection = SqlitePlaylistRepository::new(pool.clone())
        .insert(&NewPlaylist::new("Collection"))
        .await
        .unwrap();

    let client = Arc::new(client);
    let repositories = LibraryRepositories::sqlite(pool.clone());
    let events = EventBus::new(64);
    let service = PlaylistSyncService::with_components(
        client.clone(),
        repositories.clone(),
        Arc::new(AdapterRegistry::default()),
        Arc::new(FixedClock(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap())),
        configure(SyncContext::new(collection.id)),
        events.clone(),
    );

    Harness {
        pool,
        client,
        repositories,
        service: Arc::new(service),
        events,
        collection_id: collection.id,
    }
}

impl Harness {
    pub async fn member_ids(&self, playlist_id: i64) -> Vec<i64> {
        self.repositories
            .playlists
            .get_playlist_tracks(playlist_id)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.track.id)
            .collect()
    }

    pub async fn member_titles(&self, playlist_id: i64) -> Vec<String> {
        self.repositories
            .playlists
            .get_playlist_tracks(playlist_id)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.track.title)
            .collect()
    }
}
