//! # Playlist Sync Service
//!
//! Entry points for one platform: import, export, preview, apply and full
//! sync of linked playlists.
//!
//! ## Link lifecycle
//!
//! ```text
//! Unlinked --import/export--> LinkedNoSnapshot --snapshot saved--> LinkedWithSnapshot
//! ```
//!
//! Once a snapshot exists it is replaced on every apply; there are no other
//! states.
//!
//! ## Concurrency
//!
//! Operations run inline and await every platform and storage call in
//! sequence. Overlapping operations on the same playlist are rejected with
//! [`SyncError::SyncInProgress`]; different playlists may sync in parallel.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let service = PlaylistSyncService::new(client, LibraryRepositories::sqlite(pool), context, events);
//!
//! let preview = service.get_sync_changes(playlist_id).await?;
//! let mut selection = HashMap::new();
//! selection.insert(preview.platform_removals[0].id.clone(), false);
//! let result = service.apply_sync_changes(playlist_id, &selection).await?;
//! ```

use crate::adapters::AdapterRegistry;
use crate::change_applier::ChangeApplier;
use crate::change_computer::ChangeSetComputer;
use crate::changes::{ChangeSet, SyncResult};
use crate::error::{Result, SyncError};
use crate::link_manager::LinkManager;
use crate::snapshot::{SnapshotPersister, SyncSnapshot};
use bridge_traits::{Clock, ExternalTrack, PlatformClient, PlatformKind, PlatformPlaylist, SystemClock};
use core_library::models::{NewPlaylist, Playlist, PlaylistPlatformLink, Track};
use core_library::repositories::{
    AlbumRepository, PlaylistRepository, SqliteAlbumRepository, SqlitePlaylistRepository,
    SqliteSyncSnapshotRepository, SqliteTrackRepository, SyncSnapshotRepository, TrackRepository,
};
use core_runtime::config::SyncSettings;
use core_runtime::events::{CoreEvent, EventBus, LibraryEvent, SyncEvent};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

/// Repository handles used by the engine
#[derive(Clone)]
pub struct LibraryRepositories {
    pub tracks: Arc<dyn TrackRepository>,
    pub albums: Arc<dyn AlbumRepository>,
    pub playlists: Arc<dyn PlaylistRepository>,
    pub snapshots: Arc<dyn SyncSnapshotRepository>,
}

impl LibraryRepositories {
    /// SQLite repositories sharing one pool
    pub fn sqlite(pool: SqlitePool) -> Self {
        Self {
            tracks: Arc::new(SqliteTrackRepository::new(pool.clone())),
            albums: Arc::new(SqliteAlbumRepository::new(pool.clone())),
            playlists: Arc::new(SqlitePlaylistRepository::new(pool.clone())),
            snapshots: Arc::new(SqliteSyncSnapshotRepository::new(pool)),
        }
    }
}

/// State resolved once at startup and passed into every service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncContext {
    /// The playlist holding every imported track
    pub collection_playlist_id: i64,
    pub settings: SyncSettings,
}

impl SyncContext {
    pub fn new(collection_playlist_id: i64) -> Self {
        Self {
            collection_playlist_id,
            settings: SyncSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: SyncSettings) -> Self {
        self.settings = settings;
        self
    }
}

/// Sync state of a playlist on one platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    Unlinked,
    LinkedNoSnapshot,
    LinkedWithSnapshot,
}

/// Result of [`PlaylistSyncService::sync_playlist`]
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// Changes computed and cached for a later apply
    Preview(ChangeSet),
    /// Every change was applied
    Applied(SyncResult),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    pub playlist_id: i64,
    pub link: PlaylistPlatformLink,
    /// Tracks now in the playlist
    pub imported: usize,
    /// Of those, tracks that did not exist locally before
    pub created: usize,
    /// One entry per track that could not be imported
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub playlist_id: i64,
    pub external_playlist_id: String,
    pub exported: usize,
    /// One entry per local track without a platform identity
    pub warnings: Vec<String>,
}

/// Marks a playlist busy until dropped
struct InFlight {
    playlists: Arc<StdMutex<HashSet<i64>>>,
    playlist_id: i64,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.playlists
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.playlist_id);
    }
}

/// Sync engine for one platform
pub struct PlaylistSyncService {
    client: Arc<dyn PlatformClient>,
    context: SyncContext,
    playlists: Arc<dyn PlaylistRepository>,
    link_manager: Arc<LinkManager>,
    computer: ChangeSetComputer,
    applier: ChangeApplier,
    persister: Arc<SnapshotPersister>,
    events: EventBus,
    clock: Arc<dyn Clock>,
    /// Last preview per playlist, consumed by `apply_sync_changes`
    pending: Mutex<HashMap<i64, ChangeSet>>,
    in_flight: Arc<StdMutex<HashSet<i64>>>,
}

impl PlaylistSyncService {
    /// Service with the default adapters and the system clock
    pub fn new(
        client: Arc<dyn PlatformClient>,
        repositories: LibraryRepositories,
        context: SyncContext,
        events: EventBus,
    ) -> Self {
        Self::with_components(
            client,
            repositories,
            Arc::new(AdapterRegistry::default()),
            Arc::new(SystemClock),
            context,
            events,
        )
    }

    pub fn with_components(
        client: Arc<dyn PlatformClient>,
        repositories: LibraryRepositories,
        adapters: Arc<AdapterRegistry>,
        clock: Arc<dyn Clock>,
        context: SyncContext,
        events: EventBus,
    ) -> Self {
        let link_manager = Arc::new(LinkManager::new(
            repositories.tracks.clone(),
            repositories.albums.clone(),
            adapters,
            clock.clone(),
        ));

        let persister = Arc::new(SnapshotPersister::new(
            client.clone(),
            repositories.playlists.clone(),
            repositories.snapshots.clone(),
            link_manager.clone(),
            clock.clone(),
        ));

        let computer = ChangeSetComputer::new(
            client.clone(),
            repositories.playlists.clone(),
            repositories.tracks.clone(),
            link_manager.clone(),
            persister.clone(),
        );

        let applier = ChangeApplier::new(
            client.clone(),
            repositories.playlists.clone(),
            link_manager.clone(),
            persister.clone(),
            clock.clone(),
            context.collection_playlist_id,
        );

        Self {
            client,
            context,
            playlists: repositories.playlists,
            link_manager,
            computer,
            applier,
            persister,
            events,
            clock,
            pending: Mutex::new(HashMap::new()),
            in_flight: Arc::new(StdMutex::new(HashSet::new())),
        }
    }

    pub fn platform(&self) -> PlatformKind {
        self.client.platform()
    }

    pub fn context(&self) -> &SyncContext {
        &self.context
    }

    /// Authenticate once when no session exists
    ///
    /// # Errors
    /// `NotAuthenticated` when the client declines
    pub async fn ensure_authenticated(&self) -> Result<()> {
        if self.client.is_authenticated().await || self.client.authenticate().await? {
            return Ok(());
        }
        Err(SyncError::NotAuthenticated(self.platform()))
    }

    /// Every playlist visible on the platform
    pub async fn list_remote_playlists(&self) -> Result<Vec<PlatformPlaylist>> {
        self.ensure_authenticated().await?;
        Ok(self.client.get_all_playlists().await?)
    }

    pub async fn link_state(&self, playlist_id: i64) -> Result<LinkState> {
        let Some(link) = self
            .playlists
            .get_platform_link(playlist_id, self.platform())
            .await?
        else {
            return Ok(LinkState::Unlinked);
        };

        Ok(match self.persister.load(link.id).await {
            Ok(Some(_)) => LinkState::LinkedWithSnapshot,
            Ok(None) => LinkState::LinkedNoSnapshot,
            // A stored but unreadable snapshot still counts as present
            Err(SyncError::Snapshot(_)) => LinkState::LinkedWithSnapshot,
            Err(e) => return Err(e),
        })
    }

    /// Import one external track into the library
    pub async fn import_track(&self, external: &ExternalTrack) -> Result<Track> {
        let resolved = self.link_manager.resolve(external).await?;
        self.emit_track_imported(&resolved.track, resolved.created);
        Ok(resolved.track)
    }

    /// Explicitly link a local track to an external track
    pub async fn link_track(&self, local_track_id: i64, external: &ExternalTrack) -> Result<bool> {
        self.link_manager.link_tracks(local_track_id, external).await
    }

    /// Import a remote playlist into a local playlist
    ///
    /// The target is `target_playlist_id` when given, else the playlist named
    /// `target_name` (or the remote name) other than the Collection, created
    /// when missing. An existing target is emptied first. Tracks keep the
    /// remote order; every imported track also lands in the Collection.
    ///
    /// # Errors
    /// `NotAuthenticated`, platform errors from the initial fetch, `NotFound`
    /// for an unknown `target_playlist_id`, `Validation` when it names the
    /// Collection. Per-track failures are warnings.
    #[instrument(skip(self), fields(platform = %self.platform()))]
    pub async fn import_playlist(
        &self,
        external_playlist_id: &str,
        target_name: Option<&str>,
        target_playlist_id: Option<i64>,
    ) -> Result<ImportSummary> {
        self.ensure_authenticated().await?;

        let (tracks, remote) = self
            .client
            .import_playlist_to_local(external_playlist_id)
            .await?;

        let target = self
            .resolve_import_target(target_name.unwrap_or(&remote.name), target_playlist_id)
            .await?;
        let _guard = self.begin(target.id)?;

        let result = self
            .import_into(&target, external_playlist_id, &remote, &tracks)
            .await;
        if let Err(e) = &result {
            self.report_failure(target.id, e);
        }
        result
    }

    /// Import empties its target, so the Collection is never one
    async fn resolve_import_target(
        &self,
        name: &str,
        target_playlist_id: Option<i64>,
    ) -> Result<Playlist> {
        let collection_id = self.context.collection_playlist_id;

        if let Some(id) = target_playlist_id {
            if id == collection_id {
                return Err(SyncError::Validation(
                    "the Collection playlist cannot be an import target".to_string(),
                ));
            }
            return self
                .playlists
                .find_by_id(id)
                .await?
                .ok_or_else(|| SyncError::not_found("Playlist", id));
        }

        let existing = match self.playlists.find_by_name(name).await? {
            Some(playlist) if playlist.id == collection_id => self
                .playlists
                .find_all()
                .await?
                .into_iter()
                .filter(|p| p.name == name && !p.is_folder && p.id != collection_id)
                .min_by_key(|p| p.id),
            found => found,
        };

        match existing {
            Some(playlist) => Ok(playlist),
            None => Ok(self.playlists.insert(&NewPlaylist::new(name)).await?),
        }
    }

    async fn import_into(
        &self,
        target: &Playlist,
        external_playlist_id: &str,
        remote: &PlatformPlaylist,
        tracks: &[ExternalTrack],
    ) -> Result<ImportSummary> {
        let cleared = self.playlists.clear_tracks(target.id).await?;
        if cleared > 0 {
            info!(playlist_id = target.id, cleared, "Cleared playlist before import");
        }

        let mut imported = 0;
        let mut created = 0;
        let mut warnings = Vec::new();

        // Sequential: identity creation and Collection membership race otherwise
        for external in tracks {
            match self.import_member(target.id, external).await {
                Ok(was_created) => {
                    imported += 1;
                    created += usize::from(was_created);
                }
                Err(e) => {
                    let name = self
                        .link_manager
                        .adapters()
                        .normalize(external)
                        .map(|n| n.display_name())
                        .unwrap_or_else(|_| "unknown track".to_string());
                    warn!(playlist_id = target.id, error = %e, "Track import failed");
                    warnings.push(format!("Failed to import {}: {}", name, e));
                }
            }
        }

        let link = self
            .playlists
            .upsert_platform_link(
                target.id,
                self.platform(),
                external_playlist_id,
                remote.is_personal,
                self.clock.now(),
            )
            .await?;
        self.pending.lock().await.remove(&target.id);

        info!(
            playlist_id = target.id,
            imported,
            created,
            failed = warnings.len(),
            "Imported playlist"
        );
        self.events
            .emit(CoreEvent::Library(LibraryEvent::PlaylistImported {
                playlist_id: target.id,
                platform: self.platform(),
                external_playlist_id: external_playlist_id.to_string(),
                imported,
                failed: warnings.len(),
            }))
            .ok();

        Ok(ImportSummary {
            playlist_id: target.id,
            link,
            imported,
            created,
            warnings,
        })
    }

    async fn import_member(&self, playlist_id: i64, external: &ExternalTrack) -> Result<bool> {
        let resolved = self.link_manager.resolve(external).await?;
        let added_at = resolved.normalized.added_at.unwrap_or_else(|| self.clock.now());
        let track_id = resolved.track.id;

        self.playlists.add_track(playlist_id, track_id, added_at).await?;
        if playlist_id != self.context.collection_playlist_id {
            self.playlists
                .add_track(self.context.collection_playlist_id, track_id, added_at)
                .await?;
        }

        self.emit_track_imported(&resolved.track, resolved.created);
        Ok(resolved.created)
    }

    /// Push a local playlist to the platform
    ///
    /// Replaces the linked remote playlist when one exists, otherwise creates
    /// one named `name` (or the local name). Local tracks without a link are
    /// skipped, or matched through a catalog search when
    /// `match_unlinked_on_export` is set.
    #[instrument(skip(self), fields(platform = %self.platform()))]
    pub async fn export_playlist(
        &self,
        playlist_id: i64,
        name: Option<&str>,
    ) -> Result<ExportSummary> {
        let _guard = self.begin(playlist_id)?;
        let result = self.export_inner(playlist_id, name).await;
        if let Err(e) = &result {
            self.report_failure(playlist_id, e);
        }
        result
    }

    async fn export_inner(&self, playlist_id: i64, name: Option<&str>) -> Result<ExportSummary> {
        self.ensure_authenticated().await?;
        let platform = self.platform();

        let playlist = self
            .playlists
            .find_by_id(playlist_id)
            .await?
            .ok_or_else(|| SyncError::not_found("Playlist", playlist_id))?;
        let existing = self.playlists.get_platform_link(playlist_id, platform).await?;

        let members = self.playlists.get_playlist_tracks(playlist_id).await?;
        let links = self.link_manager.links_for(&members, platform).await?;

        let mut track_ids = Vec::with_capacity(members.len());
        let mut warnings = Vec::new();
        for member in &members {
            if let Some(link) = links.get(&member.track.id) {
                track_ids.push(link.preferred_id().to_string());
                continue;
            }

            match self.match_unlinked(&member.track).await {
                Ok(Some(id)) => track_ids.push(id),
                Ok(None) => warnings.push(format!(
                    "Skipped {}: not linked on {}",
                    member.track.display_name(),
                    platform
                )),
                Err(e) => warnings.push(format!(
                    "Skipped {}: {}",
                    member.track.display_name(),
                    e
                )),
            }
        }

        let external_playlist_id = self
            .client
            .export_tracks_to_playlist(
                name.unwrap_or(&playlist.name),
                &track_ids,
                existing.as_ref().map(|l| l.platform_id.as_str()),
            )
            .await?;

        self.playlists
            .upsert_platform_link(playlist_id, platform, &external_playlist_id, true, self.clock.now())
            .await?;
        self.pending.lock().await.remove(&playlist_id);

        info!(
            playlist_id,
            external_playlist_id = %external_playlist_id,
            exported = track_ids.len(),
            skipped = warnings.len(),
            "Exported playlist"
        );
        self.events
            .emit(CoreEvent::Library(LibraryEvent::PlaylistExported {
                playlist_id,
                platform,
                external_playlist_id: external_playlist_id.clone(),
                exported: track_ids.len(),
                skipped: warnings.len(),
            }))
            .ok();

        Ok(ExportSummary {
            playlist_id,
            external_playlist_id,
            exported: track_ids.len(),
            warnings,
        })
    }

    /// Search the platform catalog for an unlinked track and link the first hit
    async fn match_unlinked(&self, track: &Track) -> Result<Option<String>> {
        if !self.context.settings.match_unlinked_on_export {
            return Ok(None);
        }

        let query = format!("{} {}", track.title, track.artist);
        let hits = self
            .client
            .search_tracks(query.trim(), self.context.settings.search_limit)
            .await?;
        let Some(hit) = hits.into_iter().next() else {
            return Ok(None);
        };

        let normalized = self.link_manager.adapters().normalize(&hit)?;
        self.link_manager.link_tracks(track.id, &hit).await?;
        Ok(Some(normalized.preferred_id().to_string()))
    }

    /// Compute the proposed changes and cache them for
    /// [`apply_sync_changes`](Self::apply_sync_changes)
    #[instrument(skip(self), fields(platform = %self.platform()))]
    pub async fn get_sync_changes(&self, playlist_id: i64) -> Result<ChangeSet> {
        let _guard = self.begin(playlist_id)?;
        self.preview(playlist_id).await
    }

    async fn preview(&self, playlist_id: i64) -> Result<ChangeSet> {
        let changes = match self.computer.get_sync_changes(playlist_id).await {
            Ok(changes) => changes,
            Err(e) => {
                self.report_failure(playlist_id, &e);
                return Err(e);
            }
        };

        self.pending
            .lock()
            .await
            .insert(playlist_id, changes.clone());

        self.events
            .emit(CoreEvent::Sync(SyncEvent::PreviewReady {
                playlist_id,
                platform: self.platform(),
                platform_additions: changes.platform_additions.len(),
                platform_removals: changes.platform_removals.len(),
                library_additions: changes.library_additions.len(),
                library_removals: changes.library_removals.len(),
                has_errors: changes.has_errors(),
            }))
            .ok();

        Ok(changes)
    }

    /// Apply the cached preview of a playlist
    ///
    /// `selection` maps change ids to whether they should be applied; ids
    /// not in the map keep their default (selected). The cached preview is
    /// consumed.
    ///
    /// # Errors
    /// `NoPendingChanges` without a prior [`get_sync_changes`](Self::get_sync_changes)
    #[instrument(skip(self, selection), fields(platform = %self.platform()))]
    pub async fn apply_sync_changes(
        &self,
        playlist_id: i64,
        selection: &HashMap<String, bool>,
    ) -> Result<SyncResult> {
        let _guard = self.begin(playlist_id)?;

        let changes = self
            .pending
            .lock()
            .await
            .remove(&playlist_id)
            .ok_or(SyncError::NoPendingChanges { playlist_id })?;

        self.apply(playlist_id, &changes, selection).await
    }

    async fn apply(
        &self,
        playlist_id: i64,
        changes: &ChangeSet,
        selection: &HashMap<String, bool>,
    ) -> Result<SyncResult> {
        let result = match self.applier.apply(playlist_id, changes, selection).await {
            Ok(result) => result,
            Err(e) => {
                self.report_failure(playlist_id, &e);
                return Err(e);
            }
        };

        self.events
            .emit(CoreEvent::Sync(SyncEvent::Applied {
                playlist_id,
                platform: self.platform(),
                platform_added: result.platform_added,
                platform_removed: result.platform_removed,
                library_added: result.library_added,
                library_removed: result.library_removed,
                warnings: result.warnings.len(),
                success: result.success(),
            }))
            .ok();

        Ok(result)
    }

    /// Preview, or compute and apply everything when `apply_all` is set
    #[instrument(skip(self), fields(platform = %self.platform()))]
    pub async fn sync_playlist(&self, playlist_id: i64, apply_all: bool) -> Result<SyncOutcome> {
        let _guard = self.begin(playlist_id)?;

        if !apply_all {
            return Ok(SyncOutcome::Preview(self.preview(playlist_id).await?));
        }

        let mut changes = self.preview(playlist_id).await?;
        self.pending.lock().await.remove(&playlist_id);

        if changes.has_errors() {
            let mut result = SyncResult::new(playlist_id);
            result.errors = changes.errors;
            result.warnings = changes.warnings;
            return Ok(SyncOutcome::Applied(result));
        }

        changes.select_all();
        let result = self.apply(playlist_id, &changes, &HashMap::new()).await?;
        Ok(SyncOutcome::Applied(result))
    }

    /// Recompute and store the snapshot of a playlist
    pub async fn save_sync_snapshot(&self, playlist_id: i64) -> Result<SyncSnapshot> {
        let _guard = self.begin(playlist_id)?;
        let snapshot = match self.persister.save_sync_snapshot(playlist_id).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.report_failure(playlist_id, &e);
                return Err(e);
            }
        };

        self.events
            .emit(CoreEvent::Sync(SyncEvent::SnapshotSaved {
                playlist_id,
                platform: self.platform(),
                platform_tracks: snapshot.platform_tracks.len(),
                library_tracks: snapshot.library_tracks.len(),
            }))
            .ok();

        Ok(snapshot)
    }

    fn begin(&self, playlist_id: i64) -> Result<InFlight> {
        let mut busy = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !busy.insert(playlist_id) {
            return Err(SyncError::SyncInProgress { playlist_id });
        }
        Ok(InFlight {
            playlists: self.in_flight.clone(),
            playlist_id,
        })
    }

    fn report_failure(&self, playlist_id: i64, error: &SyncError) {
        self.events
            .emit(CoreEvent::Sync(SyncEvent::Failed {
                playlist_id,
                platform: self.platform(),
                message: error.to_string(),
            }))
            .ok();
    }

    fn emit_track_imported(&self, track: &Track, created: bool) {
        self.events
            .emit(CoreEvent::Library(LibraryEvent::TrackImported {
                track_id: track.id,
                platform: self.platform(),
                title: track.title.clone(),
                artist: track.artist.clone(),
                created,
            }))
            .ok();
    }
}
