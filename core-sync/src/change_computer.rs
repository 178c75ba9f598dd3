//! # Change Set Computer
//!
//! Diffs the current remote and local membership of a linked playlist
//! against the stored snapshot.
//!
//! ## First sync
//!
//! Without a snapshot every remote track is proposed as a platform addition.
//! For personal playlists, local tracks linked on the platform but missing
//! remotely are proposed as library additions.
//!
//! ## Subsequent syncs
//!
//! - remote ids not in the snapshot: platform additions
//! - snapshot remote ids gone remotely: platform removals
//! - local ids not in the snapshot: library additions (personal only)
//! - snapshot local ids gone locally: library removals (personal only)
//!
//! Fetch failures never abort: they come back as inline errors on an
//! otherwise empty change set.

use crate::adapters::NormalizedTrack;
use crate::changes::{ChangeSet, ChangeType, SyncChange};
use crate::error::{Result, SyncError};
use crate::link_manager::LinkManager;
use crate::snapshot::{SnapshotPersister, SyncSnapshot};
use bridge_traits::{ExternalTrack, PlatformClient, PlatformKind};
use core_library::models::{PlaylistPlatformLink, PlaylistTrack, TrackPlatformLink};
use core_library::repositories::{PlaylistRepository, TrackRepository};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

pub(crate) const INITIAL_SNAPSHOT_WARNING: &str =
    "No previous sync snapshot; every remote track is proposed as new";

/// Current state of both sides of a link
struct CurrentState {
    remote: Vec<(NormalizedTrack, ExternalTrack)>,
    local: Vec<PlaylistTrack>,
    links: HashMap<i64, TrackPlatformLink>,
}

impl CurrentState {
    fn remote_ids(&self) -> HashSet<&str> {
        self.remote
            .iter()
            .map(|(n, _)| n.platform_id.as_str())
            .collect()
    }

    fn local_member(&self, track_id: i64) -> Option<&PlaylistTrack> {
        self.local.iter().find(|m| m.track.id == track_id)
    }
}

pub struct ChangeSetComputer {
    client: Arc<dyn PlatformClient>,
    playlists: Arc<dyn PlaylistRepository>,
    tracks: Arc<dyn TrackRepository>,
    link_manager: Arc<LinkManager>,
    persister: Arc<SnapshotPersister>,
}

impl ChangeSetComputer {
    pub fn new(
        client: Arc<dyn PlatformClient>,
        playlists: Arc<dyn PlaylistRepository>,
        tracks: Arc<dyn TrackRepository>,
        link_manager: Arc<LinkManager>,
        persister: Arc<SnapshotPersister>,
    ) -> Self {
        Self {
            client,
            playlists,
            tracks,
            link_manager,
            persister,
        }
    }

    fn platform(&self) -> PlatformKind {
        self.client.platform()
    }

    /// Compute the proposed changes for a playlist
    ///
    /// # Errors
    /// `NotFound` when the playlist has no link on this platform. Platform
    /// failures are reported inline on the returned change set.
    #[instrument(skip(self), fields(platform = %self.platform()))]
    pub async fn get_sync_changes(&self, playlist_id: i64) -> Result<ChangeSet> {
        let platform = self.platform();
        let link = self
            .playlists
            .get_platform_link(playlist_id, platform)
            .await?
            .ok_or_else(|| {
                SyncError::not_found("PlaylistPlatformLink", format!("{}:{}", playlist_id, platform))
            })?;

        let mut changes = ChangeSet::new(playlist_id, platform);

        if let Err(e) = self.ensure_authenticated().await {
            warn!(playlist_id, error = %e, "Cannot compute sync changes");
            return Ok(changes.with_error(e.to_string()));
        }

        let state = match self.current_state(&link, &mut changes).await {
            Ok(state) => state,
            Err(e) => {
                warn!(playlist_id, error = %e, "Failed to fetch remote tracks");
                return Ok(changes.with_error(format!(
                    "Failed to fetch tracks from {}: {}",
                    platform, e
                )));
            }
        };

        let snapshot = match self.persister.load(link.id).await {
            Ok(snapshot) => snapshot,
            Err(e @ SyncError::Snapshot(_)) => {
                changes
                    .warnings
                    .push(format!("Ignoring unreadable sync snapshot: {}", e));
                None
            }
            Err(e) => return Err(e),
        };

        match snapshot {
            None => self.first_sync(&link, &state, &mut changes).await?,
            Some(snapshot) => {
                self.subsequent_sync(&link, &state, &snapshot, &mut changes)
                    .await?
            }
        }

        info!(
            playlist_id,
            platform_additions = changes.platform_additions.len(),
            platform_removals = changes.platform_removals.len(),
            library_additions = changes.library_additions.len(),
            library_removals = changes.library_removals.len(),
            first_sync = changes.is_first_sync,
            "Computed sync changes"
        );

        Ok(changes)
    }

    async fn ensure_authenticated(&self) -> Result<()> {
        if self.client.is_authenticated().await || self.client.authenticate().await? {
            return Ok(());
        }
        Err(SyncError::NotAuthenticated(self.platform()))
    }

    async fn current_state(
        &self,
        link: &PlaylistPlatformLink,
        changes: &mut ChangeSet,
    ) -> Result<CurrentState> {
        let tracks = self.client.get_playlist_tracks(&link.platform_id).await?;
        let adapters = self.link_manager.adapters();

        let mut remote = Vec::with_capacity(tracks.len());
        for track in tracks {
            match adapters.normalize(&track) {
                Ok(normalized) => remote.push((normalized, track)),
                Err(e) => changes
                    .warnings
                    .push(format!("Skipping unreadable remote track: {}", e)),
            }
        }

        let local = self.playlists.get_playlist_tracks(link.playlist_id).await?;
        let links = self.link_manager.links_for(&local, link.platform).await?;

        Ok(CurrentState {
            remote,
            local,
            links,
        })
    }

    async fn first_sync(
        &self,
        link: &PlaylistPlatformLink,
        state: &CurrentState,
        changes: &mut ChangeSet,
    ) -> Result<()> {
        changes.is_first_sync = true;
        changes.warnings.push(INITIAL_SNAPSHOT_WARNING.to_string());

        for (normalized, track) in &state.remote {
            changes.push(self.platform_addition(normalized, track).await?);
        }

        if link.is_personal_playlist {
            let remote_ids = state.remote_ids();
            for member in &state.local {
                let Some(track_link) = state.links.get(&member.track.id) else {
                    continue;
                };
                if !remote_ids.contains(track_link.platform_id.as_str()) {
                    changes.push(library_change(
                        ChangeType::LibraryAddition,
                        member,
                        Some(track_link),
                    ));
                }
            }
        }

        Ok(())
    }

    async fn subsequent_sync(
        &self,
        link: &PlaylistPlatformLink,
        state: &CurrentState,
        snapshot: &SyncSnapshot,
        changes: &mut ChangeSet,
    ) -> Result<()> {
        let remote_ids = state.remote_ids();

        for (normalized, track) in &state.remote {
            if !snapshot.platform_tracks.contains_key(&normalized.platform_id) {
                changes.push(self.platform_addition(normalized, track).await?);
            }
        }

        for (platform_id, entry) in &snapshot.platform_tracks {
            if remote_ids.contains(platform_id.as_str()) {
                continue;
            }
            let library_id = match entry.library_id {
                Some(id) => Some(id),
                None => {
                    self.link_manager
                        .find_linked_track_id(link.platform, platform_id)
                        .await?
                }
            };
            let (title, artist) = self.describe_local(state, library_id).await?;
            changes.push(
                SyncChange::new(ChangeType::PlatformRemoval, title, artist)
                    .with_library_id(library_id)
                    .with_platform_id(Some(platform_id.clone()), None)
                    .with_added_at(entry.added_at),
            );
        }

        if !link.is_personal_playlist {
            debug!(
                playlist_id = link.playlist_id,
                "Remote playlist is not personal; skipping library changes"
            );
            return Ok(());
        }

        for member in &state.local {
            if snapshot.library_track(member.track.id).is_some() {
                continue;
            }
            let track_link = state.links.get(&member.track.id);
            if track_link.map_or(false, |l| remote_ids.contains(l.platform_id.as_str())) {
                continue;
            }
            changes.push(library_change(
                ChangeType::LibraryAddition,
                member,
                track_link,
            ));
        }

        for (key, entry) in &snapshot.library_tracks {
            let Ok(track_id) = key.parse::<i64>() else {
                continue;
            };
            if state.local_member(track_id).is_some() {
                continue;
            }
            // Nothing to remove remotely for a track that was never linked
            let Some(platform_id) = entry.platform_id.clone() else {
                continue;
            };

            let uri = self
                .tracks
                .get_platform_link(track_id, link.platform)
                .await?
                .filter(|l| l.platform_id == platform_id)
                .and_then(|l| l.uri);
            let (title, artist) = self.describe_local(state, Some(track_id)).await?;

            changes.push(
                SyncChange::new(ChangeType::LibraryRemoval, title, artist)
                    .with_library_id(Some(track_id))
                    .with_platform_id(Some(platform_id), uri)
                    .with_added_at(entry.added_at),
            );
        }

        Ok(())
    }

    async fn platform_addition(
        &self,
        normalized: &NormalizedTrack,
        track: &ExternalTrack,
    ) -> Result<SyncChange> {
        let library_id = self
            .link_manager
            .find_linked_track_id(normalized.platform, &normalized.platform_id)
            .await?;

        Ok(SyncChange::new(
            ChangeType::PlatformAddition,
            normalized.title.clone(),
            normalized.artist.clone(),
        )
        .with_library_id(library_id)
        .with_platform_id(Some(normalized.platform_id.clone()), normalized.uri.clone())
        .with_added_at(normalized.added_at)
        .with_track(track.clone()))
    }

    /// Title and artist of a local track, from the playlist or the library
    async fn describe_local(
        &self,
        state: &CurrentState,
        track_id: Option<i64>,
    ) -> Result<(String, String)> {
        let Some(track_id) = track_id else {
            return Ok((String::new(), String::new()));
        };
        if let Some(member) = state.local_member(track_id) {
            return Ok((member.track.title.clone(), member.track.artist.clone()));
        }
        Ok(self
            .tracks
            .find_by_id(track_id)
            .await?
            .map(|t| (t.title, t.artist))
            .unwrap_or_default())
    }
}

fn library_change(
    change_type: ChangeType,
    member: &PlaylistTrack,
    link: Option<&TrackPlatformLink>,
) -> SyncChange {
    SyncChange::new(change_type, member.track.title.clone(), member.track.artist.clone())
        .with_library_id(Some(member.track.id))
        .with_platform_id(
            link.map(|l| l.platform_id.clone()),
            link.and_then(|l| l.uri.clone()),
        )
        .with_added_at(Some(member.added_at))
}
