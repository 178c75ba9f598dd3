//! # Sync Snapshots
//!
//! A snapshot records the membership of a playlist on both sides as of the
//! last successful sync. It is the diff baseline for the next sync and is
//! replaced wholesale every time, never patched.
//!
//! ## Stored format
//!
//! ```json
//! {
//!   "platform_tracks": { "<platform_id>": { "library_id": 12, "added_at": "2024-01-01T00:00:00Z" } },
//!   "library_tracks":  { "12": { "platform_id": "<platform_id>", "added_at": null } }
//! }
//! ```
//!
//! The JSON blob only exists at the storage boundary; the diff works on the
//! typed maps.

use crate::adapters::NormalizedTrack;
use crate::error::{Result, SyncError};
use crate::link_manager::LinkManager;
use bridge_traits::{Clock, PlatformClient};
use chrono::{DateTime, Utc};
use core_library::models::{PlaylistPlatformLink, PlaylistTrack, TrackPlatformLink};
use core_library::repositories::{PlaylistRepository, SyncSnapshotRepository};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Remote side entry, keyed by platform id
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformTrackState {
    /// Local track linked to this remote track at snapshot time
    pub library_id: Option<i64>,
    pub added_at: Option<DateTime<Utc>>,
}

/// Local side entry, keyed by local track id
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryTrackState {
    /// `None` when the track had no link on the platform
    pub platform_id: Option<String>,
    pub added_at: Option<DateTime<Utc>>,
}

/// Typed sync baseline of one playlist link
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSnapshot {
    #[serde(default)]
    pub platform_tracks: BTreeMap<String, PlatformTrackState>,
    /// Keys are local track ids rendered as strings
    #[serde(default)]
    pub library_tracks: BTreeMap<String, LibraryTrackState>,
}

impl SyncSnapshot {
    /// Build a snapshot from the current state of both sides
    ///
    /// `links` maps local track ids to their link on the platform.
    pub fn capture(
        remote: &[NormalizedTrack],
        local: &[PlaylistTrack],
        links: &HashMap<i64, TrackPlatformLink>,
    ) -> Self {
        let local_by_platform_id: HashMap<&str, i64> = local
            .iter()
            .filter_map(|member| {
                links
                    .get(&member.track.id)
                    .map(|link| (link.platform_id.as_str(), member.track.id))
            })
            .collect();

        let platform_tracks = remote
            .iter()
            .map(|track| {
                let state = PlatformTrackState {
                    library_id: local_by_platform_id
                        .get(track.platform_id.as_str())
                        .copied(),
                    added_at: track.added_at,
                };
                (track.platform_id.clone(), state)
            })
            .collect();

        let library_tracks = local
            .iter()
            .map(|member| {
                let state = LibraryTrackState {
                    platform_id: links
                        .get(&member.track.id)
                        .map(|link| link.platform_id.clone()),
                    added_at: Some(member.added_at),
                };
                (member.track.id.to_string(), state)
            })
            .collect();

        Self {
            platform_tracks,
            library_tracks,
        }
    }

    /// Local side entry of a track
    pub fn library_track(&self, track_id: i64) -> Option<&LibraryTrackState> {
        self.library_tracks.get(&track_id.to_string())
    }

    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// # Errors
    /// `Snapshot` when the blob is not a snapshot or a local key is not a
    /// track id
    pub fn decode(data: &str) -> Result<Self> {
        let snapshot: SyncSnapshot =
            serde_json::from_str(data).map_err(|e| SyncError::Snapshot(e.to_string()))?;

        if let Some(key) = snapshot
            .library_tracks
            .keys()
            .find(|key| key.parse::<i64>().is_err())
        {
            return Err(SyncError::Snapshot(format!(
                "library track key '{}' is not a track id",
                key
            )));
        }

        Ok(snapshot)
    }
}

/// Recomputes and stores snapshots
pub struct SnapshotPersister {
    client: Arc<dyn PlatformClient>,
    playlists: Arc<dyn PlaylistRepository>,
    snapshots: Arc<dyn SyncSnapshotRepository>,
    link_manager: Arc<LinkManager>,
    clock: Arc<dyn Clock>,
}

impl SnapshotPersister {
    pub fn new(
        client: Arc<dyn PlatformClient>,
        playlists: Arc<dyn PlaylistRepository>,
        snapshots: Arc<dyn SyncSnapshotRepository>,
        link_manager: Arc<LinkManager>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            client,
            playlists,
            snapshots,
            link_manager,
            clock,
        }
    }

    /// Stored snapshot of a link, if any
    pub async fn load(&self, link_id: i64) -> Result<Option<SyncSnapshot>> {
        match self.snapshots.find_by_link(link_id).await? {
            Some(record) => Ok(Some(SyncSnapshot::decode(&record.snapshot_data)?)),
            None => Ok(None),
        }
    }

    /// Fetch both sides and replace the stored snapshot
    ///
    /// The snapshot and the link's `last_linked` are written together.
    ///
    /// # Errors
    /// `NotFound` when the playlist has no link on this platform; platform
    /// errors from fetching the remote tracks
    #[instrument(skip(self), fields(platform = %self.client.platform()))]
    pub async fn save_sync_snapshot(&self, playlist_id: i64) -> Result<SyncSnapshot> {
        let platform = self.client.platform();
        let link = self
            .playlists
            .get_platform_link(playlist_id, platform)
            .await?
            .ok_or_else(|| {
                SyncError::not_found("PlaylistPlatformLink", format!("{}:{}", playlist_id, platform))
            })?;

        let remote = self.fetch_remote(&link).await?;
        let local = self.playlists.get_playlist_tracks(playlist_id).await?;
        let links = self.link_manager.links_for(&local, platform).await?;

        let snapshot = SyncSnapshot::capture(&remote, &local, &links);
        self.snapshots
            .replace(link.id, &snapshot.encode()?, self.clock.now())
            .await?;

        info!(
            playlist_id,
            platform_tracks = snapshot.platform_tracks.len(),
            library_tracks = snapshot.library_tracks.len(),
            "Saved sync snapshot"
        );

        Ok(snapshot)
    }

    async fn fetch_remote(&self, link: &PlaylistPlatformLink) -> Result<Vec<NormalizedTrack>> {
        let tracks = self.client.get_playlist_tracks(&link.platform_id).await?;
        let adapters = self.link_manager.adapters();

        let mut remote = Vec::with_capacity(tracks.len());
        for track in &tracks {
            match adapters.normalize(track) {
                Ok(normalized) => remote.push(normalized),
                Err(e) => warn!(error = %e, "Skipping remote track in snapshot"),
            }
        }
        Ok(remote)
    }
}
