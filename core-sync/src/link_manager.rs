//! # Link Manager
//!
//! Resolves external tracks to canonical library tracks and maintains the
//! track ↔ platform links.
//!
//! ## Identity resolution
//!
//! 1. Exact match on `(platform, platform_id)` through an existing link
//! 2. Full-text search on `"<title> <artist>"`, taking the first hit that
//!    has no link on the same platform yet
//!
//! The search fallback is not similarity-ranked: hits come back ordered by
//! artist then title. A hit already linked on the platform is skipped, so two
//! remote tracks sharing a title and artist end up as two local tracks. A
//! found track is merged with `preserve_existing`, so fields already set
//! locally are never overwritten.

use crate::adapters::{AdapterRegistry, NormalizedTrack};
use crate::error::{Result, SyncError};
use bridge_traits::{Clock, ExternalTrack, PlatformKind};
use core_library::models::{NewTrack, PlaylistTrack, Track, TrackPlatformLink, TrackUpdate};
use core_library::repositories::{AlbumRepository, TrackRepository};
use core_runtime::logging::strip_path;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Title+artist search hits considered per import
const SEARCH_CANDIDATES: usize = 5;

/// Outcome of resolving one external track
#[derive(Debug, Clone)]
pub struct ResolvedTrack {
    pub track: Track,
    pub normalized: NormalizedTrack,
    /// False when an existing track was matched
    pub created: bool,
}

/// Track identity resolver
pub struct LinkManager {
    tracks: Arc<dyn TrackRepository>,
    albums: Arc<dyn AlbumRepository>,
    adapters: Arc<AdapterRegistry>,
    clock: Arc<dyn Clock>,
}

impl LinkManager {
    pub fn new(
        tracks: Arc<dyn TrackRepository>,
        albums: Arc<dyn AlbumRepository>,
        adapters: Arc<AdapterRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            tracks,
            albums,
            adapters,
            clock,
        }
    }

    pub fn adapters(&self) -> &AdapterRegistry {
        &self.adapters
    }

    /// Import an external track, returning the canonical track
    ///
    /// Idempotent per external identity: importing the same track twice
    /// yields the same local track.
    ///
    /// # Errors
    /// `Validation` when the normalized track lacks a title or an artist;
    /// no track is created in that case.
    pub async fn import_track(&self, external: &ExternalTrack) -> Result<Track> {
        Ok(self.resolve(external).await?.track)
    }

    /// Like [`import_track`](Self::import_track) but also reports the
    /// normalized fields and whether a new track was created
    #[instrument(skip(self, external), fields(platform = %external.platform()))]
    pub async fn resolve(&self, external: &ExternalTrack) -> Result<ResolvedTrack> {
        let normalized = self.adapters.normalize(external)?;
        validate_identity(&normalized)?;

        let existing = match self
            .tracks
            .find_by_platform_id(normalized.platform, &normalized.platform_id)
            .await?
        {
            Some(track) => Some(track),
            None => self.search_match(&normalized).await?,
        };

        let album_id = self.album_id(&normalized).await?;
        let update = track_update(&normalized, album_id);

        let (track, created) = match existing {
            Some(track) => {
                debug!(
                    track_id = track.id,
                    platform_id = %normalized.platform_id,
                    file = normalized.file_path.as_deref().map(strip_path),
                    "Matched existing track"
                );
                let track = self.tracks.update(track.id, &update, true).await?;
                (track, false)
            }
            None => {
                let track = self.tracks.insert(&new_track(&normalized, album_id)).await?;
                debug!(
                    track_id = track.id,
                    platform_id = %normalized.platform_id,
                    file = normalized.file_path.as_deref().map(strip_path),
                    "Created track"
                );
                (track, true)
            }
        };

        self.upsert_link(track.id, &normalized).await?;

        Ok(ResolvedTrack {
            track,
            normalized,
            created,
        })
    }

    /// Link an existing local track to an external track
    ///
    /// Skips identity search. Empty local fields are filled from the
    /// external metadata.
    ///
    /// Returns `true` when the link is new or now points to a different
    /// platform id, `false` when only its metadata was refreshed.
    ///
    /// # Errors
    /// `NotFound` when the local track does not exist
    #[instrument(skip(self, external), fields(platform = %external.platform()))]
    pub async fn link_tracks(&self, local_track_id: i64, external: &ExternalTrack) -> Result<bool> {
        let normalized = self.adapters.normalize(external)?;

        if self.tracks.find_by_id(local_track_id).await?.is_none() {
            return Err(SyncError::not_found("Track", local_track_id));
        }

        let previous = self
            .tracks
            .get_platform_link(local_track_id, normalized.platform)
            .await?;

        let album_id = self.album_id(&normalized).await?;
        self.tracks
            .update(local_track_id, &track_update(&normalized, album_id), true)
            .await?;
        self.upsert_link(local_track_id, &normalized).await?;

        Ok(previous.map_or(true, |link| link.platform_id != normalized.platform_id))
    }

    /// Local track already linked to `platform_id`, if any
    pub async fn find_linked_track_id(
        &self,
        platform: PlatformKind,
        platform_id: &str,
    ) -> Result<Option<i64>> {
        Ok(self
            .tracks
            .find_by_platform_id(platform, platform_id)
            .await?
            .map(|track| track.id))
    }

    /// Platform links of the given playlist tracks, keyed by track id
    ///
    /// Tracks without a link on `platform` are absent from the map.
    pub async fn links_for(
        &self,
        members: &[PlaylistTrack],
        platform: PlatformKind,
    ) -> Result<HashMap<i64, TrackPlatformLink>> {
        let mut links = HashMap::with_capacity(members.len());
        for member in members {
            if let Some(link) = self
                .tracks
                .get_platform_link(member.track.id, platform)
                .await?
            {
                links.insert(member.track.id, link);
            }
        }
        Ok(links)
    }

    /// First search hit not yet linked on the platform.
    ///
    /// A hit already linked there belongs to a different remote track, since
    /// an exact platform id match was tried first.
    async fn search_match(&self, normalized: &NormalizedTrack) -> Result<Option<Track>> {
        let query = format!("{} {}", normalized.title, normalized.artist);
        for track in self.tracks.search(&query, SEARCH_CANDIDATES).await? {
            if self
                .tracks
                .get_platform_link(track.id, normalized.platform)
                .await?
                .is_some()
            {
                debug!(track_id = track.id, query = %query, "Skipped search hit linked elsewhere");
                continue;
            }
            debug!(track_id = track.id, query = %query, "Matched track by search");
            return Ok(Some(track));
        }
        Ok(None)
    }

    async fn album_id(&self, normalized: &NormalizedTrack) -> Result<Option<i64>> {
        let Some(album) = normalized.album.as_deref() else {
            return Ok(None);
        };
        let album = self
            .albums
            .find_or_create(album, Some(&normalized.artist), normalized.year)
            .await?;
        Ok(Some(album.id))
    }

    async fn upsert_link(&self, track_id: i64, normalized: &NormalizedTrack) -> Result<()> {
        let link = TrackPlatformLink {
            track_id,
            platform: normalized.platform,
            platform_id: normalized.platform_id.clone(),
            uri: normalized.uri.clone(),
            metadata: normalized.metadata.clone(),
            last_linked: self.clock.now(),
        };
        self.tracks.upsert_platform_link(&link).await?;
        Ok(())
    }
}

fn validate_identity(normalized: &NormalizedTrack) -> Result<()> {
    if normalized.platform_id.trim().is_empty() {
        return Err(SyncError::Validation(format!(
            "{} track has no platform id",
            normalized.platform
        )));
    }

    if !normalized.has_identity() {
        return Err(SyncError::Validation(format!(
            "Track '{}' needs both a title and an artist",
            normalized.display_name()
        )));
    }

    Ok(())
}

fn track_update(normalized: &NormalizedTrack, album_id: Option<i64>) -> TrackUpdate {
    TrackUpdate {
        title: Some(normalized.title.clone()),
        artist: Some(normalized.artist.clone()),
        album_id,
        duration_ms: normalized.duration_ms,
        year: normalized.year,
        file_path: normalized.file_path.clone(),
        rating: normalized.rating,
    }
}

fn new_track(normalized: &NormalizedTrack, album_id: Option<i64>) -> NewTrack {
    NewTrack {
        title: normalized.title.clone(),
        artist: normalized.artist.clone(),
        album_id,
        duration_ms: normalized.duration_ms,
        year: normalized.year,
        file_path: normalized.file_path.clone(),
        rating: normalized.rating,
    }
}
