//! Domain models for the music library
//!
//! Canonical tracks and playlists plus the links tying them to external
//! platforms. Timestamps are stored as unix seconds; the link and snapshot
//! models expose them as `DateTime<Utc>`.

use bridge_traits::PlatformKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::{LibraryError, Result};

/// Convert stored unix seconds into a UTC timestamp
pub fn from_unix(seconds: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(seconds, 0).ok_or_else(|| LibraryError::InvalidInput {
        field: "timestamp".to_string(),
        message: format!("{} is out of range", seconds),
    })
}

// =============================================================================
// Tracks
// =============================================================================

/// Canonical music track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Track {
    pub id: i64,
    pub title: String,
    pub artist: String,
    pub album_id: Option<i64>,
    pub duration_ms: Option<i64>,
    pub year: Option<i32>,
    /// Local audio file, when the track came from a DJ library
    pub file_path: Option<String>,
    /// Quality rating, 0-5 stars
    pub rating: Option<i32>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Track {
    /// "Artist - Title", used in warnings and logs
    pub fn display_name(&self) -> String {
        display_name(&self.artist, &self.title)
    }

    /// Merge `update` into this track.
    ///
    /// With `preserve_existing`, a field is only written when the current
    /// value is empty: a blank string, a non-positive number or `None`.
    /// Blank strings in `update` never overwrite anything.
    ///
    /// Returns `true` when any field changed.
    pub fn merge(&mut self, update: &TrackUpdate, preserve_existing: bool) -> bool {
        let mut changed = false;

        if let Some(title) = non_blank(&update.title) {
            if (!preserve_existing || self.title.trim().is_empty()) && self.title != title {
                self.title = title.to_string();
                changed = true;
            }
        }

        if let Some(artist) = non_blank(&update.artist) {
            if (!preserve_existing || self.artist.trim().is_empty()) && self.artist != artist {
                self.artist = artist.to_string();
                changed = true;
            }
        }

        changed |= merge_option(&mut self.album_id, update.album_id, preserve_existing, |id| {
            id > 0
        });
        changed |= merge_option(
            &mut self.duration_ms,
            update.duration_ms,
            preserve_existing,
            |ms| ms > 0,
        );
        changed |= merge_option(&mut self.year, update.year, preserve_existing, |year| {
            year > 0
        });
        changed |= merge_option(&mut self.rating, update.rating, preserve_existing, |rating| {
            rating > 0
        });

        if let Some(path) = non_blank(&update.file_path) {
            let existing_empty = self
                .file_path
                .as_deref()
                .map_or(true, |p| p.trim().is_empty());
            if (!preserve_existing || existing_empty) && self.file_path.as_deref() != Some(path) {
                self.file_path = Some(path.to_string());
                changed = true;
            }
        }

        changed
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn merge_option<T: Copy + PartialEq>(
    current: &mut Option<T>,
    incoming: Option<T>,
    preserve_existing: bool,
    is_set: impl Fn(T) -> bool,
) -> bool {
    let Some(value) = incoming else {
        return false;
    };

    let existing_set = current.map_or(false, &is_set);
    if preserve_existing && existing_set {
        return false;
    }

    if *current == Some(value) {
        return false;
    }

    *current = Some(value);
    true
}

/// "Artist - Title", falling back to whichever half is present
pub fn display_name(artist: &str, title: &str) -> String {
    match (artist.trim(), title.trim()) {
        ("", title) => title.to_string(),
        (artist, "") => artist.to_string(),
        (artist, title) => format!("{} - {}", artist, title),
    }
}

/// Fields for a track insert
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTrack {
    pub title: String,
    pub artist: String,
    pub album_id: Option<i64>,
    pub duration_ms: Option<i64>,
    pub year: Option<i32>,
    pub file_path: Option<String>,
    pub rating: Option<i32>,
}

impl NewTrack {
    /// A track needs at least a title or an artist
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.title.trim().is_empty() && self.artist.trim().is_empty() {
            return Err("Track title and artist cannot both be empty".to_string());
        }

        if let Some(rating) = self.rating {
            if !(0..=5).contains(&rating) {
                return Err(format!("Track rating {} is out of range 0-5", rating));
            }
        }

        if let Some(duration) = self.duration_ms {
            if duration < 0 {
                return Err("Track duration cannot be negative".to_string());
            }
        }

        Ok(())
    }
}

/// Partial track data merged by [`Track::merge`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackUpdate {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album_id: Option<i64>,
    pub duration_ms: Option<i64>,
    pub year: Option<i32>,
    pub file_path: Option<String>,
    pub rating: Option<i32>,
}

impl From<NewTrack> for TrackUpdate {
    fn from(track: NewTrack) -> Self {
        Self {
            title: Some(track.title),
            artist: Some(track.artist),
            album_id: track.album_id,
            duration_ms: track.duration_ms,
            year: track.year,
            file_path: track.file_path,
            rating: track.rating,
        }
    }
}

/// Association between a track and its identity on one platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackPlatformLink {
    pub track_id: i64,
    pub platform: PlatformKind,
    /// Opaque platform identifier
    pub platform_id: String,
    /// URI-style identifier, when the platform has one
    pub uri: Option<String>,
    /// Raw platform payload from the most recent link
    pub metadata: serde_json::Value,
    pub last_linked: DateTime<Utc>,
}

impl TrackPlatformLink {
    /// Identifier to send back to the platform: the URI when present
    pub fn preferred_id(&self) -> &str {
        self.uri
            .as_deref()
            .filter(|uri| !uri.is_empty())
            .unwrap_or(&self.platform_id)
    }
}

// =============================================================================
// Albums
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Album {
    pub id: i64,
    pub name: String,
    pub artist: Option<String>,
    pub year: Option<i32>,
    pub created_at: i64,
}

// =============================================================================
// Playlists
// =============================================================================

/// Local playlist or playlist folder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Playlist {
    pub id: i64,
    pub name: String,
    pub is_folder: bool,
    pub parent_id: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPlaylist {
    pub name: String,
    pub is_folder: bool,
    pub parent_id: Option<i64>,
}

impl NewPlaylist {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_folder: false,
            parent_id: None,
        }
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Playlist name cannot be empty".to_string());
        }
        Ok(())
    }
}

/// Track membership row of a playlist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistTrack {
    pub track: Track,
    pub position: i64,
    pub added_at: DateTime<Utc>,
}

/// Association between a local playlist and a remote playlist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistPlatformLink {
    pub id: i64,
    pub playlist_id: i64,
    pub platform: PlatformKind,
    pub platform_id: String,
    /// The remote playlist is writable by the user
    pub is_personal_playlist: bool,
    pub last_linked: Option<DateTime<Utc>>,
}

/// Stored sync baseline of one playlist link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSnapshotRecord {
    pub link_id: i64,
    pub last_synced: DateTime<Utc>,
    /// Encoded snapshot; opaque at this layer
    pub snapshot_data: String,
}
