//! # Track Adapters
//!
//! One adapter per platform turns that platform's track shape into a
//! [`NormalizedTrack`]. Everything downstream (identity resolution, diffing,
//! snapshots) works on normalized tracks only.
//!
//! Adapters are pure: no I/O, no clock.

mod discogs;
mod rekordbox;
mod spotify;
mod youtube;

pub use discogs::DiscogsAdapter;
pub use rekordbox::RekordboxAdapter;
pub use spotify::SpotifyAdapter;
pub use youtube::YouTubeAdapter;

use crate::error::{Result, SyncError};
use bridge_traits::{ExternalTrack, PlatformKind};
use chrono::{DateTime, Utc};
use core_library::models::display_name;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Canonical fields extracted from an external track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedTrack {
    pub platform: PlatformKind,
    /// Opaque platform identifier; snapshot keys use this
    pub platform_id: String,
    /// URI-style identifier, when the platform has one
    pub uri: Option<String>,
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub duration_ms: Option<i64>,
    pub year: Option<i32>,
    pub file_path: Option<String>,
    /// 0-5 stars
    pub rating: Option<i32>,
    /// When the track was added to the remote playlist
    pub added_at: Option<DateTime<Utc>>,
    /// Raw platform payload, stored on the track's platform link
    pub metadata: serde_json::Value,
}

impl NormalizedTrack {
    /// Identifier to send back to the platform: the URI when present
    pub fn preferred_id(&self) -> &str {
        self.uri
            .as_deref()
            .filter(|uri| !uri.is_empty())
            .unwrap_or(&self.platform_id)
    }

    pub fn display_name(&self) -> String {
        display_name(&self.artist, &self.title)
    }

    /// Both title and artist are present
    pub fn has_identity(&self) -> bool {
        !self.title.trim().is_empty() && !self.artist.trim().is_empty()
    }
}

/// Normalizes one platform's track shape
pub trait TrackAdapter: Send + Sync {
    fn platform(&self) -> PlatformKind;

    /// # Errors
    /// `UnsupportedTrack` when `track` belongs to another platform
    fn normalize(&self, track: &ExternalTrack) -> Result<NormalizedTrack>;
}

/// Adapter lookup by platform
#[derive(Clone)]
pub struct AdapterRegistry {
    adapters: HashMap<PlatformKind, Arc<dyn TrackAdapter>>,
}

impl AdapterRegistry {
    /// Registry without any adapter
    pub fn empty() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    /// Register (or replace) the adapter for its platform
    pub fn register(&mut self, adapter: Arc<dyn TrackAdapter>) {
        self.adapters.insert(adapter.platform(), adapter);
    }

    pub fn get(&self, platform: PlatformKind) -> Option<Arc<dyn TrackAdapter>> {
        self.adapters.get(&platform).cloned()
    }

    /// Normalize with the adapter of the track's own platform
    pub fn normalize(&self, track: &ExternalTrack) -> Result<NormalizedTrack> {
        let platform = track.platform();
        let adapter = self
            .adapters
            .get(&platform)
            .ok_or_else(|| SyncError::not_found("TrackAdapter", platform))?;
        adapter.normalize(track)
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(SpotifyAdapter));
        registry.register(Arc::new(RekordboxAdapter));
        registry.register(Arc::new(DiscogsAdapter));
        registry.register(Arc::new(YouTubeAdapter));
        registry
    }
}

// Shared parsing helpers

/// Year from the first four characters of a date string ("2016-05-20", "2016")
pub(crate) fn year_from_date(date: &str) -> Option<i32> {
    let year: i32 = date.trim().get(..4)?.parse().ok()?;
    (year > 0).then_some(year)
}

pub(crate) fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub(crate) fn unsupported(adapter: PlatformKind, track: &ExternalTrack) -> SyncError {
    SyncError::UnsupportedTrack {
        adapter,
        actual: track.platform(),
    }
}
