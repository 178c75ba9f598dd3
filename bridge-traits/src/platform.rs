//! External Platform Contracts
//!
//! Types and traits describing the external music platforms a local playlist
//! can be linked to. Each platform speaks its own schema; the shapes below
//! mirror what the platform APIs hand back and are normalized into canonical
//! track fields by the sync engine's adapters.
//!
//! ## Platforms
//!
//! | Kind | Catalog | Native track shape |
//! |------|---------|--------------------|
//! | `Spotify` | streaming service | [`SpotifyTrack`] |
//! | `Rekordbox` | DJ-software library export | [`RekordboxTrack`] |
//! | `Discogs` | marketplace / collection catalog | [`DiscogsTrack`] |
//! | `YouTube` | video catalog | [`YouTubeVideo`] |

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;

/// External platform a playlist or track can be linked to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformKind {
    Spotify,
    Rekordbox,
    Discogs,
    #[serde(rename = "youtube")]
    YouTube,
}

impl PlatformKind {
    /// All supported platforms
    pub const ALL: [PlatformKind; 4] = [
        PlatformKind::Spotify,
        PlatformKind::Rekordbox,
        PlatformKind::Discogs,
        PlatformKind::YouTube,
    ];

    /// Human-readable name
    pub fn display_name(&self) -> &'static str {
        match self {
            PlatformKind::Spotify => "Spotify",
            PlatformKind::Rekordbox => "Rekordbox",
            PlatformKind::Discogs => "Discogs",
            PlatformKind::YouTube => "YouTube",
        }
    }

    /// Identifier used in storage and configuration
    ///
    /// ```
    /// use bridge_traits::PlatformKind;
    ///
    /// assert_eq!(PlatformKind::YouTube.as_str(), "youtube");
    /// ```
    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformKind::Spotify => "spotify",
            PlatformKind::Rekordbox => "rekordbox",
            PlatformKind::Discogs => "discogs",
            PlatformKind::YouTube => "youtube",
        }
    }

    /// Parse a platform from its storage identifier
    ///
    /// ```
    /// use bridge_traits::PlatformKind;
    ///
    /// assert_eq!(PlatformKind::parse("Spotify"), Some(PlatformKind::Spotify));
    /// assert_eq!(PlatformKind::parse("tidal"), None);
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "spotify" => Some(PlatformKind::Spotify),
            "rekordbox" => Some(PlatformKind::Rekordbox),
            "discogs" => Some(PlatformKind::Discogs),
            "youtube" | "you_tube" => Some(PlatformKind::YouTube),
            _ => None,
        }
    }
}

impl fmt::Display for PlatformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

// ============================================================================
// Native track shapes
// ============================================================================

/// Artist credit on a Spotify track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpotifyArtist {
    pub id: Option<String>,
    pub name: String,
}

/// Album summary embedded in a Spotify track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpotifyAlbum {
    pub id: Option<String>,
    pub name: String,
    /// `YYYY`, `YYYY-MM` or `YYYY-MM-DD` depending on precision
    pub release_date: Option<String>,
}

/// Playlist item from the Spotify Web API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpotifyTrack {
    pub id: String,
    /// `spotify:track:<id>`
    pub uri: Option<String>,
    pub name: String,
    pub artists: Vec<SpotifyArtist>,
    pub album: Option<SpotifyAlbum>,
    pub duration_ms: Option<i64>,
    pub added_at: Option<DateTime<Utc>>,
}

/// Track entry from a rekordbox collection export
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RekordboxTrack {
    pub track_id: String,
    pub name: String,
    pub artist: String,
    pub album: Option<String>,
    /// Length in whole seconds
    pub total_time: Option<i64>,
    pub year: Option<i32>,
    /// `file://localhost/...` URL, percent-encoded
    pub location: Option<String>,
    /// 0, 51, 102, 153, 204 or 255
    pub rating: Option<i32>,
    pub date_added: Option<DateTime<Utc>>,
}

/// Artist credit on a Discogs release
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscogsArtist {
    pub name: String,
    /// Artist name variation used on this release
    pub anv: Option<String>,
}

/// One tracklist position of a Discogs release
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscogsTrack {
    pub release_id: i64,
    /// Tracklist position such as `A1` or `3`
    pub position: String,
    pub title: String,
    /// Track-level credits; empty when the release credits apply
    pub artists: Vec<DiscogsArtist>,
    pub release_artists: Vec<DiscogsArtist>,
    pub release_title: Option<String>,
    pub year: Option<i32>,
    /// `m:ss` or `h:mm:ss`, empty when unknown
    pub duration: Option<String>,
    pub resource_url: Option<String>,
    pub date_added: Option<DateTime<Utc>>,
}

/// Playlist item from the YouTube Data API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YouTubeVideo {
    pub video_id: String,
    pub title: String,
    pub channel_title: Option<String>,
    /// ISO-8601 duration such as `PT3M20S`
    pub duration: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub added_at: Option<DateTime<Utc>>,
}

/// Track as returned by any platform client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "platform", content = "track", rename_all = "snake_case")]
pub enum ExternalTrack {
    Spotify(SpotifyTrack),
    Rekordbox(RekordboxTrack),
    Discogs(DiscogsTrack),
    #[serde(rename = "youtube")]
    YouTube(YouTubeVideo),
}

impl ExternalTrack {
    /// Platform this track shape belongs to
    pub fn platform(&self) -> PlatformKind {
        match self {
            ExternalTrack::Spotify(_) => PlatformKind::Spotify,
            ExternalTrack::Rekordbox(_) => PlatformKind::Rekordbox,
            ExternalTrack::Discogs(_) => PlatformKind::Discogs,
            ExternalTrack::YouTube(_) => PlatformKind::YouTube,
        }
    }
}

/// Remote playlist summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformPlaylist {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    /// True when the authenticated user can modify the playlist remotely
    pub is_personal: bool,
    pub track_count: Option<u32>,
}

// ============================================================================
// Client contract
// ============================================================================

/// Platform client trait
///
/// Implemented by the host for every platform it supports. Authentication,
/// HTTP transport, pagination and retries live behind this trait; the sync
/// engine only sees whole results.
///
/// Track identifiers passed to [`add_tracks_to_playlist`],
/// [`remove_tracks_from_playlist`] and [`export_tracks_to_playlist`] are the
/// URI-style id when the platform has one, otherwise the opaque id.
///
/// [`add_tracks_to_playlist`]: PlatformClient::add_tracks_to_playlist
/// [`remove_tracks_from_playlist`]: PlatformClient::remove_tracks_from_playlist
/// [`export_tracks_to_playlist`]: PlatformClient::export_tracks_to_playlist
#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// Platform served by this client
    fn platform(&self) -> PlatformKind;

    /// Whether a usable session exists
    async fn is_authenticated(&self) -> bool;

    /// Establish a session; returns `false` when the user declined or
    /// credentials are missing
    async fn authenticate(&self) -> Result<bool>;

    /// Every playlist visible to the authenticated user
    async fn get_all_playlists(&self) -> Result<Vec<PlatformPlaylist>>;

    /// Current tracks of a remote playlist, in remote order
    async fn get_playlist_tracks(&self, playlist_id: &str) -> Result<Vec<ExternalTrack>>;

    /// Tracks plus playlist metadata, for a first import
    async fn import_playlist_to_local(
        &self,
        playlist_id: &str,
    ) -> Result<(Vec<ExternalTrack>, PlatformPlaylist)>;

    /// Append tracks to a remote playlist in one call
    async fn add_tracks_to_playlist(&self, playlist_id: &str, track_ids: &[String])
        -> Result<bool>;

    /// Remove tracks from a remote playlist in one call
    async fn remove_tracks_from_playlist(
        &self,
        playlist_id: &str,
        track_ids: &[String],
    ) -> Result<bool>;

    /// Create a remote playlist (or replace the contents of
    /// `existing_playlist_id`) and return its remote id
    async fn export_tracks_to_playlist(
        &self,
        name: &str,
        track_ids: &[String],
        existing_playlist_id: Option<&str>,
    ) -> Result<String>;

    /// Free-text catalog search
    async fn search_tracks(&self, query: &str, limit: usize) -> Result<Vec<ExternalTrack>>;
}
