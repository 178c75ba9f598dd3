//! Track repository trait and implementation

use crate::error::{LibraryError, Result};
use crate::models::{from_unix, NewTrack, Track, TrackPlatformLink, TrackUpdate};
use async_trait::async_trait;
use bridge_traits::PlatformKind;
use chrono::Utc;
use sqlx::{query_as, FromRow, SqlitePool};

/// Track repository interface for data access operations
#[async_trait]
pub trait TrackRepository: Send + Sync {
    /// Find a track by its ID
    async fn find_by_id(&self, id: i64) -> Result<Option<Track>>;

    /// Find the track linked to `platform_id` on `platform`
    ///
    /// When several tracks carry the same platform id, the oldest wins.
    async fn find_by_platform_id(
        &self,
        platform: PlatformKind,
        platform_id: &str,
    ) -> Result<Option<Track>>;

    /// Full-text search over title and artist
    ///
    /// Every word of `query` must match. Results are ordered by artist, then
    /// title, not by relevance.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Track>>;

    /// Insert a new track and return it with its assigned id
    ///
    /// # Errors
    /// `InvalidInput` when title and artist are both empty
    async fn insert(&self, track: &NewTrack) -> Result<Track>;

    /// Merge `update` into an existing track
    ///
    /// See [`Track::merge`] for the `preserve_existing` rules.
    ///
    /// # Errors
    /// `NotFound` when the track does not exist
    async fn update(&self, id: i64, update: &TrackUpdate, preserve_existing: bool)
        -> Result<Track>;

    /// Create or replace the link between a track and a platform
    async fn upsert_platform_link(&self, link: &TrackPlatformLink) -> Result<()>;

    /// Link of a track on a platform, if any
    async fn get_platform_link(
        &self,
        track_id: i64,
        platform: PlatformKind,
    ) -> Result<Option<TrackPlatformLink>>;

    /// Count total tracks
    async fn count(&self) -> Result<i64>;
}

/// SQLite implementation of TrackRepository
pub struct SqliteTrackRepository {
    pool: SqlitePool,
}

impl SqliteTrackRepository {
    /// Create a new SQLite track repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct TrackPlatformLinkRow {
    track_id: i64,
    platform: String,
    platform_id: String,
    uri: Option<String>,
    metadata: String,
    last_linked: i64,
}

impl TryFrom<TrackPlatformLinkRow> for TrackPlatformLink {
    type Error = LibraryError;

    fn try_from(row: TrackPlatformLinkRow) -> Result<Self> {
        let platform =
            PlatformKind::parse(&row.platform).ok_or_else(|| LibraryError::InvalidInput {
                field: "platform".to_string(),
                message: format!("Unknown platform: {}", row.platform),
            })?;

        Ok(Self {
            track_id: row.track_id,
            platform,
            platform_id: row.platform_id,
            uri: row.uri,
            metadata: serde_json::from_str(&row.metadata)?,
            last_linked: from_unix(row.last_linked)?,
        })
    }
}

/// Turn free text into an FTS5 query: every word quoted, implicit AND.
///
/// Returns `None` when the text has no searchable words.
pub(crate) fn fts_query(text: &str) -> Option<String> {
    let terms: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(|word| format!("\"{}\"", word))
        .collect();

    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" "))
    }
}

#[async_trait]
impl TrackRepository for SqliteTrackRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Track>> {
        let track = query_as::<_, Track>("SELECT * FROM tracks WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(track)
    }

    async fn find_by_platform_id(
        &self,
        platform: PlatformKind,
        platform_id: &str,
    ) -> Result<Option<Track>> {
        let track = query_as::<_, Track>(
            r#"
            SELECT t.* FROM tracks t
            JOIN track_platform_links l ON l.track_id = t.id
            WHERE l.platform = ? AND l.platform_id = ?
            ORDER BY t.id
            LIMIT 1
            "#,
        )
        .bind(platform.as_str())
        .bind(platform_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(track)
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Track>> {
        let Some(match_expr) = fts_query(query) else {
            return Ok(Vec::new());
        };

        let tracks = query_as::<_, Track>(
            r#"
            SELECT * FROM tracks
            WHERE id IN (SELECT rowid FROM tracks_fts WHERE tracks_fts MATCH ?)
            ORDER BY artist COLLATE NOCASE, title COLLATE NOCASE, id
            LIMIT ?
            "#,
        )
        .bind(match_expr)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(tracks)
    }

    async fn insert(&self, track: &NewTrack) -> Result<Track> {
        track.validate().map_err(|msg| LibraryError::InvalidInput {
            field: "track".to_string(),
            message: msg,
        })?;

        let now = Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            INSERT INTO tracks (
                title, artist, album_id, duration_ms, year,
                file_path, rating, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(track.title.trim())
        .bind(track.artist.trim())
        .bind(track.album_id)
        .bind(track.duration_ms)
        .bind(track.year)
        .bind(&track.file_path)
        .bind(track.rating)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(Track {
            id: result.last_insert_rowid(),
            title: track.title.trim().to_string(),
            artist: track.artist.trim().to_string(),
            album_id: track.album_id,
            duration_ms: track.duration_ms,
            year: track.year,
            file_path: track.file_path.clone(),
            rating: track.rating,
            created_at: now,
            updated_at: now,
        })
    }

    async fn update(
        &self,
        id: i64,
        update: &TrackUpdate,
        preserve_existing: bool,
    ) -> Result<Track> {
        let mut track = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| LibraryError::NotFound {
                entity_type: "Track".to_string(),
                id: id.to_string(),
            })?;

        if !track.merge(update, preserve_existing) {
            return Ok(track);
        }

        track.updated_at = Utc::now().timestamp();

        sqlx::query(
            r#"
            UPDATE tracks SET
                title = ?, artist = ?, album_id = ?, duration_ms = ?, year = ?,
                file_path = ?, rating = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&track.title)
        .bind(&track.artist)
        .bind(track.album_id)
        .bind(track.duration_ms)
        .bind(track.year)
        .bind(&track.file_path)
        .bind(track.rating)
        .bind(track.updated_at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(track)
    }

    async fn upsert_platform_link(&self, link: &TrackPlatformLink) -> Result<()> {
        let metadata = serde_json::to_string(&link.metadata)?;

        sqlx::query(
            r#"
            INSERT INTO track_platform_links (
                track_id, platform, platform_id, uri, metadata, last_linked
            ) VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(track_id, platform) DO UPDATE SET
                platform_id = excluded.platform_id,
                uri = excluded.uri,
                metadata = excluded.metadata,
                last_linked = excluded.last_linked
            "#,
        )
        .bind(link.track_id)
        .bind(link.platform.as_str())
        .bind(&link.platform_id)
        .bind(&link.uri)
        .bind(metadata)
        .bind(link.last_linked.timestamp())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_platform_link(
        &self,
        track_id: i64,
        platform: PlatformKind,
    ) -> Result<Option<TrackPlatformLink>> {
        let row = query_as::<_, TrackPlatformLinkRow>(
            r#"
            SELECT track_id, platform, platform_id, uri, metadata, last_linked
            FROM track_platform_links
            WHERE track_id = ? AND platform = ?
            "#,
        )
        .bind(track_id)
        .bind(platform.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TrackPlatformLink::try_from).transpose()
    }

    async fn count(&self) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tracks")
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }
}
