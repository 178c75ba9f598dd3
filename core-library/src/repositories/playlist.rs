//! Playlist repository trait and implementation

use crate::error::{LibraryError, Result};
use crate::models::{from_unix, NewPlaylist, Playlist, PlaylistPlatformLink, PlaylistTrack, Track};
use async_trait::async_trait;
use bridge_traits::PlatformKind;
use chrono::{DateTime, Utc};
use sqlx::{query, query_as, FromRow, SqlitePool};
use tracing::debug;

/// Playlist repository interface for data access operations
#[async_trait]
pub trait PlaylistRepository: Send + Sync {
    /// Find a playlist by its ID
    async fn find_by_id(&self, id: i64) -> Result<Option<Playlist>>;

    /// Find the oldest non-folder playlist with exactly this name
    async fn find_by_name(&self, name: &str) -> Result<Option<Playlist>>;

    /// All playlists and folders, by name
    async fn find_all(&self) -> Result<Vec<Playlist>>;

    /// Insert a new playlist
    ///
    /// # Errors
    /// `InvalidInput` when the name is blank
    async fn insert(&self, playlist: &NewPlaylist) -> Result<Playlist>;

    /// Append a track to the end of a playlist
    ///
    /// # Returns
    /// - `Ok(true)` if the track was added
    /// - `Ok(false)` if it was already a member
    async fn add_track(
        &self,
        playlist_id: i64,
        track_id: i64,
        added_at: DateTime<Utc>,
    ) -> Result<bool>;

    /// Remove a track from a playlist; the track itself is untouched
    ///
    /// # Returns
    /// - `Ok(true)` if the association existed
    async fn remove_track(&self, playlist_id: i64, track_id: i64) -> Result<bool>;

    /// Whether a track is a member of a playlist
    async fn contains_track(&self, playlist_id: i64, track_id: i64) -> Result<bool>;

    /// Member tracks in playlist order
    async fn get_playlist_tracks(&self, playlist_id: i64) -> Result<Vec<PlaylistTrack>>;

    /// Remove every track association; returns how many were removed
    async fn clear_tracks(&self, playlist_id: i64) -> Result<u64>;

    /// Create or replace the link between a playlist and a remote playlist.
    ///
    /// Any sync snapshot stored for the link is deleted in the same
    /// transaction; a freshly (re)linked playlist has no baseline.
    async fn upsert_platform_link(
        &self,
        playlist_id: i64,
        platform: PlatformKind,
        platform_id: &str,
        is_personal_playlist: bool,
        linked_at: DateTime<Utc>,
    ) -> Result<PlaylistPlatformLink>;

    /// Link of a playlist on a platform, if any
    async fn get_platform_link(
        &self,
        playlist_id: i64,
        platform: PlatformKind,
    ) -> Result<Option<PlaylistPlatformLink>>;
}

/// SQLite implementation of PlaylistRepository
pub struct SqlitePlaylistRepository {
    pool: SqlitePool,
}

impl SqlitePlaylistRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct PlaylistTrackRow {
    #[sqlx(flatten)]
    track: Track,
    position: i64,
    added_at: i64,
}

impl TryFrom<PlaylistTrackRow> for PlaylistTrack {
    type Error = LibraryError;

    fn try_from(row: PlaylistTrackRow) -> Result<Self> {
        Ok(Self {
            track: row.track,
            position: row.position,
            added_at: from_unix(row.added_at)?,
        })
    }
}

#[derive(Debug, FromRow)]
struct PlaylistPlatformLinkRow {
    id: i64,
    playlist_id: i64,
    platform: String,
    platform_id: String,
    is_personal_playlist: bool,
    last_linked: Option<i64>,
}

impl TryFrom<PlaylistPlatformLinkRow> for PlaylistPlatformLink {
    type Error = LibraryError;

    fn try_from(row: PlaylistPlatformLinkRow) -> Result<Self> {
        let platform =
            PlatformKind::parse(&row.platform).ok_or_else(|| LibraryError::InvalidInput {
                field: "platform".to_string(),
                message: format!("Unknown platform: {}", row.platform),
            })?;

        Ok(Self {
            id: row.id,
            playlist_id: row.playlist_id,
            platform,
            platform_id: row.platform_id,
            is_personal_playlist: row.is_personal_playlist,
            last_linked: row.last_linked.map(from_unix).transpose()?,
        })
    }
}

#[async_trait]
impl PlaylistRepository for SqlitePlaylistRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Playlist>> {
        let playlist = query_as::<_, Playlist>("SELECT * FROM playlists WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(playlist)
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Playlist>> {
        let playlist = query_as::<_, Playlist>(
            "SELECT * FROM playlists WHERE name = ? AND is_folder = 0 ORDER BY id LIMIT 1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(playlist)
    }

    async fn find_all(&self) -> Result<Vec<Playlist>> {
        let playlists =
            query_as::<_, Playlist>("SELECT * FROM playlists ORDER BY name COLLATE NOCASE, id")
                .fetch_all(&self.pool)
                .await?;

        Ok(playlists)
    }

    async fn insert(&self, playlist: &NewPlaylist) -> Result<Playlist> {
        playlist
            .validate()
            .map_err(|e| LibraryError::InvalidInput {
                field: "playlist".to_string(),
                message: e,
            })?;

        let now = Utc::now().timestamp();
        let result = query(
            r#"
            INSERT INTO playlists (name, is_folder, parent_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(playlist.name.trim())
        .bind(playlist.is_folder)
        .bind(playlist.parent_id)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(Playlist {
            id: result.last_insert_rowid(),
            name: playlist.name.trim().to_string(),
            is_folder: playlist.is_folder,
            parent_id: playlist.parent_id,
            created_at: now,
            updated_at: now,
        })
    }

    async fn add_track(
        &self,
        playlist_id: i64,
        track_id: i64,
        added_at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = query(
            r#"
            INSERT OR IGNORE INTO playlist_tracks (playlist_id, track_id, position, added_at)
            VALUES (
                ?1, ?2,
                (SELECT COALESCE(MAX(position) + 1, 0) FROM playlist_tracks WHERE playlist_id = ?1),
                ?3
            )
            "#,
        )
        .bind(playlist_id)
        .bind(track_id)
        .bind(added_at.timestamp())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn remove_track(&self, playlist_id: i64, track_id: i64) -> Result<bool> {
        let result = query("DELETE FROM playlist_tracks WHERE playlist_id = ? AND track_id = ?")
            .bind(playlist_id)
            .bind(track_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn contains_track(&self, playlist_id: i64, track_id: i64) -> Result<bool> {
        let count: (i64,) = query_as(
            "SELECT COUNT(*) FROM playlist_tracks WHERE playlist_id = ? AND track_id = ?",
        )
        .bind(playlist_id)
        .bind(track_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count.0 > 0)
    }

    async fn get_playlist_tracks(&self, playlist_id: i64) -> Result<Vec<PlaylistTrack>> {
        let rows = query_as::<_, PlaylistTrackRow>(
            r#"
            SELECT t.*, pt.position, pt.added_at
            FROM playlist_tracks pt
            JOIN tracks t ON t.id = pt.track_id
            WHERE pt.playlist_id = ?
            ORDER BY pt.position, t.id
            "#,
        )
        .bind(playlist_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(PlaylistTrack::try_from).collect()
    }

    async fn clear_tracks(&self, playlist_id: i64) -> Result<u64> {
        let result = query("DELETE FROM playlist_tracks WHERE playlist_id = ?")
            .bind(playlist_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn upsert_platform_link(
        &self,
        playlist_id: i64,
        platform: PlatformKind,
        platform_id: &str,
        is_personal_playlist: bool,
        linked_at: DateTime<Utc>,
    ) -> Result<PlaylistPlatformLink> {
        let mut tx = self.pool.begin().await?;

        query(
            r#"
            INSERT INTO playlist_platform_links (
                playlist_id, platform, platform_id, is_personal_playlist, last_linked
            ) VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(playlist_id, platform) DO UPDATE SET
                platform_id = excluded.platform_id,
                is_personal_playlist = excluded.is_personal_playlist,
                last_linked = excluded.last_linked
            "#,
        )
        .bind(playlist_id)
        .bind(platform.as_str())
        .bind(platform_id)
        .bind(is_personal_playlist)
        .bind(linked_at.timestamp())
        .execute(&mut *tx)
        .await?;

        let cleared = query(
            r#"
            DELETE FROM sync_snapshots
            WHERE link_id = (
                SELECT id FROM playlist_platform_links
                WHERE playlist_id = ? AND platform = ?
            )
            "#,
        )
        .bind(playlist_id)
        .bind(platform.as_str())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        if cleared.rows_affected() > 0 {
            debug!(playlist_id, %platform, "Dropped sync snapshot of relinked playlist");
        }

        self.get_platform_link(playlist_id, platform)
            .await?
            .ok_or_else(|| LibraryError::NotFound {
                entity_type: "PlaylistPlatformLink".to_string(),
                id: format!("{}:{}", playlist_id, platform.as_str()),
            })
    }

    async fn get_platform_link(
        &self,
        playlist_id: i64,
        platform: PlatformKind,
    ) -> Result<Option<PlaylistPlatformLink>> {
        let row = query_as::<_, PlaylistPlatformLinkRow>(
            r#"
            SELECT id, playlist_id, platform, platform_id, is_personal_playlist, last_linked
            FROM playlist_platform_links
            WHERE playlist_id = ? AND platform = ?
            "#,
        )
        .bind(playlist_id)
        .bind(platform.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(PlaylistPlatformLink::try_from).transpose()
    }
}
