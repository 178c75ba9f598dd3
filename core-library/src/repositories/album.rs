//! Album repository trait and implementation

use crate::error::{LibraryError, Result};
use crate::models::Album;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{query, query_as, SqlitePool};

/// Album repository interface for data access operations
#[async_trait]
pub trait AlbumRepository: Send + Sync {
    /// Find an album by its ID
    async fn find_by_id(&self, id: i64) -> Result<Option<Album>>;

    /// Find an album by name and artist, creating it when missing
    ///
    /// Names compare case-insensitively. A missing `year` on the stored
    /// album is filled in from `year`.
    ///
    /// # Errors
    /// `InvalidInput` when `name` is blank
    async fn find_or_create(
        &self,
        name: &str,
        artist: Option<&str>,
        year: Option<i32>,
    ) -> Result<Album>;
}

/// SQLite implementation of AlbumRepository
pub struct SqliteAlbumRepository {
    pool: SqlitePool,
}

impl SqliteAlbumRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AlbumRepository for SqliteAlbumRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Album>> {
        let album = query_as::<_, Album>("SELECT * FROM albums WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(album)
    }

    async fn find_or_create(
        &self,
        name: &str,
        artist: Option<&str>,
        year: Option<i32>,
    ) -> Result<Album> {
        let name = name.trim();
        if name.is_empty() {
            return Err(LibraryError::InvalidInput {
                field: "name".to_string(),
                message: "Album name cannot be empty".to_string(),
            });
        }
        let artist = artist.map(str::trim).filter(|a| !a.is_empty());

        let existing = query_as::<_, Album>(
            r#"
            SELECT * FROM albums
            WHERE name = ? COLLATE NOCASE AND artist IS ? COLLATE NOCASE
            ORDER BY id
            LIMIT 1
            "#,
        )
        .bind(name)
        .bind(artist)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(mut album) = existing {
            if album.year.is_none() && year.is_some() {
                query("UPDATE albums SET year = ? WHERE id = ?")
                    .bind(year)
                    .bind(album.id)
                    .execute(&self.pool)
                    .await?;
                album.year = year;
            }
            return Ok(album);
        }

        let created_at = Utc::now().timestamp();
        let result = query("INSERT INTO albums (name, artist, year, created_at) VALUES (?, ?, ?, ?)")
            .bind(name)
            .bind(artist)
            .bind(year)
            .bind(created_at)
            .execute(&self.pool)
            .await?;

        Ok(Album {
            id: result.last_insert_rowid(),
            name: name.to_string(),
            artist: artist.map(str::to_string),
            year,
            created_at,
        })
    }
}
