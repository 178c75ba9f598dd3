//! Sync snapshot repository

use crate::error::{LibraryError, Result};
use crate::models::{from_unix, SyncSnapshotRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{query, query_as, FromRow, SqlitePool};

/// Storage of the per-link sync baseline
#[async_trait]
pub trait SyncSnapshotRepository: Send + Sync {
    /// Snapshot stored for a playlist platform link
    async fn find_by_link(&self, link_id: i64) -> Result<Option<SyncSnapshotRecord>>;

    /// Replace the snapshot of a link wholesale.
    ///
    /// The link's `last_linked` is set to `synced_at` in the same transaction.
    ///
    /// # Errors
    /// `NotFound` when the link does not exist
    async fn replace(
        &self,
        link_id: i64,
        snapshot_data: &str,
        synced_at: DateTime<Utc>,
    ) -> Result<SyncSnapshotRecord>;
}

pub struct SqliteSyncSnapshotRepository {
    pool: SqlitePool,
}

impl SqliteSyncSnapshotRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct SnapshotRow {
    link_id: i64,
    last_synced: i64,
    snapshot_data: String,
}

impl TryFrom<SnapshotRow> for SyncSnapshotRecord {
    type Error = LibraryError;

    fn try_from(row: SnapshotRow) -> Result<Self> {
        Ok(Self {
            link_id: row.link_id,
            last_synced: from_unix(row.last_synced)?,
            snapshot_data: row.snapshot_data,
        })
    }
}

#[async_trait]
impl SyncSnapshotRepository for SqliteSyncSnapshotRepository {
    async fn find_by_link(&self, link_id: i64) -> Result<Option<SyncSnapshotRecord>> {
        let row = query_as::<_, SnapshotRow>(
            "SELECT link_id, last_synced, snapshot_data FROM sync_snapshots WHERE link_id = ?",
        )
        .bind(link_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(SyncSnapshotRecord::try_from).transpose()
    }

    async fn replace(
        &self,
        link_id: i64,
        snapshot_data: &str,
        synced_at: DateTime<Utc>,
    ) -> Result<SyncSnapshotRecord> {
        let timestamp = synced_at.timestamp();
        let mut tx = self.pool.begin().await?;

        let updated = query("UPDATE playlist_platform_links SET last_linked = ? WHERE id = ?")
            .bind(timestamp)
            .bind(link_id)
            .execute(&mut *tx)
            .await?;

        if updated.rows_affected() == 0 {
            // Dropping the transaction rolls it back
            return Err(LibraryError::NotFound {
                entity_type: "PlaylistPlatformLink".to_string(),
                id: link_id.to_string(),
            });
        }

        query(
            r#"
            INSERT INTO sync_snapshots (link_id, last_synced, snapshot_data)
            VALUES (?, ?, ?)
            ON CONFLICT(link_id) DO UPDATE SET
                last_synced = excluded.last_synced,
                snapshot_data = excluded.snapshot_data
            "#,
        )
        .bind(link_id)
        .bind(timestamp)
        .bind(snapshot_data)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(SyncSnapshotRecord {
            link_id,
            last_synced: from_unix(timestamp)?,
            snapshot_data: snapshot_data.to_string(),
        })
    }
}
