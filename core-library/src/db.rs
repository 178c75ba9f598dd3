//! # Database
//!
//! SQLite pool holding the canonical library, playlist links and sync
//! snapshots. Opening a pool always applies the embedded migrations and
//! runs a probe query before handing the pool out.
//!
//! ```rust,ignore
//! use core_library::db::{create_pool, DatabaseConfig};
//!
//! let pool = create_pool(DatabaseConfig::new("library.db")).await?;
//! let playlists = SqlitePlaylistRepository::new(pool.clone());
//! ```
//!
//! Tests use [`create_test_pool`]: an in-memory database behind a single
//! connection, so every query sees the same data.

use crate::{LibraryError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Where and how to open the database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// `None` opens a private in-memory database
    pub path: Option<PathBuf>,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    /// How long a writer waits on a locked database before failing
    pub busy_timeout: Duration,
}

impl DatabaseConfig {
    /// File database at `path`, created when missing
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            max_connections: 4,
            acquire_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(5),
        }
    }

    /// In-memory database. A second connection would see a different,
    /// empty database, so the pool is pinned to one.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            max_connections: 1,
            acquire_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(5),
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        if self.path.is_some() {
            self.max_connections = max.max(1);
        }
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    fn connect_options(&self) -> SqliteConnectOptions {
        let options = match &self.path {
            Some(path) => SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal),
            None => SqliteConnectOptions::new()
                .in_memory(true)
                .journal_mode(SqliteJournalMode::Memory),
        };

        options
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(self.busy_timeout)
    }
}

/// Open a pool, apply migrations and probe it
///
/// # Errors
/// `Database` when the file cannot be opened, `Migration` when the schema
/// cannot be brought up to date
pub async fn create_pool(config: DatabaseConfig) -> Result<SqlitePool> {
    let target = config
        .path
        .as_deref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| ":memory:".to_string());
    info!(
        database = %target,
        max_connections = config.max_connections,
        "Opening library database"
    );

    let pool = SqlitePoolOptions::new()
        .min_connections(1)
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        // In-memory contents live and die with the connection
        .idle_timeout(config.path.as_ref().map(|_| Duration::from_secs(600)))
        .max_lifetime(config.path.as_ref().map(|_| Duration::from_secs(1800)))
        .connect_with(config.connect_options())
        .await
        .map_err(|e| {
            warn!(database = %target, error = %e, "Failed to open library database");
            LibraryError::Database(e)
        })?;

    migrate(&pool).await?;
    probe(&pool).await?;
    Ok(pool)
}

/// In-memory pool with the schema applied
pub async fn create_test_pool() -> Result<SqlitePool> {
    create_pool(DatabaseConfig::in_memory()).await
}

async fn migrate(pool: &SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| LibraryError::Migration(e.to_string()))?;
    debug!("Library schema up to date");
    Ok(())
}

async fn probe(pool: &SqlitePool) -> Result<()> {
    let (one,): (i64,) = sqlx::query_as("SELECT 1").fetch_one(pool).await?;
    if one != 1 {
        return Err(LibraryError::Migration(
            "database probe returned an unexpected value".to_string(),
        ));
    }
    Ok(())
}
