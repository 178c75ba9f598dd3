//! # Repository Pattern Implementation
//!
//! Repository traits and their SQLite implementations.
//!
//! ## Architecture
//!
//! - Traits define the interface for each repository
//! - SQLite implementations use sqlx for async database access
//! - All operations return `Result<T>` for error handling
//!
//! ## Available Repositories
//!
//! - `TrackRepository` - Canonical tracks, full-text search and platform links
//! - `AlbumRepository` - Albums referenced by tracks
//! - `PlaylistRepository` - Playlists, ordered membership and platform links
//! - `SyncSnapshotRepository` - Per-link sync baselines

pub mod album;
pub mod playlist;
pub mod snapshot;
pub mod track;

pub use album::{AlbumRepository, SqliteAlbumRepository};
pub use playlist::{PlaylistRepository, SqlitePlaylistRepository};
pub use snapshot::{SqliteSyncSnapshotRepository, SyncSnapshotRepository};
pub use track::{SqliteTrackRepository, TrackRepository};
