//! # Library Management Module
//!
//! Owns the canonical music library database and provides repository patterns
//! for data access.
//!
//! ## Overview
//!
//! This module manages:
//! - SQLite database schema and migrations
//! - Repository patterns for tracks, albums, playlists and sync snapshots
//! - Links between local entities and their identities on external platforms
//! - Full-text search using FTS5

pub mod db;
pub mod error;
pub mod models;
pub mod repositories;

pub use db::{create_pool, create_test_pool, DatabaseConfig};
pub use error::{LibraryError, Result};
pub use models::{
    Album, NewPlaylist, NewTrack, Playlist, PlaylistPlatformLink, PlaylistTrack,
    SyncSnapshotRecord, Track, TrackPlatformLink, TrackUpdate,
};
pub use repositories::{
    AlbumRepository, PlaylistRepository, SqliteAlbumRepository, SqlitePlaylistRepository,
    SqliteSyncSnapshotRepository, SqliteTrackRepository, SyncSnapshotRepository,
    TrackRepository,
};
