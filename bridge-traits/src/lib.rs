//! # Host Bridge Traits
//!
//! Contracts between the playlist sync engine and the host application.
//!
//! ## Overview
//!
//! The sync engine never talks to a music platform directly. Authentication,
//! HTTP transport, pagination and retries are owned by the host, which hands
//! the engine one [`PlatformClient`](platform::PlatformClient) per platform it
//! supports. Everything in this crate is a trait or a plain data type so the
//! engine can be exercised with in-memory fakes.
//!
//! ## Traits
//!
//! ### Platforms
//! - [`PlatformClient`](platform::PlatformClient) - Remote playlist access for one platform
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Platform
//! clients should:
//!
//! - Convert transport and API errors to `BridgeError::OperationFailed`
//! - Return `BridgeError::NotAuthenticated` when a session is required but missing
//! - Return `BridgeError::NotFound` for unknown playlist identifiers
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds so a client can be shared
//! behind an `Arc` by several sync services.
//!
//! ## Examples
//!
//! ### Implementing PlatformClient
//!
//! ```ignore
//! use async_trait::async_trait;
//! use bridge_traits::error::Result;
//! use bridge_traits::platform::{ExternalTrack, PlatformClient, PlatformKind};
//!
//! struct MySpotifyClient {
//!     // HTTP client, token store, ...
//! }
//!
//! #[async_trait]
//! impl PlatformClient for MySpotifyClient {
//!     fn platform(&self) -> PlatformKind {
//!         PlatformKind::Spotify
//!     }
//!
//!     async fn get_playlist_tracks(&self, playlist_id: &str) -> Result<Vec<ExternalTrack>> {
//!         // page through /v1/playlists/{id}/tracks
//!         todo!()
//!     }
//!
//!     // ...
//! }
//! ```

pub mod error;
pub mod platform;
pub mod time;

pub use error::BridgeError;
pub use platform::{
    DiscogsArtist, DiscogsTrack, ExternalTrack, PlatformClient, PlatformKind, PlatformPlaylist,
    RekordboxTrack, SpotifyAlbum, SpotifyArtist, SpotifyTrack, YouTubeVideo,
};
pub use time::{Clock, ConsoleLogger, FixedClock, LogEntry, LogLevel, LoggerSink, SystemClock};
