//! # Playlist Sync Engine
//!
//! Keeps local playlists consistent with their counterparts on external
//! platforms, in both directions.
//!
//! ## Overview
//!
//! A sync cycle for one linked playlist:
//! - Fetch the remote tracks and normalize them through the platform's adapter
//! - Diff both sides against the snapshot stored by the previous cycle
//! - Let the user pick which proposed changes to apply
//! - Apply them: imports one by one, remote edits as single batch calls
//! - Store a fresh snapshot as the next baseline
//!
//! ## Components
//!
//! - **Track Adapters** (`adapters`): One normalizer per platform
//! - **Link Manager** (`link_manager`): Resolves external tracks to library tracks
//! - **Change Set Computer** (`change_computer`): Snapshot based diff
//! - **Change Applier** (`change_applier`): Applies a selection of changes
//! - **Snapshots** (`snapshot`): Typed baseline plus its persister
//! - **Playlist Sync Service** (`orchestrator`): Import, export, preview and sync entry points

pub mod adapters;
pub mod change_applier;
pub mod change_computer;
pub mod changes;
pub mod error;
pub mod link_manager;
pub mod orchestrator;
pub mod snapshot;

pub use adapters::{
    AdapterRegistry, DiscogsAdapter, NormalizedTrack, RekordboxAdapter, SpotifyAdapter,
    TrackAdapter, YouTubeAdapter,
};
pub use change_applier::ChangeApplier;
pub use change_computer::ChangeSetComputer;
pub use changes::{ChangeSet, ChangeType, SyncChange, SyncResult};
pub use error::{Result, SyncError};
pub use link_manager::{LinkManager, ResolvedTrack};
pub use orchestrator::{
    ExportSummary, ImportSummary, LibraryRepositories, LinkState, PlaylistSyncService,
    SyncContext, SyncOutcome,
};
pub use snapshot::{LibraryTrackState, PlatformTrackState, SnapshotPersister, SyncSnapshot};
