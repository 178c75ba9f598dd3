use bridge_traits::{BridgeError, PlatformKind};
use core_library::LibraryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{entity_type} {id} not found")]
    NotFound { entity_type: String, id: String },

    #[error("Platform error: {0}")]
    Platform(#[from] BridgeError),

    #[error("Not authenticated with {0}")]
    NotAuthenticated(PlatformKind),

    #[error("Sync already in progress for playlist {playlist_id}")]
    SyncInProgress { playlist_id: i64 },

    #[error("{adapter} adapter cannot normalize a {actual} track")]
    UnsupportedTrack {
        adapter: PlatformKind,
        actual: PlatformKind,
    },

    #[error("No pending changes for playlist {playlist_id}; preview the sync first")]
    NoPendingChanges { playlist_id: i64 },

    #[error("Invalid sync snapshot: {0}")]
    Snapshot(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Library error: {0}")]
    Library(#[from] LibraryError),
}

impl SyncError {
    pub(crate) fn not_found(entity_type: &str, id: impl ToString) -> Self {
        SyncError::NotFound {
            entity_type: entity_type.to_string(),
            id: id.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
