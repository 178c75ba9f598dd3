use bridge_traits::PlatformKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Core initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),

    #[error("Sync error: {0}")]
    Sync(#[from] core_sync::SyncError),

    #[error("Library error: {0}")]
    Library(#[from] core_library::LibraryError),
}

impl CoreError {
    pub(crate) fn platform_missing(platform: PlatformKind) -> Self {
        CoreError::CapabilityMissing {
            capability: platform.to_string(),
            message: "no platform client registered".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
