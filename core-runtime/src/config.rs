//! # Core Configuration Module
//!
//! Configuration for the playlist sync engine.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance. `build()` validates eagerly so a misconfigured host fails at
//! startup rather than halfway through a sync.
//!
//! ## Collection playlist
//!
//! The Collection is the local playlist holding every imported track. It is
//! resolved exactly once when the service boots: by `collection_playlist_id`
//! when set, otherwise by `collection_name` (created when missing).
//!
//! ## Usage
//!
//! ```
//! use core_runtime::config::{CoreConfig, SyncSettings};
//!
//! let config = CoreConfig::builder()
//!     .database_path("/path/to/library.db")
//!     .collection_name("Collection")
//!     .sync_settings(SyncSettings::default().with_match_unlinked_on_export(true))
//!     .build()
//!     .expect("valid config");
//!
//! assert!(config.sync.match_unlinked_on_export);
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::CoreConfig;
//!
//! // Missing database path
//! let config = CoreConfig::builder()
//!     .build()
//!     .expect("Should fail - database path is required");
//! ```

use crate::error::{Error, Result};
use std::path::PathBuf;

/// Default name of the Collection playlist
pub const DEFAULT_COLLECTION_NAME: &str = "Collection";

/// Default capacity of each event bus channel
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

/// Core configuration for the playlist sync engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    /// Path to the SQLite database file
    pub database_path: PathBuf,

    /// Name used to find or create the Collection playlist
    pub collection_name: String,

    /// Explicit Collection playlist id; takes precedence over the name
    pub collection_playlist_id: Option<i64>,

    /// Capacity of each event bus channel
    pub event_buffer_size: usize,

    /// Sync engine tuning
    pub sync: SyncSettings,
}

/// Sync engine settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    /// Result limit for catalog searches when matching unlinked tracks
    pub search_limit: usize,

    /// On export, look up local tracks without a platform link in the
    /// platform catalog and link the first hit
    pub match_unlinked_on_export: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            search_limit: 5,
            match_unlinked_on_export: false,
        }
    }
}

impl SyncSettings {
    pub fn with_search_limit(mut self, limit: usize) -> Self {
        self.search_limit = limit;
        self
    }

    pub fn with_match_unlinked_on_export(mut self, enabled: bool) -> Self {
        self.match_unlinked_on_export = enabled;
        self
    }

    /// Validates the settings
    pub fn validate(&self) -> Result<()> {
        if self.search_limit == 0 {
            return Err(Error::Config(
                "Search limit must be greater than 0".to_string(),
            ));
        }

        if self.search_limit > 50 {
            return Err(Error::Config(
                "Search limit exceeds maximum of 50 results".to_string(),
            ));
        }

        Ok(())
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration.
    ///
    /// This checks:
    /// - Database path is not empty
    /// - Collection name is not blank
    /// - Collection id, when set, is positive
    /// - Event buffer size is > 0
    /// - Sync settings are in range
    pub fn validate(&self) -> Result<()> {
        if self.database_path.as_os_str().is_empty() {
            return Err(Error::Config("Database path cannot be empty".to_string()));
        }

        if self.collection_name.trim().is_empty() {
            return Err(Error::Config(
                "Collection name cannot be empty".to_string(),
            ));
        }

        if let Some(id) = self.collection_playlist_id {
            if id <= 0 {
                return Err(Error::Config(format!(
                    "Collection playlist id must be positive, got {}",
                    id
                )));
            }
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        self.sync.validate()
    }
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Debug, Default)]
pub struct CoreConfigBuilder {
    database_path: Option<PathBuf>,
    collection_name: Option<String>,
    collection_playlist_id: Option<i64>,
    event_buffer_size: Option<usize>,
    sync: Option<SyncSettings>,
}

impl CoreConfigBuilder {
    /// Sets the database path.
    ///
    /// ```
    /// use core_runtime::config::CoreConfig;
    ///
    /// let builder = CoreConfig::builder()
    ///     .database_path("/path/to/library.db");
    /// ```
    pub fn database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.database_path = Some(path.into());
        self
    }

    /// Sets the Collection playlist name.
    ///
    /// Default: `"Collection"`
    pub fn collection_name(mut self, name: impl Into<String>) -> Self {
        self.collection_name = Some(name.into());
        self
    }

    /// Pins the Collection to an existing playlist id.
    pub fn collection_playlist_id(mut self, id: i64) -> Self {
        self.collection_playlist_id = Some(id);
        self
    }

    /// Sets the event bus channel capacity.
    ///
    /// Default: 100
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    pub fn sync_settings(mut self, settings: SyncSettings) -> Self {
        self.sync = Some(settings);
        self
    }

    /// Builds and validates the final `CoreConfig`.
    pub fn build(self) -> Result<CoreConfig> {
        let database_path = self.database_path.ok_or_else(|| {
            Error::Config("Database path is required. Use .database_path() to set it.".to_string())
        })?;

        let config = CoreConfig {
            database_path,
            collection_name: self
                .collection_name
                .unwrap_or_else(|| DEFAULT_COLLECTION_NAME.to_string()),
            collection_playlist_id: self.collection_playlist_id,
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
            sync: self.sync.unwrap_or_default(),
        };

        config.validate()?;

        Ok(config)
    }
}
