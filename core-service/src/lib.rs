//! Core service façade and bootstrap helpers.
//!
//! This crate wires the storage layer, the event bus and host-provided
//! platform clients into the sync engine. Hosts build a [`CoreConfig`],
//! call [`CoreService::bootstrap`], register one [`PlatformClient`] per
//! platform they support and then ask for the [`PlaylistSyncService`] of a
//! platform.
//!
//! ```rust,ignore
//! use core_runtime::config::CoreConfig;
//! use core_service::CoreService;
//!
//! let config = CoreConfig::builder()
//!     .database_path("/path/to/library.db")
//!     .build()?;
//! let core = CoreService::bootstrap(config).await?;
//! core.register_platform(spotify_client).await;
//!
//! let spotify = core.playlist_sync(PlatformKind::Spotify).await?;
//! let changes = spotify.get_sync_changes(playlist_id).await?;
//! ```

pub mod error;

pub use error::{CoreError, Result};

use std::collections::HashMap;
use std::sync::Arc;

use bridge_traits::{PlatformClient, PlatformKind};
use core_library::models::{NewPlaylist, Playlist};
use core_library::{create_pool, DatabaseConfig};
use core_runtime::config::CoreConfig;
use core_runtime::events::EventBus;
use core_sync::{LibraryRepositories, PlaylistSyncService, SyncContext};
use sqlx::SqlitePool;
use tokio::sync::RwLock;
use tracing::{info, instrument};

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct CoreService {
    config: Arc<CoreConfig>,
    pool: SqlitePool,
    repositories: LibraryRepositories,
    context: SyncContext,
    events: EventBus,
    platforms: Arc<RwLock<HashMap<PlatformKind, Arc<PlaylistSyncService>>>>,
}

impl CoreService {
    /// Open the database at `config.database_path` and resolve the
    /// Collection playlist.
    #[instrument(skip(config), fields(database = %config.database_path.display()))]
    pub async fn bootstrap(config: CoreConfig) -> Result<Self> {
        config.validate()?;
        let pool = create_pool(DatabaseConfig::new(&config.database_path)).await?;
        Self::from_pool(config, pool).await
    }

    /// Build the service on an existing pool with migrations applied.
    pub async fn from_pool(config: CoreConfig, pool: SqlitePool) -> Result<Self> {
        config.validate()?;
        let repositories = LibraryRepositories::sqlite(pool.clone());
        let collection = resolve_collection(&config, &repositories).await?;
        info!(
            collection_playlist_id = collection.id,
            collection_name = %collection.name,
            "Core service ready"
        );

        let context = SyncContext::new(collection.id).with_settings(config.sync);
        let events = EventBus::new(config.event_buffer_size);

        Ok(Self {
            config: Arc::new(config),
            pool,
            repositories,
            context,
            events,
            platforms: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// Register the client of a platform.
    ///
    /// Replaces a previously registered client of the same platform; services
    /// already handed out keep working with the old client.
    pub async fn register_platform(
        &self,
        client: Arc<dyn PlatformClient>,
    ) -> Arc<PlaylistSyncService> {
        let platform = client.platform();
        let service = Arc::new(PlaylistSyncService::new(
            client,
            self.repositories.clone(),
            self.context,
            self.events.clone(),
        ));

        let replaced = self
            .platforms
            .write()
            .await
            .insert(platform, Arc::clone(&service))
            .is_some();
        info!(%platform, replaced, "Registered platform client");

        service
    }

    /// Sync service of a registered platform
    pub async fn playlist_sync(&self, platform: PlatformKind) -> Result<Arc<PlaylistSyncService>> {
        self.platforms
            .read()
            .await
            .get(&platform)
            .cloned()
            .ok_or_else(|| CoreError::platform_missing(platform))
    }

    /// Platforms with a registered client, in declaration order
    pub async fn platforms(&self) -> Vec<PlatformKind> {
        let registered = self.platforms.read().await;
        PlatformKind::ALL
            .into_iter()
            .filter(|p| registered.contains_key(p))
            .collect()
    }

    pub fn collection_playlist_id(&self) -> i64 {
        self.context.collection_playlist_id
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.events
    }

    pub fn repositories(&self) -> &LibraryRepositories {
        &self.repositories
    }

    /// Close the database pool. Pending operations finish first.
    pub async fn shutdown(&self) {
        self.pool.close().await;
        info!("Core service shut down");
    }
}

/// The Collection is looked up once: by configured id, else by name,
/// created when missing.
async fn resolve_collection(
    config: &CoreConfig,
    repositories: &LibraryRepositories,
) -> Result<Playlist> {
    let playlists = &repositories.playlists;

    if let Some(id) = config.collection_playlist_id {
        return playlists.find_by_id(id).await?.ok_or_else(|| {
            CoreError::InitializationFailed(format!("Collection playlist {} does not exist", id))
        });
    }

    match playlists.find_by_name(&config.collection_name).await? {
        Some(playlist) => Ok(playlist),
        None => {
            let playlist = playlists
                .insert(&NewPlaylist::new(config.collection_name.as_str()))
                .await?;
            info!(playlist_id = playlist.id, "Created Collection playlist");
            Ok(playlist)
        }
    }
}
