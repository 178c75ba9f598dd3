//! # Change Applier
//!
//! Applies the selected subset of a change set.
//!
//! - Platform additions are imported one by one; a failing track becomes a
//!   warning and the loop moves on.
//! - Platform removals only drop the playlist association. Tracks are never
//!   deleted.
//! - Library additions and removals go out as one batch call each, and only
//!   for personal playlists. A failed batch is one error.
//!
//! When anything was applied, a fresh snapshot is stored once at the end.
//! A failed snapshot save is a warning; applied changes stay applied.

use crate::changes::{ChangeSet, SyncChange, SyncResult};
use crate::error::{Result, SyncError};
use crate::link_manager::LinkManager;
use crate::snapshot::SnapshotPersister;
use bridge_traits::{Clock, PlatformClient, PlatformKind};
use core_library::models::PlaylistPlatformLink;
use core_library::repositories::PlaylistRepository;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

enum BatchKind {
    Add,
    Remove,
}

pub struct ChangeApplier {
    client: Arc<dyn PlatformClient>,
    playlists: Arc<dyn PlaylistRepository>,
    link_manager: Arc<LinkManager>,
    persister: Arc<SnapshotPersister>,
    clock: Arc<dyn Clock>,
    collection_playlist_id: i64,
}

impl ChangeApplier {
    pub fn new(
        client: Arc<dyn PlatformClient>,
        playlists: Arc<dyn PlaylistRepository>,
        link_manager: Arc<LinkManager>,
        persister: Arc<SnapshotPersister>,
        clock: Arc<dyn Clock>,
        collection_playlist_id: i64,
    ) -> Self {
        Self {
            client,
            playlists,
            link_manager,
            persister,
            clock,
            collection_playlist_id,
        }
    }

    fn platform(&self) -> PlatformKind {
        self.client.platform()
    }

    /// Apply the selected changes of `changes`
    ///
    /// `selection` overrides each change's `selected` flag by change id.
    ///
    /// # Errors
    /// `NotFound` when the playlist has no link on this platform. Everything
    /// else is reported on the returned result.
    #[instrument(skip(self, changes, selection), fields(platform = %self.platform()))]
    pub async fn apply(
        &self,
        playlist_id: i64,
        changes: &ChangeSet,
        selection: &HashMap<String, bool>,
    ) -> Result<SyncResult> {
        let platform = self.platform();
        let link = self
            .playlists
            .get_platform_link(playlist_id, platform)
            .await?
            .ok_or_else(|| {
                SyncError::not_found("PlaylistPlatformLink", format!("{}:{}", playlist_id, platform))
            })?;

        let mut result = SyncResult::new(playlist_id);

        if let Err(e) = self.ensure_authenticated().await {
            result.errors.push(e.to_string());
            return Ok(result);
        }

        let is_selected =
            |change: &SyncChange| selection.get(&change.id).copied().unwrap_or(change.selected);

        for change in changes.platform_additions.iter().filter(|c| is_selected(c)) {
            self.apply_platform_addition(playlist_id, change, &mut result)
                .await;
        }

        for change in changes.platform_removals.iter().filter(|c| is_selected(c)) {
            self.apply_platform_removal(playlist_id, change, &mut result)
                .await;
        }

        let library_additions: Vec<&SyncChange> = changes
            .library_additions
            .iter()
            .filter(|c| is_selected(c))
            .collect();
        let library_removals: Vec<&SyncChange> = changes
            .library_removals
            .iter()
            .filter(|c| is_selected(c))
            .collect();

        if link.is_personal_playlist {
            let added = self
                .apply_batch(&link, BatchKind::Add, &library_additions, &mut result)
                .await;
            let removed = self
                .apply_batch(&link, BatchKind::Remove, &library_removals, &mut result)
                .await;
            result.library_added = added;
            result.library_removed = removed;
        } else if !library_additions.is_empty() || !library_removals.is_empty() {
            result.warnings.push(format!(
                "Skipped {} library changes: the {} playlist is read-only",
                library_additions.len() + library_removals.len(),
                platform
            ));
        }

        if result.total_applied() > 0 {
            match self.persister.save_sync_snapshot(playlist_id).await {
                Ok(_) => result.snapshot_saved = true,
                Err(e) => {
                    warn!(playlist_id, error = %e, "Changes applied but snapshot not saved");
                    result.warnings.push(format!(
                        "Changes were applied but the sync snapshot could not be saved: {}",
                        e
                    ));
                }
            }
        }

        info!(
            playlist_id,
            platform_added = result.platform_added,
            platform_removed = result.platform_removed,
            library_added = result.library_added,
            library_removed = result.library_removed,
            warnings = result.warnings.len(),
            errors = result.errors.len(),
            "Applied sync changes"
        );

        Ok(result)
    }

    async fn ensure_authenticated(&self) -> Result<()> {
        if self.client.is_authenticated().await || self.client.authenticate().await? {
            return Ok(());
        }
        Err(SyncError::NotAuthenticated(self.platform()))
    }

    async fn apply_platform_addition(
        &self,
        playlist_id: i64,
        change: &SyncChange,
        result: &mut SyncResult,
    ) {
        let Some(external) = &change.track else {
            result.warnings.push(format!(
                "No remote track data for {}",
                change.display_name()
            ));
            return;
        };

        let outcome = async {
            let track = self.link_manager.import_track(external).await?;
            let added_at = change.added_at.unwrap_or_else(|| self.clock.now());
            self.playlists
                .add_track(playlist_id, track.id, added_at)
                .await?;
            if self.collection_playlist_id != playlist_id
                && !self
                    .playlists
                    .contains_track(self.collection_playlist_id, track.id)
                    .await?
            {
                self.playlists
                    .add_track(self.collection_playlist_id, track.id, added_at)
                    .await?;
            }
            Ok::<_, SyncError>(track.id)
        }
        .await;

        match outcome {
            Ok(track_id) => {
                debug!(change_id = %change.id, track_id, "Applied platform addition");
                result.platform_added += 1;
            }
            Err(e) => {
                warn!(change_id = %change.id, error = %e, "Platform addition failed");
                result
                    .warnings
                    .push(format!("Failed to import {}: {}", change.display_name(), e));
            }
        }
    }

    async fn apply_platform_removal(
        &self,
        playlist_id: i64,
        change: &SyncChange,
        result: &mut SyncResult,
    ) {
        let Some(track_id) = change.library_id else {
            debug!(change_id = %change.id, "Removed remote track was never imported");
            return;
        };

        match self.playlists.remove_track(playlist_id, track_id).await {
            Ok(true) => result.platform_removed += 1,
            Ok(false) => {
                debug!(change_id = %change.id, track_id, "Track already absent from playlist")
            }
            Err(e) => result.warnings.push(format!(
                "Failed to remove {} from the playlist: {}",
                change.display_name(),
                e
            )),
        }
    }

    /// One add or remove call for all selected library changes
    ///
    /// Returns how many tracks the call covered.
    async fn apply_batch(
        &self,
        link: &PlaylistPlatformLink,
        kind: BatchKind,
        changes: &[&SyncChange],
        result: &mut SyncResult,
    ) -> usize {
        let mut ids = Vec::with_capacity(changes.len());
        for change in changes {
            match change.preferred_platform_id() {
                Some(id) => ids.push(id.to_string()),
                None => result.warnings.push(format!(
                    "Skipped {}: not linked on {}",
                    change.display_name(),
                    link.platform
                )),
            }
        }

        if ids.is_empty() {
            return 0;
        }

        let (call, verb) = match kind {
            BatchKind::Add => (
                self.client
                    .add_tracks_to_playlist(&link.platform_id, &ids)
                    .await,
                "add",
            ),
            BatchKind::Remove => (
                self.client
                    .remove_tracks_from_playlist(&link.platform_id, &ids)
                    .await,
                "remove",
            ),
        };

        match call {
            Ok(true) => ids.len(),
            Ok(false) => {
                result.errors.push(format!(
                    "{} rejected the request to {} {} tracks",
                    link.platform,
                    verb,
                    ids.len()
                ));
                0
            }
            Err(e) => {
                result.errors.push(format!(
                    "Failed to {} {} tracks on {}: {}",
                    verb,
                    ids.len(),
                    link.platform,
                    e
                ));
                0
            }
        }
    }
}
