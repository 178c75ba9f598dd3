//! Change sets and apply results

use bridge_traits::{ExternalTrack, PlatformKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Direction and kind of a proposed change
///
/// "Platform" changes flow from the remote playlist into the library;
/// "library" changes flow from the local playlist to the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    /// Track appeared remotely; add it locally
    PlatformAddition,
    /// Track vanished remotely; remove it from the local playlist
    PlatformRemoval,
    /// Track appeared locally; add it remotely
    LibraryAddition,
    /// Track vanished locally; remove it remotely
    LibraryRemoval,
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeType::PlatformAddition => "platform_addition",
            ChangeType::PlatformRemoval => "platform_removal",
            ChangeType::LibraryAddition => "library_addition",
            ChangeType::LibraryRemoval => "library_removal",
        };
        write!(f, "{}", s)
    }
}

/// One proposed change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncChange {
    /// Fresh per computation; used as the selection key
    pub id: String,
    pub change_type: ChangeType,
    /// Local track, when known
    pub library_id: Option<i64>,
    /// Opaque platform id, when known
    pub platform_id: Option<String>,
    /// URI-style platform id, when the platform has one
    pub uri: Option<String>,
    pub title: String,
    pub artist: String,
    pub added_at: Option<DateTime<Utc>>,
    pub selected: bool,
    /// Remote track to import, for platform additions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track: Option<ExternalTrack>,
}

impl SyncChange {
    pub fn new(change_type: ChangeType, title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            change_type,
            library_id: None,
            platform_id: None,
            uri: None,
            title: title.into(),
            artist: artist.into(),
            added_at: None,
            selected: true,
            track: None,
        }
    }

    pub fn with_library_id(mut self, library_id: Option<i64>) -> Self {
        self.library_id = library_id;
        self
    }

    pub fn with_platform_id(mut self, platform_id: Option<String>, uri: Option<String>) -> Self {
        self.platform_id = platform_id;
        self.uri = uri;
        self
    }

    pub fn with_added_at(mut self, added_at: Option<DateTime<Utc>>) -> Self {
        self.added_at = added_at;
        self
    }

    pub fn with_track(mut self, track: ExternalTrack) -> Self {
        self.track = Some(track);
        self
    }

    /// Identifier to send to the platform: the URI when present
    pub fn preferred_platform_id(&self) -> Option<&str> {
        self.uri
            .as_deref()
            .filter(|uri| !uri.is_empty())
            .or(self.platform_id.as_deref())
            .filter(|id| !id.is_empty())
    }

    pub fn display_name(&self) -> String {
        core_library::models::display_name(&self.artist, &self.title)
    }
}

/// Proposed changes for one playlist link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub playlist_id: i64,
    pub platform: PlatformKind,
    pub platform_additions: Vec<SyncChange>,
    pub platform_removals: Vec<SyncChange>,
    pub library_additions: Vec<SyncChange>,
    pub library_removals: Vec<SyncChange>,
    /// Computed against no stored snapshot
    pub is_first_sync: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ChangeSet {
    pub fn new(playlist_id: i64, platform: PlatformKind) -> Self {
        Self {
            playlist_id,
            platform,
            platform_additions: Vec::new(),
            platform_removals: Vec::new(),
            library_additions: Vec::new(),
            library_removals: Vec::new(),
            is_first_sync: false,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub(crate) fn with_error(mut self, error: impl Into<String>) -> Self {
        self.errors.push(error.into());
        self
    }

    /// Push a change into the list for its type
    pub fn push(&mut self, change: SyncChange) {
        match change.change_type {
            ChangeType::PlatformAddition => self.platform_additions.push(change),
            ChangeType::PlatformRemoval => self.platform_removals.push(change),
            ChangeType::LibraryAddition => self.library_additions.push(change),
            ChangeType::LibraryRemoval => self.library_removals.push(change),
        }
    }

    /// No change in any of the four categories
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn total(&self) -> usize {
        self.platform_additions.len()
            + self.platform_removals.len()
            + self.library_additions.len()
            + self.library_removals.len()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn changes(&self) -> impl Iterator<Item = &SyncChange> {
        self.platform_additions
            .iter()
            .chain(&self.platform_removals)
            .chain(&self.library_additions)
            .chain(&self.library_removals)
    }

    fn changes_mut(&mut self) -> impl Iterator<Item = &mut SyncChange> {
        self.platform_additions
            .iter_mut()
            .chain(self.platform_removals.iter_mut())
            .chain(self.library_additions.iter_mut())
            .chain(self.library_removals.iter_mut())
    }

    pub fn find(&self, change_id: &str) -> Option<&SyncChange> {
        self.changes().find(|c| c.id == change_id)
    }

    /// Override `selected` for every change named in `selection`
    ///
    /// Changes missing from the map keep their current flag.
    pub fn apply_selection(&mut self, selection: &HashMap<String, bool>) {
        for change in self.changes_mut() {
            if let Some(selected) = selection.get(&change.id) {
                change.selected = *selected;
            }
        }
    }

    pub fn select_all(&mut self) {
        for change in self.changes_mut() {
            change.selected = true;
        }
    }
}

/// Outcome of applying a change set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    pub playlist_id: i64,
    pub platform_added: usize,
    pub platform_removed: usize,
    pub library_added: usize,
    pub library_removed: usize,
    /// A fresh snapshot was stored after applying
    pub snapshot_saved: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl SyncResult {
    pub fn new(playlist_id: i64) -> Self {
        Self {
            playlist_id,
            ..Default::default()
        }
    }

    /// No errors were recorded; warnings do not count
    pub fn success(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn total_applied(&self) -> usize {
        self.platform_added + self.platform_removed + self.library_added + self.library_removed
    }
}
