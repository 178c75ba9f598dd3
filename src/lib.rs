//! Workspace placeholder crate.
//!
//! This crate exposes feature flags that map to the individual workspace
//! crates. Host applications can depend on `playlist-sync-workspace` and pick
//! either the full service façade (`service`) or just the sync engine and
//! library storage (`engine-only`) without wiring each crate individually.

#[cfg(feature = "service")]
pub use core_service as service;

#[cfg(feature = "engine-only")]
pub use core_library as library;
#[cfg(feature = "engine-only")]
pub use core_sync as sync;
