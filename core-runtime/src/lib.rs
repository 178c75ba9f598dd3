//! # Core Runtime Module
//!
//! Runtime infrastructure shared by the sync engine crates:
//! - Logging and tracing setup
//! - Configuration management
//! - Event bus system
//!
//! ## Overview
//!
//! Nothing in here knows about playlists or tracks beyond the event payloads.
//! `core-service` wires these pieces together at bootstrap.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
