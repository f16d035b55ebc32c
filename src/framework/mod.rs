//! Plugin contracts and the shared vocabulary of the core.
//!
//! # Main Components
//!
//! - [`Plugin`] and its four kinds: [`Frontend`], [`Worker`], [`Blockchain`], [`WorkSource`]
//! - [`PluginInstance`] - a live instance of any kind, as produced by inflate/autodetect
//! - [`Statistics`] - per-instance statistics snapshots
//! - Error types: [`PluginError`], [`RegistryError`], [`PersistenceError`], [`CoreError`]
//!
//! # Testing
//!
//! See the [`mock`] module for scriptable plugins, a call journal and a
//! capturable fallback writer.

pub mod error;
pub mod mock;
pub mod plugin;
pub mod stats;

pub use error::*;
pub use plugin::*;
pub use stats::*;
