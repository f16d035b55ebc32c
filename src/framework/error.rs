//! # Error Types
//!
//! Every fallible seam of the core has its own error enum. None of them ever
//! escapes a lifecycle transition, a dispatcher loop or a collection mutation:
//! those paths log the error through the Log Pipeline and carry on. They are
//! returned only where a caller can act on them (registry lookups, snapshot
//! reads, inflating a record).

use crate::framework::{PluginId, PluginKind};
use std::path::PathBuf;

/// Errors raised by plugin hooks, inflate and autodetect functions.
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error("{0}")]
    Failed(String),
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PluginError {
    pub fn failed(msg: impl Into<String>) -> Self {
        PluginError::Failed(msg.into())
    }
}

impl From<String> for PluginError {
    fn from(msg: String) -> Self {
        PluginError::Failed(msg)
    }
}

/// Errors raised by the plugin registry.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum RegistryError {
    #[error("No plugin class registered with id {0}")]
    UnknownId(PluginId),
    #[error("No plugin class registered with type tag {0:?}")]
    UnknownTag(String),
    #[error("Registry is frozen, cannot register {0:?}")]
    Frozen(String),
}

/// Errors raised while reading, decoding or writing a persisted snapshot.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("No saved configuration at {0}")]
    NotFound(PathBuf),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Corrupt configuration: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("Could not inflate {type_tag:?}: {source}")]
    Inflate {
        type_tag: String,
        #[source]
        source: PluginError,
    },
    #[error("Record {type_tag:?} is not a {expected}")]
    UnexpectedKind { type_tag: String, expected: PluginKind },
}

/// Errors returned by the public [`Core`](crate::lifecycle::Core) API.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Core is already started")]
    AlreadyStarted,
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Plugin(#[from] PluginError),
}
