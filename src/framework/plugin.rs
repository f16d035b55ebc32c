//! # Plugin Contracts
//!
//! The four plugin kinds the core manages, expressed as trait objects:
//!
//! - [`Frontend`]: operator-facing sinks (log output, configuration UI, event handling).
//! - [`Worker`]: a unit of hashing capacity.
//! - [`Blockchain`]: a chain/network definition workers produce results for.
//! - [`WorkSource`]: a node of the work-source tree.
//!
//! All of them share the [`Plugin`] supertrait: an instance id, a settings
//! record, async `start`/`stop` hooks and the `deflate` half of the
//! persistence round-trip. Capability flags are plain trait methods instead of
//! attribute probing, so a frontend that does not log simply keeps the
//! default `false`.
//!
//! Instances are shared as `Arc<dyn Trait>` and use interior mutability; the
//! core identifies them by address (see [`same_instance`]), never by value.

use crate::framework::{PluginError, Statistics};
use crate::persistence::DeflatedRecord;
use crate::pipeline::{EventRecord, LogRecord};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, Weak};

/// Process-scoped identifier of a plugin class or plugin instance.
pub type PluginId = i64;

/// The closed set of plugin kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PluginKind {
    Frontend,
    Worker,
    Blockchain,
    WorkSource,
}

impl fmt::Display for PluginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PluginKind::Frontend => "frontend",
            PluginKind::Worker => "worker",
            PluginKind::Blockchain => "blockchain",
            PluginKind::WorkSource => "work source",
        };
        f.write_str(name)
    }
}

/// The persisted settings of a plugin instance.
///
/// `name` is the only field the core interprets; everything else is
/// type-specific and travels opaquely in `options`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub name: String,
    #[serde(default)]
    pub options: serde_json::Map<String, serde_json::Value>,
}

impl Settings {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: serde_json::Map::new(),
        }
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn flag(&self, key: &str) -> bool {
        self.options.get(key).and_then(|v| v.as_bool()).unwrap_or(false)
    }
}

/// Identity of whoever produced a log line or an event.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LogSource {
    pub id: PluginId,
    pub name: String,
}

impl LogSource {
    pub fn new(id: PluginId, name: impl Into<String>) -> Self {
        Self { id, name: name.into() }
    }
}

/// Behaviour shared by every plugin kind.
#[async_trait]
pub trait Plugin: Send + Sync + 'static {
    /// Instance id, handed out by [`CoreHandle::allocate_id`](crate::lifecycle::CoreHandle::allocate_id).
    fn id(&self) -> PluginId;

    /// Stable type tag; must match the tag of the class that inflates it.
    fn type_tag(&self) -> &'static str;

    /// Snapshot of the current settings.
    fn settings(&self) -> Settings;

    fn name(&self) -> String {
        self.settings().name
    }

    fn source(&self) -> LogSource {
        LogSource::new(self.id(), self.name())
    }

    async fn start(&self) -> Result<(), PluginError> {
        Ok(())
    }

    async fn stop(&self) -> Result<(), PluginError> {
        Ok(())
    }

    fn get_statistics(&self) -> Statistics {
        Statistics::new(self.name())
    }

    /// Serializable, tagged representation of this instance.
    fn deflate(&self) -> DeflatedRecord {
        DeflatedRecord::new(self.type_tag(), self.settings())
    }
}

/// Operator-facing plugin: a log sink, a configuration UI, an event sink, or any mix.
#[async_trait]
pub trait Frontend: Plugin {
    fn can_log(&self) -> bool {
        false
    }

    fn can_configure(&self) -> bool {
        false
    }

    fn can_handle_events(&self) -> bool {
        false
    }

    async fn write_log_message(&self, _record: &LogRecord) -> Result<(), PluginError> {
        Ok(())
    }

    async fn handle_stats_event(&self, _event: &EventRecord) -> Result<(), PluginError> {
        Ok(())
    }
}

/// A unit of hashing capacity.
pub trait Worker: Plugin {}

/// A chain/network definition.
pub trait Blockchain: Plugin {}

/// A node of the work-source tree.
///
/// The parent link is non-owning; children are owned by their parent.
pub trait WorkSource: Plugin {
    fn parent(&self) -> Option<Arc<dyn WorkSource>>;

    fn set_parent(&self, parent: Option<&Arc<dyn WorkSource>>);

    fn children(&self) -> Vec<Arc<dyn WorkSource>> {
        Vec::new()
    }
}

/// Non-owning back-reference to a parent work source.
///
/// Implementors of [`WorkSource`] embed one and forward `parent`/`set_parent` to it.
#[derive(Default)]
pub struct ParentLink {
    parent: Mutex<Option<Weak<dyn WorkSource>>>,
}

impl ParentLink {
    pub fn get(&self) -> Option<Arc<dyn WorkSource>> {
        self.parent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(Weak::upgrade)
    }

    pub fn set(&self, parent: Option<&Arc<dyn WorkSource>>) {
        *self.parent.lock().unwrap_or_else(PoisonError::into_inner) = parent.map(Arc::downgrade);
    }
}

/// A live plugin instance of any kind, as produced by inflate and autodetect.
#[derive(Clone)]
pub enum PluginInstance {
    Frontend(Arc<dyn Frontend>),
    Worker(Arc<dyn Worker>),
    Blockchain(Arc<dyn Blockchain>),
    WorkSource(Arc<dyn WorkSource>),
}

impl PluginInstance {
    pub fn kind(&self) -> PluginKind {
        match self {
            PluginInstance::Frontend(_) => PluginKind::Frontend,
            PluginInstance::Worker(_) => PluginKind::Worker,
            PluginInstance::Blockchain(_) => PluginKind::Blockchain,
            PluginInstance::WorkSource(_) => PluginKind::WorkSource,
        }
    }

    pub fn name(&self) -> String {
        match self {
            PluginInstance::Frontend(p) => p.name(),
            PluginInstance::Worker(p) => p.name(),
            PluginInstance::Blockchain(p) => p.name(),
            PluginInstance::WorkSource(p) => p.name(),
        }
    }

    pub fn into_frontend(self) -> Option<Arc<dyn Frontend>> {
        match self {
            PluginInstance::Frontend(p) => Some(p),
            _ => None,
        }
    }

    pub fn into_worker(self) -> Option<Arc<dyn Worker>> {
        match self {
            PluginInstance::Worker(p) => Some(p),
            _ => None,
        }
    }

    pub fn into_blockchain(self) -> Option<Arc<dyn Blockchain>> {
        match self {
            PluginInstance::Blockchain(p) => Some(p),
            _ => None,
        }
    }

    pub fn into_work_source(self) -> Option<Arc<dyn WorkSource>> {
        match self {
            PluginInstance::WorkSource(p) => Some(p),
            _ => None,
        }
    }
}

impl fmt::Debug for PluginInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginInstance")
            .field("kind", &self.kind())
            .field("name", &self.name())
            .finish()
    }
}

/// Identity comparison for shared plugin instances.
///
/// Compares data addresses only; two `Arc<dyn _>` to the same allocation are
/// the same instance even if their vtable pointers differ.
pub fn same_instance<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}
