//! # Plugin Registry
//!
//! Assigns every plugin class a dense, process-scoped identifier and resolves
//! identifiers and persisted type tags back to the class. The registry only
//! grows; once module discovery is over it is frozen and becomes read-only.
//!
//! A class is identified by its type tag. Registering the same tag again
//! returns the identifier it already has.

pub mod loader;

pub use loader::*;

use crate::framework::{PluginError, PluginId, PluginInstance, PluginKind, RegistryError};
use crate::lifecycle::CoreHandle;
use crate::persistence::DeflatedRecord;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{PoisonError, RwLock};
use tracing::{debug, warn};

/// Identifier handed to the first registered class.
pub const FIRST_CLASS_ID: PluginId = 1;

/// Reconstructs an instance from its deflated record.
pub type InflateFn = fn(&CoreHandle, &DeflatedRecord) -> Result<PluginInstance, PluginError>;

/// Probes for instances of a class that can be set up without configuration.
pub type AutodetectFn = fn(&CoreHandle) -> Result<Vec<PluginInstance>, PluginError>;

/// Descriptor of a loadable plugin type.
pub struct PluginClass {
    pub kind: PluginKind,
    /// Persisted with every deflated instance of this class.
    pub type_tag: &'static str,
    pub inflate: InflateFn,
    pub autodetect: Option<AutodetectFn>,
}

impl PluginClass {
    pub fn can_autodetect(&self) -> bool {
        self.autodetect.is_some()
    }
}

impl fmt::Debug for PluginClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginClass")
            .field("kind", &self.kind)
            .field("type_tag", &self.type_tag)
            .field("can_autodetect", &self.can_autodetect())
            .finish()
    }
}

#[derive(Default)]
struct RegistryState {
    classes: Vec<&'static PluginClass>,
    by_tag: HashMap<&'static str, PluginId>,
}

pub struct PluginRegistry {
    state: RwLock<RegistryState>,
    frozen: AtomicBool,
    next_instance_id: AtomicI64,
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
            frozen: AtomicBool::new(false),
            next_instance_id: AtomicI64::new(1),
        }
    }

    pub fn register(&self, class: &'static PluginClass) -> Result<PluginId, RegistryError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(&id) = state.by_tag.get(class.type_tag) {
            let known = state.classes[(id - FIRST_CLASS_ID) as usize];
            if !std::ptr::eq(known, class) {
                warn!(type_tag = class.type_tag, id, "Type tag already registered by another class");
            }
            return Ok(id);
        }
        if self.is_frozen() {
            return Err(RegistryError::Frozen(class.type_tag.to_string()));
        }
        let id = FIRST_CLASS_ID + state.classes.len() as PluginId;
        state.classes.push(class);
        state.by_tag.insert(class.type_tag, id);
        debug!(type_tag = class.type_tag, kind = %class.kind, id, "Registered class");
        Ok(id)
    }

    pub fn resolve(&self, id: PluginId) -> Result<&'static PluginClass, RegistryError> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        id.checked_sub(FIRST_CLASS_ID)
            .and_then(|idx| usize::try_from(idx).ok())
            .and_then(|idx| state.classes.get(idx).copied())
            .ok_or(RegistryError::UnknownId(id))
    }

    pub fn resolve_tag(&self, type_tag: &str) -> Result<&'static PluginClass, RegistryError> {
        let id = self
            .id_of(type_tag)
            .ok_or_else(|| RegistryError::UnknownTag(type_tag.to_string()))?;
        self.resolve(id)
    }

    pub fn id_of(&self, type_tag: &str) -> Option<PluginId> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_tag
            .get(type_tag)
            .copied()
    }

    /// Registered classes of one kind, in registration order.
    pub fn classes_of(&self, kind: PluginKind) -> Vec<&'static PluginClass> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .classes
            .iter()
            .copied()
            .filter(|c| c.kind == kind)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.state.read().unwrap_or_else(PoisonError::into_inner).classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn freeze(&self) {
        if !self.frozen.swap(true, Ordering::SeqCst) {
            debug!(classes = self.len(), "Registry frozen");
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::SeqCst)
    }

    /// Fresh identifier for a plugin instance.
    pub fn allocate_instance_id(&self) -> PluginId {
        self.next_instance_id.fetch_add(1, Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::mock::{MOCK_FRONTEND_CLASS, MOCK_WORKER_CLASS};

    #[test]
    fn registering_twice_returns_the_same_id() {
        let registry = PluginRegistry::new();
        let first = registry.register(&MOCK_WORKER_CLASS).unwrap();
        let second = registry.register(&MOCK_FRONTEND_CLASS).unwrap();
        assert_eq!(first, FIRST_CLASS_ID);
        assert_eq!(second, FIRST_CLASS_ID + 1);
        assert_eq!(registry.register(&MOCK_WORKER_CLASS).unwrap(), first);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn resolve_inverts_register() {
        let registry = PluginRegistry::new();
        let id = registry.register(&MOCK_FRONTEND_CLASS).unwrap();
        assert_eq!(registry.resolve(id).unwrap().type_tag, MOCK_FRONTEND_CLASS.type_tag);
        assert_eq!(
            registry.resolve_tag(MOCK_FRONTEND_CLASS.type_tag).unwrap().kind,
            PluginKind::Frontend
        );
    }

    #[test]
    fn unknown_ids_fail_lookup() {
        let registry = PluginRegistry::new();
        registry.register(&MOCK_FRONTEND_CLASS).unwrap();
        assert!(matches!(registry.resolve(0), Err(RegistryError::UnknownId(0))));
        assert!(matches!(registry.resolve(-3), Err(RegistryError::UnknownId(-3))));
        assert!(matches!(registry.resolve(99), Err(RegistryError::UnknownId(99))));
        assert!(matches!(registry.resolve_tag("nope"), Err(RegistryError::UnknownTag(_))));
    }

    #[test]
    fn frozen_registry_only_answers_for_known_classes() {
        let registry = PluginRegistry::new();
        let id = registry.register(&MOCK_FRONTEND_CLASS).unwrap();
        registry.freeze();
        assert_eq!(registry.register(&MOCK_FRONTEND_CLASS), Ok(id));
        assert!(matches!(registry.register(&MOCK_WORKER_CLASS), Err(RegistryError::Frozen(_))));
    }

    #[test]
    fn instance_ids_are_unique() {
        let registry = PluginRegistry::new();
        let a = registry.allocate_instance_id();
        let b = registry.allocate_instance_id();
        assert_ne!(a, b);
    }
}
