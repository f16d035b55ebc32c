//! # Module Loader
//!
//! Plugin modules announce themselves at build time with
//! [`submit_plugin_module!`](crate::submit_plugin_module) (collected through
//! `inventory`) or are handed to the [`CoreBuilder`](crate::lifecycle::CoreBuilder)
//! explicitly. Discovery asks every module for its exported class lists.
//!
//! A module that fails or panics while exporting is logged and skipped; it
//! never keeps the remaining modules from loading.

use crate::framework::{LogSource, PluginError};
use crate::lifecycle::CoreHandle;
use crate::pipeline::LogLevel;
use crate::registry::{PluginClass, PluginRegistry};
use crate::worksource::WORK_SOURCE_GROUP_CLASS;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

/// Produces the class lists a module exports.
pub type ExportsFn = fn() -> Result<PluginClasses, PluginError>;

/// A discoverable plugin module, addressed as `maintainer.name`.
#[derive(Debug, Clone, Copy)]
pub struct PluginModule {
    pub maintainer: &'static str,
    pub name: &'static str,
    pub exports: ExportsFn,
}

impl PluginModule {
    pub fn path(&self) -> String {
        format!("{}.{}", self.maintainer, self.name)
    }
}

inventory::collect!(PluginModule);

/// Registers a plugin module for discovery.
///
/// ```rust,ignore
/// fn exports() -> Result<PluginClasses, PluginError> {
///     Ok(PluginClasses::default().worker(&CPU_MINER_CLASS))
/// }
/// hashvisor::submit_plugin_module!("theseven", "cpuminer", exports);
/// ```
#[macro_export]
macro_rules! submit_plugin_module {
    ($maintainer:expr, $name:expr, $exports:path) => {
        $crate::inventory::submit! {
            $crate::registry::PluginModule {
                maintainer: $maintainer,
                name: $name,
                exports: $exports,
            }
        }
    };
}

/// Class lists, one per plugin kind, in discovery order.
#[derive(Debug, Clone, Default)]
pub struct PluginClasses {
    pub frontends: Vec<&'static PluginClass>,
    pub workers: Vec<&'static PluginClass>,
    pub work_sources: Vec<&'static PluginClass>,
    pub blockchains: Vec<&'static PluginClass>,
}

impl PluginClasses {
    pub fn frontend(mut self, class: &'static PluginClass) -> Self {
        self.frontends.push(class);
        self
    }

    pub fn worker(mut self, class: &'static PluginClass) -> Self {
        self.workers.push(class);
        self
    }

    pub fn work_source(mut self, class: &'static PluginClass) -> Self {
        self.work_sources.push(class);
        self
    }

    pub fn blockchain(mut self, class: &'static PluginClass) -> Self {
        self.blockchains.push(class);
        self
    }

    pub fn extend(&mut self, other: PluginClasses) {
        self.frontends.extend(other.frontends);
        self.workers.extend(other.workers);
        self.work_sources.extend(other.work_sources);
        self.blockchains.extend(other.blockchains);
    }

    pub fn all(&self) -> impl Iterator<Item = &'static PluginClass> + '_ {
        self.frontends
            .iter()
            .chain(&self.workers)
            .chain(&self.work_sources)
            .chain(&self.blockchains)
            .copied()
    }
}

#[derive(Debug, Default)]
pub struct ModuleLoader {
    modules: Vec<PluginModule>,
}

impl ModuleLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loader over every module submitted through `inventory`.
    pub fn from_inventory() -> Self {
        let mut loader = Self::new();
        loader.add_inventory();
        loader
    }

    /// Adds every module submitted with [`submit_plugin_module!`](crate::submit_plugin_module).
    pub fn add_inventory(&mut self) {
        for module in inventory::iter::<PluginModule> {
            self.add(*module);
        }
    }

    /// Adds a module; a second module with the same path is ignored.
    pub fn add(&mut self, module: PluginModule) {
        let duplicate = self
            .modules
            .iter()
            .any(|m| m.maintainer == module.maintainer && m.name == module.name);
        if !duplicate {
            self.modules.push(module);
        }
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Collects the exported classes of every module, in `maintainer.name` order.
    ///
    /// The built-in work source group always comes first among work-source classes.
    pub fn discover(&self, handle: &CoreHandle, source: &LogSource) -> PluginClasses {
        let mut classes = PluginClasses::default().work_source(&WORK_SOURCE_GROUP_CLASS);

        let mut modules = self.modules.clone();
        modules.sort_by(|a, b| (a.maintainer, a.name).cmp(&(b.maintainer, b.name)));

        for module in modules {
            handle.log(source, format!("Loading modules.{}...\n", module.path()), LogLevel::TRACE, "");
            let result = match panic::catch_unwind(AssertUnwindSafe(module.exports)) {
                Ok(result) => result,
                Err(payload) => Err(PluginError::failed(format!("panicked: {}", panic_message(&*payload)))),
            };
            match result {
                Ok(exports) => classes.extend(exports),
                Err(e) => handle.log(
                    source,
                    format!("Could not load module {}: {e}\n", module.path()),
                    LogLevel::WARNING,
                    "yB",
                ),
            }
        }
        classes
    }

    /// Registers every discovered class. A class the registry rejects is logged and skipped.
    pub fn register_all(classes: &PluginClasses, registry: &PluginRegistry, handle: &CoreHandle, source: &LogSource) {
        for class in classes.all() {
            if let Err(e) = registry.register(class) {
                handle.log(
                    source,
                    format!("Could not register plugin class {}: {e}\n", class.type_tag),
                    LogLevel::WARNING,
                    "yB",
                );
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::mock::{CapturedOutput, MOCK_FRONTEND_CLASS, MOCK_WORKER_CLASS};
    use crate::framework::PluginKind;

    fn good_exports() -> Result<PluginClasses, PluginError> {
        Ok(PluginClasses::default().frontend(&MOCK_FRONTEND_CLASS))
    }

    fn failing_exports() -> Result<PluginClasses, PluginError> {
        Err(PluginError::failed("missing native library"))
    }

    fn panicking_exports() -> Result<PluginClasses, PluginError> {
        panic!("module init exploded")
    }

    fn other_exports() -> Result<PluginClasses, PluginError> {
        Ok(PluginClasses::default().worker(&MOCK_WORKER_CLASS))
    }

    #[test]
    fn one_bad_module_does_not_block_the_others() {
        let out = CapturedOutput::default();
        let handle = CoreHandle::detached(Box::new(out.clone()));
        let source = LogSource::new(-1, "Core");

        let mut loader = ModuleLoader::new();
        loader.add(PluginModule { maintainer: "b", name: "broken", exports: failing_exports });
        loader.add(PluginModule { maintainer: "a", name: "frontend", exports: good_exports });
        loader.add(PluginModule { maintainer: "c", name: "panics", exports: panicking_exports });
        loader.add(PluginModule { maintainer: "d", name: "worker", exports: other_exports });
        loader.add(PluginModule { maintainer: "d", name: "worker", exports: failing_exports });
        assert_eq!(loader.len(), 4);

        let classes = loader.discover(&handle, &source);
        assert_eq!(classes.frontends.len(), 1);
        assert_eq!(classes.workers.len(), 1);
        assert_eq!(classes.work_sources[0].type_tag, WORK_SOURCE_GROUP_CLASS.type_tag);

        let registry = PluginRegistry::new();
        ModuleLoader::register_all(&classes, &registry, &handle, &source);
        assert_eq!(registry.classes_of(PluginKind::Frontend).len(), 1);
        assert_eq!(registry.classes_of(PluginKind::WorkSource).len(), 1);

        let text = out.contents();
        assert!(text.contains("Could not load module b.broken: missing native library"));
        assert!(text.contains("Could not load module c.panics: panicked: module init exploded"));
    }
}
