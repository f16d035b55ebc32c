//! # Work Source Group
//!
//! The built-in interior node of the work-source tree. A group owns an
//! ordered list of child work sources, is the parent of each of them, and
//! starts and stops them in order. A failing child is logged and skipped.
//!
//! A freshly built core always has a group named [`DEFAULT_ROOT_NAME`] as its
//! root until a snapshot or the caller installs another one.

use crate::framework::{
    same_instance, ParentLink, Plugin, PluginError, PluginId, PluginInstance, PluginKind, Settings, Statistics,
    WorkSource,
};
use crate::lifecycle::CoreHandle;
use crate::persistence::DeflatedRecord;
use crate::pipeline::{LogLevel, LogPipeline};
use crate::registry::PluginClass;
use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError, Weak};

pub const WORK_SOURCE_GROUP_TAG: &str = "worksourcegroup";

/// Name of the root group a core starts out with.
pub const DEFAULT_ROOT_NAME: &str = "Work sources";

pub static WORK_SOURCE_GROUP_CLASS: PluginClass = PluginClass {
    kind: PluginKind::WorkSource,
    type_tag: WORK_SOURCE_GROUP_TAG,
    inflate: inflate_group,
    autodetect: None,
};

pub struct WorkSourceGroup {
    id: PluginId,
    settings: Mutex<Settings>,
    me: Weak<WorkSourceGroup>,
    parent: ParentLink,
    children: Mutex<Vec<Arc<dyn WorkSource>>>,
    log: Arc<LogPipeline>,
}

impl WorkSourceGroup {
    pub fn new(handle: &CoreHandle, settings: Settings) -> Arc<Self> {
        let id = handle.allocate_id();
        let log = Arc::clone(handle.log_pipeline());
        Arc::new_cyclic(|me| Self {
            id,
            settings: Mutex::new(settings),
            me: me.clone(),
            parent: ParentLink::default(),
            children: Mutex::new(Vec::new()),
            log,
        })
    }

    pub fn named(handle: &CoreHandle, name: &str) -> Arc<Self> {
        Self::new(handle, Settings::named(name))
    }

    fn as_parent(&self) -> Option<Arc<dyn WorkSource>> {
        self.me.upgrade().map(|me| me as Arc<dyn WorkSource>)
    }

    /// Appends `child` and makes this group its parent. No-op if already a child.
    pub fn add_child(&self, child: Arc<dyn WorkSource>) -> bool {
        let mut children = self.children.lock().unwrap_or_else(PoisonError::into_inner);
        if children.iter().any(|c| same_instance(c, &child)) {
            return false;
        }
        child.set_parent(self.as_parent().as_ref());
        children.push(child);
        true
    }

    /// Detaches `child`. Returns whether it was a child of this group.
    pub fn remove_child(&self, child: &Arc<dyn WorkSource>) -> bool {
        let mut children = self.children.lock().unwrap_or_else(PoisonError::into_inner);
        let before = children.len();
        children.retain(|c| !same_instance(c, child));
        let removed = children.len() != before;
        if removed {
            child.set_parent(None);
        }
        removed
    }

    fn snapshot_children(&self) -> Vec<Arc<dyn WorkSource>> {
        self.children.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl Plugin for WorkSourceGroup {
    fn id(&self) -> PluginId {
        self.id
    }

    fn type_tag(&self) -> &'static str {
        WORK_SOURCE_GROUP_TAG
    }

    fn settings(&self) -> Settings {
        self.settings.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    async fn start(&self) -> Result<(), PluginError> {
        for child in self.snapshot_children() {
            if let Err(e) = child.start().await {
                self.log.log(
                    &self.source(),
                    format!("Error while starting up work source {}: {e}\n", child.name()),
                    LogLevel::ERROR,
                    "rB",
                );
            }
        }
        Ok(())
    }

    async fn stop(&self) -> Result<(), PluginError> {
        for child in self.snapshot_children() {
            if let Err(e) = child.stop().await {
                self.log.log(
                    &self.source(),
                    format!("Error while shutting down work source {}: {e}\n", child.name()),
                    LogLevel::ERROR,
                    "rB",
                );
            }
        }
        Ok(())
    }

    fn get_statistics(&self) -> Statistics {
        let children: Vec<Statistics> = self.snapshot_children().iter().map(|c| c.get_statistics()).collect();
        let mut stats = Statistics::new(self.name()).with_value("children", children.len());
        stats.children = children;
        stats
    }

    fn deflate(&self) -> DeflatedRecord {
        let children = self.snapshot_children().iter().map(|c| c.deflate()).collect();
        DeflatedRecord::new(WORK_SOURCE_GROUP_TAG, self.settings()).with_children(children)
    }
}

impl WorkSource for WorkSourceGroup {
    fn parent(&self) -> Option<Arc<dyn WorkSource>> {
        self.parent.get()
    }

    fn set_parent(&self, parent: Option<&Arc<dyn WorkSource>>) {
        self.parent.set(parent);
    }

    fn children(&self) -> Vec<Arc<dyn WorkSource>> {
        self.snapshot_children()
    }
}

fn inflate_group(handle: &CoreHandle, record: &DeflatedRecord) -> Result<PluginInstance, PluginError> {
    let group = WorkSourceGroup::new(handle, record.settings.clone());
    for child_record in &record.children {
        let name = &child_record.settings.name;
        let child = handle
            .inflate(child_record)
            .map_err(|e| PluginError::InvalidSettings(format!("child {name:?}: {e}")))?
            .into_work_source()
            .ok_or_else(|| PluginError::InvalidSettings(format!("child {name:?} is not a work source")))?;
        group.add_child(child);
    }
    Ok(PluginInstance::WorkSource(group))
}
