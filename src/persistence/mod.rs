//! # Persistence Codec
//!
//! Every plugin instance deflates to a [`DeflatedRecord`]: its type tag, its
//! settings and the records of any children it owns. A [`Snapshot`] collects
//! the records of all managed collections and is stored as JSON at
//! `<config_dir>/<instance>.cfg`.
//!
//! Restoring is all-or-nothing. [`Snapshot::restore`] inflates every record
//! before handing anything back, so a single unknown tag or failing inflate
//! rejects the whole snapshot and the caller falls back to defaults.

use crate::framework::{
    Blockchain, Frontend, PersistenceError, PluginInstance, PluginKind, Settings, WorkSource, Worker,
};
use crate::lifecycle::CoreHandle;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

/// Serializable, tagged representation of one plugin instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeflatedRecord {
    pub type_tag: String,
    pub settings: Settings,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<DeflatedRecord>,
}

impl DeflatedRecord {
    pub fn new(type_tag: impl Into<String>, settings: Settings) -> Self {
        Self {
            type_tag: type_tag.into(),
            settings,
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<DeflatedRecord>) -> Self {
        self.children = children;
        self
    }
}

/// The persisted plugin graph of one instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub frontends: Vec<DeflatedRecord>,
    pub workers: Vec<DeflatedRecord>,
    pub blockchains: Vec<DeflatedRecord>,
    pub root_work_source: Option<DeflatedRecord>,
}

/// Live instances reconstructed from a [`Snapshot`].
#[derive(Default)]
pub struct RestoredState {
    pub frontends: Vec<Arc<dyn Frontend>>,
    pub workers: Vec<Arc<dyn Worker>>,
    pub blockchains: Vec<Arc<dyn Blockchain>>,
    pub root_work_source: Option<Arc<dyn WorkSource>>,
}

impl Snapshot {
    /// Inflates every record. Any failure rejects the snapshot as a whole.
    pub fn restore(&self, handle: &CoreHandle) -> Result<RestoredState, PersistenceError> {
        let frontends = self
            .frontends
            .iter()
            .map(|r| inflate_as(handle, r, PluginKind::Frontend, PluginInstance::into_frontend))
            .collect::<Result<Vec<_>, _>>()?;
        let workers = self
            .workers
            .iter()
            .map(|r| inflate_as(handle, r, PluginKind::Worker, PluginInstance::into_worker))
            .collect::<Result<Vec<_>, _>>()?;
        let blockchains = self
            .blockchains
            .iter()
            .map(|r| inflate_as(handle, r, PluginKind::Blockchain, PluginInstance::into_blockchain))
            .collect::<Result<Vec<_>, _>>()?;
        let root_work_source = self
            .root_work_source
            .as_ref()
            .map(|r| inflate_as(handle, r, PluginKind::WorkSource, PluginInstance::into_work_source))
            .transpose()?;

        Ok(RestoredState {
            frontends,
            workers,
            blockchains,
            root_work_source,
        })
    }
}

/// Resolves the record's class through the registry and runs its inflate function.
pub fn inflate(handle: &CoreHandle, record: &DeflatedRecord) -> Result<PluginInstance, PersistenceError> {
    let class = handle.registry().resolve_tag(&record.type_tag)?;
    (class.inflate)(handle, record).map_err(|source| PersistenceError::Inflate {
        type_tag: record.type_tag.clone(),
        source,
    })
}

fn inflate_as<T: ?Sized>(
    handle: &CoreHandle,
    record: &DeflatedRecord,
    expected: PluginKind,
    pick: fn(PluginInstance) -> Option<Arc<T>>,
) -> Result<Arc<T>, PersistenceError> {
    pick(inflate(handle, record)?).ok_or_else(|| PersistenceError::UnexpectedKind {
        type_tag: record.type_tag.clone(),
        expected,
    })
}

/// On-disk location of one instance's snapshot.
///
/// Saves through one store are serialized, since they share a temporary file.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    writing: Mutex<()>,
}

impl ConfigStore {
    pub fn new(config_dir: impl AsRef<Path>, instance: &str) -> Self {
        Self {
            path: config_dir.as_ref().join(format!("{instance}.cfg")),
            writing: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        self.path.with_extension("cfg.tmp")
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Writes the snapshot next to the target and renames it into place.
    ///
    /// On failure the previous file is left untouched.
    pub fn save(&self, snapshot: &Snapshot) -> Result<(), PersistenceError> {
        let bytes = serde_json::to_vec_pretty(snapshot)?;
        let _writing = self.writing.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let temp = self.temp_path();
        if let Err(e) = fs::write(&temp, &bytes).and_then(|()| fs::rename(&temp, &self.path)) {
            if let Err(cleanup) = fs::remove_file(&temp) {
                if cleanup.kind() != io::ErrorKind::NotFound {
                    warn!(path = %temp.display(), error = %cleanup, "Could not remove temporary snapshot");
                }
            }
            return Err(e.into());
        }
        debug!(path = %self.path.display(), bytes = bytes.len(), "Snapshot written");
        Ok(())
    }

    pub fn read(&self) -> Result<Snapshot, PersistenceError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(PersistenceError::NotFound(self.path.clone()));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::mock::{
        CallJournal, CapturedOutput, MockPlugin, MOCK_BLOCKCHAIN_CLASS, MOCK_FRONTEND_CLASS, MOCK_WORKER_CLASS,
    };
    use crate::framework::{Plugin, RegistryError};
    use crate::worksource::{WorkSourceGroup, WORK_SOURCE_GROUP_CLASS};

    fn handle() -> CoreHandle {
        let handle = CoreHandle::detached(Box::new(CapturedOutput::default()));
        for class in [&WORK_SOURCE_GROUP_CLASS, &MOCK_FRONTEND_CLASS, &MOCK_WORKER_CLASS, &MOCK_BLOCKCHAIN_CLASS] {
            handle.registry().register(class).unwrap();
        }
        handle
    }

    fn sample_snapshot(handle: &CoreHandle) -> Snapshot {
        let journal = CallJournal::default();
        let root = WorkSourceGroup::named(handle, "Work sources");
        let pool = WorkSourceGroup::named(handle, "Pools");
        root.add_child(pool);
        Snapshot {
            frontends: vec![MockPlugin::builder(PluginKind::Frontend, "console")
                .logs()
                .build(handle, &journal)
                .deflate()],
            workers: vec![
                MockPlugin::builder(PluginKind::Worker, "w1").build(handle, &journal).deflate(),
                MockPlugin::builder(PluginKind::Worker, "w2")
                    .option("clock", 200)
                    .build(handle, &journal)
                    .deflate(),
            ],
            blockchains: vec![],
            root_work_source: Some(root.deflate()),
        }
    }

    #[test]
    fn saved_snapshot_reads_back_identically() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("nested"), "rig");
        let snapshot = sample_snapshot(&handle());

        store.save(&snapshot).unwrap();
        assert!(store.exists());
        assert!(!store.temp_path().exists());
        assert_eq!(store.read().unwrap(), snapshot);
    }

    #[test]
    fn restore_reproduces_deflated_records() {
        let handle = handle();
        let snapshot = sample_snapshot(&handle);
        let restored = snapshot.restore(&handle).unwrap();

        let workers: Vec<_> = restored.workers.iter().map(|w| w.deflate()).collect();
        assert_eq!(workers, snapshot.workers);
        assert_eq!(restored.frontends.len(), 1);
        assert!(restored.blockchains.is_empty());

        let root = restored.root_work_source.unwrap();
        assert_eq!(Some(root.deflate()), snapshot.root_work_source);
        assert_eq!(root.children().len(), 1);
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path(), "nobody");
        assert!(matches!(store.read(), Err(PersistenceError::NotFound(_))));
    }

    #[test]
    fn garbage_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path(), "rig");
        fs::write(store.path(), b"\x00\x01 definitely not json").unwrap();
        assert!(matches!(store.read(), Err(PersistenceError::Corrupt(_))));
    }

    #[test]
    fn unknown_tag_rejects_the_whole_snapshot() {
        let handle = handle();
        let mut snapshot = sample_snapshot(&handle);
        snapshot
            .blockchains
            .push(DeflatedRecord::new("gone.plugin", Settings::named("legacy")));
        assert!(matches!(
            snapshot.restore(&handle),
            Err(PersistenceError::Registry(RegistryError::UnknownTag(_)))
        ));
    }

    #[test]
    fn record_in_the_wrong_list_is_rejected() {
        let handle = handle();
        let worker = MockPlugin::builder(PluginKind::Worker, "w1")
            .build(&handle, &CallJournal::default())
            .deflate();
        let snapshot = Snapshot {
            frontends: vec![worker],
            ..Default::default()
        };
        assert!(matches!(
            snapshot.restore(&handle),
            Err(PersistenceError::UnexpectedKind { expected: PluginKind::Frontend, .. })
        ));
    }

    #[test]
    fn failing_inflate_is_reported_with_its_tag() {
        let handle = handle();
        let snapshot = Snapshot {
            workers: vec![MockPlugin::builder(PluginKind::Worker, "w1")
                .fail_inflate()
                .build(&handle, &CallJournal::default())
                .deflate()],
            ..Default::default()
        };
        match snapshot.restore(&handle) {
            Err(PersistenceError::Inflate { type_tag, .. }) => assert_eq!(type_tag, "mock.worker"),
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }
}
