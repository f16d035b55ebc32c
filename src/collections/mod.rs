//! # Guarded Collections
//!
//! An ordered, mutex-guarded sequence of shared plugin instances. This is the
//! narrow per-collection lock: it protects the sequence itself and is only
//! ever held for short, non-awaiting critical sections. Coupling a mutation
//! to plugin start/stop is the caller's job (see
//! [`Core`](crate::lifecycle::Core)), which takes the wide start/stop lock
//! first.
//!
//! Membership is by identity ([`same_instance`]), not equality.

use crate::framework::{same_instance, Plugin};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub struct Collection<T: ?Sized> {
    items: Mutex<Vec<Arc<T>>>,
}

impl<T: ?Sized> Default for Collection<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> Collection<T> {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
        }
    }

    fn guard(&self) -> MutexGuard<'_, Vec<Arc<T>>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the members, in insertion order.
    pub fn list(&self) -> Vec<Arc<T>> {
        self.guard().clone()
    }

    pub fn contains(&self, item: &Arc<T>) -> bool {
        self.guard().iter().any(|i| same_instance(i, item))
    }

    /// Appends `item` unless it is already present. Returns whether it was added.
    pub fn insert(&self, item: Arc<T>) -> bool {
        let mut items = self.guard();
        if items.iter().any(|i| same_instance(i, &item)) {
            return false;
        }
        items.push(item);
        true
    }

    /// Removes every occurrence of `item`. Returns how many were removed.
    pub fn remove(&self, item: &Arc<T>) -> usize {
        let mut items = self.guard();
        let before = items.len();
        items.retain(|i| !same_instance(i, item));
        before - items.len()
    }

    pub fn replace_all(&self, items: Vec<Arc<T>>) {
        *self.guard() = items;
    }

    pub fn len(&self) -> usize {
        self.guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }
}

impl<T: ?Sized + Plugin> Collection<T> {
    /// First member whose settings name equals `name`.
    pub fn find_by_name(&self, name: &str) -> Option<Arc<T>> {
        self.guard().iter().find(|i| i.name() == name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::mock::{CallJournal, MockPlugin};
    use crate::framework::{Blockchain, PluginKind};

    fn chain(id: i64, name: &str) -> Arc<MockPlugin> {
        MockPlugin::builder(PluginKind::Blockchain, name).build_detached(id, &CallJournal::default())
    }

    #[test]
    fn insert_is_idempotent_and_remove_clears_all() {
        let chains: Collection<dyn Blockchain> = Collection::new();
        let a: Arc<dyn Blockchain> = chain(1, "bitcoin");
        let b: Arc<dyn Blockchain> = chain(2, "namecoin");

        assert!(chains.insert(a.clone()));
        assert!(!chains.insert(a.clone()));
        assert!(chains.insert(b.clone()));
        assert_eq!(chains.len(), 2);

        assert_eq!(chains.remove(&a), 1);
        assert_eq!(chains.remove(&a), 0);
        assert!(!chains.contains(&a));
        assert!(chains.contains(&b));
    }

    #[test]
    fn remove_handles_accidental_duplicates() {
        let chains: Collection<dyn Blockchain> = Collection::new();
        let a: Arc<dyn Blockchain> = chain(1, "bitcoin");
        chains.replace_all(vec![a.clone(), a.clone()]);
        assert_eq!(chains.remove(&a), 2);
        assert!(chains.is_empty());
    }

    #[test]
    fn arbitrary_sequences_match_set_semantics() {
        let chains: Collection<dyn Blockchain> = Collection::new();
        let items: Vec<Arc<dyn Blockchain>> = (0..4).map(|i| chain(i, &format!("c{i}")) as Arc<dyn Blockchain>).collect();
        let mut expected: Vec<usize> = Vec::new();

        // (index, add?) pairs exercising repeats in both directions.
        let ops = [(0, true), (1, true), (0, true), (2, true), (1, false), (1, false), (3, true), (0, false), (1, true)];
        for (idx, add) in ops {
            if add {
                chains.insert(items[idx].clone());
                if !expected.contains(&idx) {
                    expected.push(idx);
                }
            } else {
                chains.remove(&items[idx]);
                expected.retain(|&i| i != idx);
            }
        }

        let names: Vec<String> = chains.list().iter().map(|c| c.name()).collect();
        let expected: Vec<String> = expected.iter().map(|i| format!("c{i}")).collect();
        assert_eq!(names, expected);
    }

    #[test]
    fn find_by_name_returns_first_match() {
        let chains: Collection<dyn Blockchain> = Collection::new();
        chains.insert(chain(1, "bitcoin"));
        chains.insert(chain(2, "namecoin"));
        assert_eq!(chains.find_by_name("namecoin").map(|c| c.id()), Some(2));
        assert!(chains.find_by_name("litecoin").is_none());
    }
}
