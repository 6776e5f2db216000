//! `DataCache` (spec §4.2, §4.5): a layered, copy-on-write change set over a
//! parent `Store` or another `DataCache`. This is the unit of state the VM's
//! `ApplicationEngine` reads/writes through, and the unit block persistence
//! commits at each pipeline stage.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::error::{PersistenceError, PersistenceResult};
use crate::store::{BatchOperation, SeekDirection, StoreView, WritableView};

/// Tracking state of a single cached entry, per spec §4.2's transition
/// matrix. `None` is a negative cache entry: looked up in the parent, not
/// found there either, so repeated misses don't re-query it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackState {
    None,
    Unchanged,
    Added,
    Changed,
    Deleted,
}

#[derive(Debug, Clone)]
struct Tracked {
    item: Option<Vec<u8>>,
    state: TrackState,
}

pub struct DataCache<P: StoreView> {
    parent: P,
    changes: RwLock<BTreeMap<Vec<u8>, Tracked>>,
    committed: RwLock<bool>,
}

impl<P: StoreView> DataCache<P> {
    pub fn new(parent: P) -> Self {
        Self { parent, changes: RwLock::new(BTreeMap::new()), committed: RwLock::new(false) }
    }

    pub fn parent(&self) -> &P {
        &self.parent
    }

    pub fn try_get(&self, key: &[u8]) -> Option<Vec<u8>> {
        if let Some(tracked) = self.changes.read().get(key) {
            return match tracked.state {
                TrackState::None | TrackState::Deleted => None,
                _ => tracked.item.clone(),
            };
        }
        let found = self.parent.try_get(key);
        let mut changes = self.changes.write();
        match &found {
            Some(v) => {
                changes.insert(
                    key.to_vec(),
                    Tracked { item: Some(v.clone()), state: TrackState::Unchanged },
                );
            }
            None => {
                changes.insert(key.to_vec(), Tracked { item: None, state: TrackState::None });
            }
        }
        found
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.try_get(key).is_some()
    }

    /// Adds a new entry. Fails if `key` currently resolves to a non-deleted
    /// value, matching the C# `DataCache.Add` contract.
    pub fn add(&self, key: Vec<u8>, value: Vec<u8>) -> PersistenceResult<()> {
        let resolves_to_value = {
            let changes = self.changes.read();
            match changes.get(&key) {
                Some(t) => !matches!(t.state, TrackState::Deleted | TrackState::None),
                None => self.parent.try_get(&key).is_some(),
            }
        };
        if resolves_to_value {
            return Err(PersistenceError::KeyAlreadyExists);
        }
        self.changes
            .write()
            .insert(key, Tracked { item: Some(value), state: TrackState::Added });
        Ok(())
    }

    /// Overwrites (or creates) an entry, transitioning `Unchanged -> Changed`
    /// and `None -> Added` per the state matrix. `Added`/`Changed` entries
    /// keep their state, just with the new value.
    pub fn update(&self, key: &[u8], value: Vec<u8>) {
        let mut changes = self.changes.write();
        if let Some(t) = changes.get_mut(key) {
            t.item = Some(value);
            t.state = match t.state {
                TrackState::Unchanged | TrackState::None => TrackState::Changed,
                other => other,
            };
            return;
        }
        drop(changes);
        let had_parent_value = self.parent.try_get(key).is_some();
        let mut changes = self.changes.write();
        changes.insert(
            key.to_vec(),
            Tracked {
                item: Some(value),
                state: if had_parent_value { TrackState::Changed } else { TrackState::Added },
            },
        );
    }

    /// `None + Add -> Added`; `Added + Delete -> None`; `Unchanged|Changed +
    /// Delete -> Deleted`.
    pub fn delete(&self, key: &[u8]) {
        let mut changes = self.changes.write();
        if let Some(t) = changes.get_mut(key) {
            match t.state {
                TrackState::Added => {
                    t.state = TrackState::None;
                    t.item = None;
                }
                TrackState::Unchanged | TrackState::Changed => {
                    t.state = TrackState::Deleted;
                    t.item = None;
                }
                TrackState::Deleted | TrackState::None => {}
            }
            return;
        }
        drop(changes);
        let had_parent_value = self.parent.try_get(key).is_some();
        let mut changes = self.changes.write();
        let state = if had_parent_value { TrackState::Deleted } else { TrackState::None };
        changes.insert(key.to_vec(), Tracked { item: None, state });
    }

    pub fn seek<'a>(
        &'a self,
        key_or_prefix: &[u8],
        direction: SeekDirection,
    ) -> Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + 'a> {
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> = self
            .parent
            .seek(key_or_prefix, SeekDirection::Forward)
            .take_while(|(k, _)| k.starts_with(key_or_prefix))
            .collect();

        for (key, tracked) in self.changes.read().iter() {
            if !key.starts_with(key_or_prefix) {
                continue;
            }
            match &tracked.item {
                Some(v) if !matches!(tracked.state, TrackState::None | TrackState::Deleted) => {
                    merged.insert(key.clone(), v.clone());
                }
                _ => {
                    merged.remove(key);
                }
            }
        }

        let mut items: Vec<_> = merged.into_iter().collect();
        if direction == SeekDirection::Backward {
            items.reverse();
        }
        Box::new(items.into_iter())
    }

    /// Every tracked entry and its state, regardless of whether it resolves
    /// to a value. Primarily for tests and diagnostics.
    pub fn change_set(&self) -> Vec<(Vec<u8>, TrackState)> {
        self.changes.read().iter().map(|(k, t)| (k.clone(), t.state)).collect()
    }
}

impl<P: StoreView> StoreView for DataCache<P> {
    fn try_get(&self, key: &[u8]) -> Option<Vec<u8>> {
        DataCache::try_get(self, key)
    }

    fn seek<'a>(
        &'a self,
        key_or_prefix: &[u8],
        direction: SeekDirection,
    ) -> Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + 'a> {
        DataCache::seek(self, key_or_prefix, direction)
    }
}

/// A `DataCache` is itself writable (nesting a child `DataCache` over it):
/// `put`/`delete` apply the same unconditional semantics as [`DataCache::update`]
/// and [`DataCache::delete`], as opposed to the failable [`DataCache::add`].
impl<P: StoreView> WritableView for DataCache<P> {
    fn put(&self, key: Vec<u8>, value: Vec<u8>) {
        self.update(&key, value);
    }

    fn delete(&self, key: &[u8]) {
        DataCache::delete(self, key);
    }
}

impl<P: WritableView> DataCache<P> {
    /// Folds the change set into the parent as a single logical batch. A
    /// failure mid-write leaves the parent unchanged (the batch is built in
    /// full before any write is issued). Calling commit twice is an error —
    /// a `DataCache` has no reuse across commits.
    pub fn commit(&self) -> PersistenceResult<()> {
        let mut committed = self.committed.write();
        if *committed {
            return Err(PersistenceError::AlreadyCommitted);
        }

        let ops: Vec<BatchOperation> = self
            .changes
            .read()
            .iter()
            .filter_map(|(key, tracked)| match tracked.state {
                TrackState::Added | TrackState::Changed => Some(BatchOperation::Put {
                    key: key.clone(),
                    value: tracked.item.clone().unwrap_or_default(),
                }),
                TrackState::Deleted => Some(BatchOperation::Delete { key: key.clone() }),
                TrackState::Unchanged | TrackState::None => None,
            })
            .collect();

        self.parent.write_batch(ops)?;
        *committed = true;
        self.changes.write().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_store::MemoryStore;

    #[test]
    fn add_then_get_resolves_before_commit() {
        let cache = DataCache::new(MemoryStore::new());
        cache.add(b"k".to_vec(), b"v".to_vec()).unwrap();
        assert_eq!(cache.try_get(b"k"), Some(b"v".to_vec()));
        assert_eq!(cache.parent().try_get(b"k"), None);
    }

    #[test]
    fn add_twice_without_delete_fails() {
        let cache = DataCache::new(MemoryStore::new());
        cache.add(b"k".to_vec(), b"v".to_vec()).unwrap();
        assert!(matches!(cache.add(b"k".to_vec(), b"v2".to_vec()), Err(PersistenceError::KeyAlreadyExists)));
    }

    #[test]
    fn commit_flushes_to_parent_and_clears_change_set() {
        let cache = DataCache::new(MemoryStore::new());
        cache.add(b"k".to_vec(), b"v".to_vec()).unwrap();
        cache.commit().unwrap();
        assert_eq!(cache.parent().try_get(b"k"), Some(b"v".to_vec()));
        assert!(cache.change_set().is_empty());
    }

    #[test]
    fn double_commit_is_an_error() {
        let cache = DataCache::new(MemoryStore::new());
        cache.add(b"k".to_vec(), b"v".to_vec()).unwrap();
        cache.commit().unwrap();
        assert!(matches!(cache.commit(), Err(PersistenceError::AlreadyCommitted)));
    }

    #[test]
    fn delete_after_parent_value_tracks_as_deleted_until_commit() {
        let store = MemoryStore::new();
        store.put(b"k".to_vec(), b"v".to_vec());
        let cache = DataCache::new(store);
        cache.delete(b"k");
        assert_eq!(cache.try_get(b"k"), None);
        assert_eq!(cache.parent().try_get(b"k"), Some(b"v".to_vec()));
        cache.commit().unwrap();
        assert_eq!(cache.parent().try_get(b"k"), None);
    }

    #[test]
    fn add_then_delete_resets_to_untracked_none() {
        let cache = DataCache::new(MemoryStore::new());
        cache.add(b"k".to_vec(), b"v".to_vec()).unwrap();
        cache.delete(b"k");
        assert_eq!(cache.try_get(b"k"), None);
        // Re-adding after the Added->None->Add cycle must succeed.
        cache.add(b"k".to_vec(), b"v2".to_vec()).unwrap();
        assert_eq!(cache.try_get(b"k"), Some(b"v2".to_vec()));
    }

    #[test]
    fn seek_merges_parent_and_local_changes_in_key_order() {
        let store = MemoryStore::new();
        store.put(b"a".to_vec(), b"1".to_vec());
        store.put(b"c".to_vec(), b"3".to_vec());
        let cache = DataCache::new(store);
        cache.add(b"b".to_vec(), b"2".to_vec()).unwrap();
        cache.delete(b"c");
        let results: Vec<_> = cache.seek(b"", SeekDirection::Forward).collect();
        assert_eq!(
            results,
            vec![(b"a".to_vec(), b"1".to_vec()), (b"b".to_vec(), b"2".to_vec())]
        );
    }

    #[test]
    fn nested_data_cache_commits_into_parent_cache() {
        let store = MemoryStore::new();
        let parent_cache = DataCache::new(store);
        parent_cache.add(b"k".to_vec(), b"1".to_vec()).unwrap();

        let child = DataCache::new(&parent_cache);
        child.update(b"k", b"2".to_vec());
        assert_eq!(child.try_get(b"k"), Some(b"2".to_vec()));
        assert_eq!(parent_cache.try_get(b"k"), Some(b"1".to_vec()));

        child.commit().unwrap();
        assert_eq!(parent_cache.try_get(b"k"), Some(b"2".to_vec()));
    }
}
