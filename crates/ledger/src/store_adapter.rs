//! Bridges a shared, always-live chain store into the `Box<dyn Store>`
//! shape `neo_smart_contract::AppContext::snapshot` is fixed to.
//!
//! `DataCache<P>` only requires `P: StoreView` (`P: WritableView` to
//! `commit()`) — it never needs `P: Store` itself, since it only ever
//! reads through and writes into its parent. `SharedStore` exists purely
//! to give `Arc<dyn Store>` a `Store` impl of its own, so a fresh
//! `Box::new(SharedStore(chain_store.clone()))` can back a brand new
//! per-block (or per-transaction) `DataCache` while every one of them
//! commits into the one real, persisted store.

use std::sync::Arc;

use neo_persistence::{BatchOperation, DataCache, PersistenceResult, SeekDirection, Store, StoreView, TrackState, WritableView};

pub type ChainStore = Arc<dyn Store + Send + Sync>;

#[derive(Clone)]
pub struct SharedStore(pub ChainStore);

impl StoreView for SharedStore {
    fn try_get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.0.try_get(key)
    }

    fn seek<'a>(
        &'a self,
        key_or_prefix: &[u8],
        direction: SeekDirection,
    ) -> Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + 'a> {
        self.0.seek(key_or_prefix, direction)
    }
}

impl WritableView for SharedStore {
    fn put(&self, key: Vec<u8>, value: Vec<u8>) {
        self.0.put(key, value)
    }

    fn delete(&self, key: &[u8]) {
        self.0.delete(key)
    }

    fn write_batch(&self, ops: Vec<BatchOperation>) -> PersistenceResult<()> {
        self.0.write_batch(ops)
    }
}

impl Store for SharedStore {
    fn snapshot(&self) -> Box<dyn StoreView> {
        self.0.snapshot()
    }
}

/// A fresh `DataCache` layered over `store`, ready to be handed to
/// `ApplicationEngine::new`.
pub fn layered_cache(store: &ChainStore) -> DataCache<Box<dyn Store>> {
    let parent: Box<dyn Store> = Box::new(SharedStore(store.clone()));
    DataCache::new(parent)
}

/// Every key a cache has added, changed, or deleted relative to its
/// parent, values included — a point-in-time snapshot of its overlay that
/// can later be replayed onto a different cache sharing the same parent.
pub fn overlay_entries(cache: &DataCache<Box<dyn Store>>) -> Vec<(Vec<u8>, Option<Vec<u8>>)> {
    cache
        .change_set()
        .into_iter()
        .filter_map(|(key, state)| match state {
            TrackState::Added | TrackState::Changed => cache.try_get(&key).map(|value| (key, Some(value))),
            TrackState::Deleted => Some((key, None)),
            TrackState::Unchanged | TrackState::None => None,
        })
        .collect()
}

/// Builds a fresh cache over `store` and replays `entries` onto it — used
/// to restore the state from just before a faulted transaction's script
/// ran, discarding only what that script itself touched.
pub fn replay(store: &ChainStore, entries: Vec<(Vec<u8>, Option<Vec<u8>>)>) -> DataCache<Box<dyn Store>> {
    let cache = layered_cache(store);
    for (key, value) in entries {
        match value {
            Some(v) => cache.update(&key, v),
            None => cache.delete(&key),
        }
    }
    cache
}

#[cfg(test)]
mod tests {
    use super::*;
    use neo_persistence::MemoryStore;

    fn store() -> ChainStore {
        Arc::new(MemoryStore::new())
    }

    #[test]
    fn writes_through_a_committed_cache_reach_the_shared_store() {
        let store = store();
        let cache = layered_cache(&store);
        cache.update(b"k", b"v".to_vec());
        cache.commit().unwrap();
        assert_eq!(store.try_get(b"k"), Some(b"v".to_vec()));
    }

    #[test]
    fn a_second_cache_over_the_same_store_observes_prior_commits() {
        let store = store();
        let first = layered_cache(&store);
        first.update(b"k", b"v".to_vec());
        first.commit().unwrap();
        let second = layered_cache(&store);
        assert_eq!(second.try_get(b"k"), Some(b"v".to_vec()));
    }

    #[test]
    fn replay_restores_an_overlay_captured_before_a_faulted_run() {
        let store = store();
        let cache = layered_cache(&store);
        cache.update(b"k", b"pre".to_vec());
        let pre = overlay_entries(&cache);
        cache.update(b"k", b"post-fault".to_vec());
        cache.update(b"extra", b"leaked".to_vec());

        let restored = replay(&store, pre);
        assert_eq!(restored.try_get(b"k"), Some(b"pre".to_vec()));
        assert_eq!(restored.try_get(b"extra"), None);
    }
}
