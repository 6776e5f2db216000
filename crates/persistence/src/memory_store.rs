//! In-memory [`Store`] backed by a `BTreeMap`, used for tests and for nodes
//! that don't need durability (e.g. a throwaway devnet).

use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::error::PersistenceResult;
use crate::store::{BatchOperation, SeekDirection, Store, StoreView, WritableView};

#[derive(Default)]
pub struct MemoryStore {
    map: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StoreView for MemoryStore {
    fn try_get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.map.read().get(key).cloned()
    }

    fn seek<'a>(
        &'a self,
        key_or_prefix: &[u8],
        direction: SeekDirection,
    ) -> Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + 'a> {
        let snapshot: Vec<(Vec<u8>, Vec<u8>)> = self
            .map
            .read()
            .range(key_or_prefix.to_vec()..)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        match direction {
            SeekDirection::Forward => Box::new(snapshot.into_iter()),
            SeekDirection::Backward => {
                let mut before: Vec<(Vec<u8>, Vec<u8>)> = self
                    .map
                    .read()
                    .range(..key_or_prefix.to_vec())
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                before.reverse();
                Box::new(before.into_iter())
            }
        }
    }
}

impl WritableView for MemoryStore {
    fn put(&self, key: Vec<u8>, value: Vec<u8>) {
        self.map.write().insert(key, value);
    }

    fn delete(&self, key: &[u8]) {
        self.map.write().remove(key);
    }

    fn write_batch(&self, ops: Vec<BatchOperation>) -> PersistenceResult<()> {
        let mut map = self.map.write();
        for op in ops {
            match op {
                BatchOperation::Put { key, value } => {
                    map.insert(key, value);
                }
                BatchOperation::Delete { key } => {
                    map.remove(&key);
                }
            }
        }
        Ok(())
    }
}

impl Store for MemoryStore {
    fn snapshot(&self) -> Box<dyn StoreView> {
        Box::new(MemoryStore {
            map: RwLock::new(self.map.read().clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_round_trips() {
        let store = MemoryStore::new();
        store.put(b"k".to_vec(), b"v".to_vec());
        assert_eq!(store.try_get(b"k"), Some(b"v".to_vec()));
    }

    #[test]
    fn delete_removes_key() {
        let store = MemoryStore::new();
        store.put(b"k".to_vec(), b"v".to_vec());
        store.delete(b"k");
        assert_eq!(store.try_get(b"k"), None);
    }

    #[test]
    fn seek_forward_is_lexicographic() {
        let store = MemoryStore::new();
        store.put(b"a".to_vec(), b"1".to_vec());
        store.put(b"c".to_vec(), b"3".to_vec());
        store.put(b"b".to_vec(), b"2".to_vec());
        let keys: Vec<_> = store
            .seek(b"", SeekDirection::Forward)
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    }

    #[test]
    fn seek_with_prefix_only_returns_matching_range() {
        let store = MemoryStore::new();
        store.put(b"contract1:a".to_vec(), b"1".to_vec());
        store.put(b"contract1:b".to_vec(), b"2".to_vec());
        store.put(b"contract2:a".to_vec(), b"3".to_vec());
        let keys: Vec<_> = store
            .seek(b"contract1:", SeekDirection::Forward)
            .map(|(k, _)| k)
            .take_while(|k| k.starts_with(b"contract1:"))
            .collect();
        assert_eq!(keys, vec![b"contract1:a".to_vec(), b"contract1:b".to_vec()]);
    }

    #[test]
    fn snapshot_does_not_observe_later_writes() {
        let store = MemoryStore::new();
        store.put(b"k".to_vec(), b"1".to_vec());
        let snap = store.snapshot();
        store.put(b"k".to_vec(), b"2".to_vec());
        assert_eq!(snap.try_get(b"k"), Some(b"1".to_vec()));
        assert_eq!(store.try_get(b"k"), Some(b"2".to_vec()));
    }
}
