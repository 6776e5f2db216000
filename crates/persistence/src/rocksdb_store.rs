//! RocksDB-backed [`Store`], the durable engine a real node runs on.

use std::path::Path;
use std::sync::Arc;

use rocksdb::{Direction, IteratorMode, Options, WriteBatch, DB};
use tracing::{debug, info};

use crate::error::{PersistenceError, PersistenceResult};
use crate::store::{BatchOperation, SeekDirection, Store, StoreView, WritableView};

pub struct RocksDbStore {
    db: Arc<DB>,
}

impl RocksDbStore {
    pub fn open<P: AsRef<Path>>(path: P) -> PersistenceResult<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        let db = DB::open(&opts, path.as_ref())
            .map_err(|e| PersistenceError::Io(format!("failed to open RocksDB: {e}")))?;
        info!(path = %path.as_ref().display(), "opened RocksDB store");
        Ok(Self { db: Arc::new(db) })
    }

    fn iterator_mode(key_or_prefix: &[u8], direction: SeekDirection) -> IteratorMode<'_> {
        if key_or_prefix.is_empty() {
            match direction {
                SeekDirection::Forward => IteratorMode::Start,
                SeekDirection::Backward => IteratorMode::End,
            }
        } else {
            match direction {
                SeekDirection::Forward => IteratorMode::From(key_or_prefix, Direction::Forward),
                SeekDirection::Backward => IteratorMode::From(key_or_prefix, Direction::Reverse),
            }
        }
    }
}

impl StoreView for RocksDbStore {
    fn try_get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.db.get(key).ok().flatten()
    }

    fn seek<'a>(
        &'a self,
        key_or_prefix: &[u8],
        direction: SeekDirection,
    ) -> Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + 'a> {
        let mode = Self::iterator_mode(key_or_prefix, direction);
        Box::new(
            self.db
                .iterator(mode)
                .filter_map(|r| r.ok())
                .map(|(k, v)| (k.to_vec(), v.to_vec())),
        )
    }
}

impl WritableView for RocksDbStore {
    fn put(&self, key: Vec<u8>, value: Vec<u8>) {
        if let Err(e) = self.db.put(&key, &value) {
            debug!(error = %e, "RocksDB put failed");
        }
    }

    fn delete(&self, key: &[u8]) {
        if let Err(e) = self.db.delete(key) {
            debug!(error = %e, "RocksDB delete failed");
        }
    }

    fn write_batch(&self, ops: Vec<BatchOperation>) -> PersistenceResult<()> {
        let mut batch = WriteBatch::default();
        for op in ops {
            match op {
                BatchOperation::Put { key, value } => batch.put(key, value),
                BatchOperation::Delete { key } => batch.delete(key),
            }
        }
        self.db
            .write(batch)
            .map_err(|e| PersistenceError::Io(format!("RocksDB batch write failed: {e}")))
    }
}

impl Store for RocksDbStore {
    fn snapshot(&self) -> Box<dyn StoreView> {
        // `rocksdb::Snapshot<'_>` borrows from `DB`; keeping the owning `Arc<DB>`
        // alongside the snapshot and transmuting the lifetime to `'static` is
        // sound because the snapshot never outlives the `Arc` it is bundled with.
        let db = Arc::clone(&self.db);
        let snapshot = unsafe {
            std::mem::transmute::<rocksdb::Snapshot<'_>, rocksdb::Snapshot<'static>>(db.snapshot())
        };
        Box::new(RocksDbSnapshot { _db: db, snapshot })
    }
}

struct RocksDbSnapshot {
    _db: Arc<DB>,
    snapshot: rocksdb::Snapshot<'static>,
}

impl StoreView for RocksDbSnapshot {
    fn try_get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.snapshot.get(key).ok().flatten()
    }

    fn seek<'a>(
        &'a self,
        key_or_prefix: &[u8],
        direction: SeekDirection,
    ) -> Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + 'a> {
        let mode = RocksDbStore::iterator_mode(key_or_prefix, direction);
        Box::new(
            self.snapshot
                .iterator(mode)
                .filter_map(|r| r.ok())
                .map(|(k, v)| (k.to_vec(), v.to_vec())),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_delete_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = RocksDbStore::open(dir.path()).unwrap();
        store.put(b"k".to_vec(), b"v".to_vec());
        assert_eq!(store.try_get(b"k"), Some(b"v".to_vec()));
        store.delete(b"k");
        assert_eq!(store.try_get(b"k"), None);
    }

    #[test]
    fn snapshot_is_isolated_from_later_writes() {
        let dir = tempfile::tempdir().unwrap();
        let store = RocksDbStore::open(dir.path()).unwrap();
        store.put(b"k".to_vec(), b"1".to_vec());
        let snap = store.snapshot();
        store.put(b"k".to_vec(), b"2".to_vec());
        assert_eq!(snap.try_get(b"k"), Some(b"1".to_vec()));
    }

    #[test]
    fn write_batch_applies_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let store = RocksDbStore::open(dir.path()).unwrap();
        store.put(b"a".to_vec(), b"1".to_vec());
        store
            .write_batch(vec![
                BatchOperation::Put { key: b"b".to_vec(), value: b"2".to_vec() },
                BatchOperation::Delete { key: b"a".to_vec() },
            ])
            .unwrap();
        assert_eq!(store.try_get(b"a"), None);
        assert_eq!(store.try_get(b"b"), Some(b"2".to_vec()));
    }
}
