//! `Store`/`StoreView` traits (spec §4.2): the key/value engine interface
//! that `DataCache` layers change-tracking over. Keys and values are raw
//! bytes; `neo-core`'s `StorageKey::to_bytes`/`StorageItem` sit one level up.

use crate::error::PersistenceResult;

/// Direction to walk a prefix scan in, matching the C# `SeekDirection`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekDirection {
    Forward,
    Backward,
}

/// A single write inside a [`Store::write_batch`], applied atomically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOperation {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

/// Read-only view over an ordered byte-keyed store. Implemented by both a
/// concrete [`Store`] and by [`crate::DataCache`], so a cache can be
/// layered on top of either.
pub trait StoreView: Send + Sync {
    fn try_get(&self, key: &[u8]) -> Option<Vec<u8>>;

    fn contains(&self, key: &[u8]) -> bool {
        self.try_get(key).is_some()
    }

    /// Scans keys lexicographically starting at `key_or_prefix` (or from
    /// the very first/last key if empty), honoring `direction`.
    fn seek<'a>(
        &'a self,
        key_or_prefix: &[u8],
        direction: SeekDirection,
    ) -> Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + 'a>;
}

/// Write side of a [`StoreView`]. Infallible by design: the engines this
/// trait abstracts over (an in-memory map, RocksDB, a parent `DataCache`)
/// don't reject individual puts/deletes — failures are I/O-level and
/// surfaced only from [`Store::write_batch`].
pub trait WritableView: StoreView {
    fn put(&self, key: Vec<u8>, value: Vec<u8>);
    fn delete(&self, key: &[u8]);

    /// Applies a batch of writes. The default sequential application is
    /// correct (if not atomic) for in-memory targets; backing stores with
    /// a native atomic batch (RocksDB) override it.
    fn write_batch(&self, ops: Vec<BatchOperation>) -> PersistenceResult<()> {
        for op in ops {
            match op {
                BatchOperation::Put { key, value } => self.put(key, value),
                BatchOperation::Delete { key } => self.delete(&key),
            }
        }
        Ok(())
    }
}

/// A top-level, directly persisted key/value engine (spec §4.2): `get`,
/// `put`, `delete`, `seek`, `snapshot`. Keys are ordered lexicographically.
pub trait Store: WritableView {
    /// A point-in-time, read-only view that does not observe later writes.
    fn snapshot(&self) -> Box<dyn StoreView>;
}

// Blanket impls so a `DataCache` (or `Store`) can be nested as a parent by
// shared reference, without forcing every caller into `Arc`.
impl<T: StoreView + ?Sized> StoreView for &T {
    fn try_get(&self, key: &[u8]) -> Option<Vec<u8>> {
        (**self).try_get(key)
    }

    fn seek<'a>(
        &'a self,
        key_or_prefix: &[u8],
        direction: SeekDirection,
    ) -> Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + 'a> {
        (**self).seek(key_or_prefix, direction)
    }
}

impl<T: WritableView + ?Sized> WritableView for &T {
    fn put(&self, key: Vec<u8>, value: Vec<u8>) {
        (**self).put(key, value)
    }

    fn delete(&self, key: &[u8]) {
        (**self).delete(key)
    }

    fn write_batch(&self, ops: Vec<BatchOperation>) -> PersistenceResult<()> {
        (**self).write_batch(ops)
    }
}

// Same, for an owned `Box<dyn Store>`/`Box<dyn StoreView>` parent — the
// shape `ApplicationEngine` uses so its `DataCache` isn't generic over a
// concrete store type.
impl<T: StoreView + ?Sized> StoreView for Box<T> {
    fn try_get(&self, key: &[u8]) -> Option<Vec<u8>> {
        (**self).try_get(key)
    }

    fn seek<'a>(
        &'a self,
        key_or_prefix: &[u8],
        direction: SeekDirection,
    ) -> Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + 'a> {
        (**self).seek(key_or_prefix, direction)
    }
}

impl<T: WritableView + ?Sized> WritableView for Box<T> {
    fn put(&self, key: Vec<u8>, value: Vec<u8>) {
        (**self).put(key, value)
    }

    fn delete(&self, key: &[u8]) {
        (**self).delete(key)
    }

    fn write_batch(&self, ops: Vec<BatchOperation>) -> PersistenceResult<()> {
        (**self).write_batch(ops)
    }
}
