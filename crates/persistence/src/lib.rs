//! Key/value store abstraction and the layered `DataCache` over it
//! (spec §4.2): the persistence engine every other crate reads and writes
//! ledger state through.

pub mod data_cache;
pub mod error;
pub mod memory_store;
#[cfg(feature = "rocksdb")]
pub mod rocksdb_store;
pub mod store;

pub use data_cache::{DataCache, TrackState};
pub use error::{PersistenceError, PersistenceResult};
pub use memory_store::MemoryStore;
#[cfg(feature = "rocksdb")]
pub use rocksdb_store::RocksDbStore;
pub use store::{BatchOperation, SeekDirection, Store, StoreView, WritableView};
