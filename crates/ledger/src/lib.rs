//! Ledger: block/transaction verification and persistence, the mempool,
//! and `.acc` snapshot import (spec §4.5/§4.6) — the layer above
//! `neo-persistence`/`neo-smart-contract` that turns a raw key/value store
//! into a verified, synced chain.

pub mod blockchain;
pub mod error;
pub mod import;
pub mod mempool;
pub mod store_adapter;
pub mod witness;

pub use blockchain::{Blockchain, BlockchainEvent};
pub use error::{LedgerError, LedgerResult};
pub use mempool::{
    AdmissionResult, Mempool, MempoolConfig, MempoolEvent, RemovalReason, TransactionVerifier,
};
pub use store_adapter::ChainStore;
