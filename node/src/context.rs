//! `NodeContext`: the struct threaded through construction instead of the
//! reference client's singleton managers (spec §9's "Global mutable state"
//! note) — the block/transaction state, mempool, and sync engine a running
//! node needs, shared by every P2P connection task.

use std::sync::{Arc, Mutex};

use neo_config::ProtocolSettings;
use neo_ledger::{Blockchain, Mempool, MempoolConfig, TransactionVerifier};
use neo_network::rate_limiter::{ConnectionLimiter, GlobalRateLimiter};
use neo_network::SyncEngine;

/// Per-IP inbound connection cap (spec §5 resource controls). The
/// reference client doesn't expose this as config, so it's fixed here
/// rather than invented as a new config surface.
const MAX_CONNECTIONS_PER_IP: usize = 3;

/// Verifies mempool candidates against the live chain tip. A thin adapter
/// over [`Blockchain::verify_for_mempool`] — `neo-ledger`'s mempool never
/// constructs a verifier itself (spec §4.6).
struct ChainVerifier(Arc<Blockchain>);

impl TransactionVerifier for ChainVerifier {
    fn verify(&self, tx: &neo_core::Transaction) -> bool {
        self.0.verify_for_mempool(tx)
    }
}

pub struct NodeContext {
    pub settings: ProtocolSettings,
    pub blockchain: Arc<Blockchain>,
    pub mempool: Arc<Mempool>,
    pub sync: Mutex<SyncEngine>,
    pub nonce: u32,
    pub connection_limiter: ConnectionLimiter,
    pub rate_limiter: GlobalRateLimiter,
    verifier: ChainVerifier,
}

impl NodeContext {
    pub fn new(settings: ProtocolSettings, blockchain: Arc<Blockchain>) -> Self {
        let mempool = Arc::new(Mempool::new(MempoolConfig {
            max_verified: settings.memory_pool_max_verified,
            max_unverified: settings.memory_pool_max_unverified,
            reverify_batch_size: settings.reverification_batch_size(),
        }));
        let sync = Mutex::new(SyncEngine::new(blockchain.height()));
        let verifier = ChainVerifier(blockchain.clone());
        Self {
            settings,
            blockchain,
            mempool,
            sync,
            nonce: rand::random(),
            connection_limiter: ConnectionLimiter::new(MAX_CONNECTIONS_PER_IP),
            rate_limiter: GlobalRateLimiter::new(),
            verifier,
        }
    }

    pub fn verifier(&self) -> &dyn TransactionVerifier {
        &self.verifier
    }

    /// `blockchain.height()`/`blockchain.bestHash()` from spec §6.4's CLI
    /// surface — re-exposed here so a future CLI/RPC collaborator has one
    /// place to read node-wide status from.
    pub fn height(&self) -> u32 {
        self.blockchain.height()
    }

    pub fn best_hash(&self) -> neo_core::UInt256 {
        self.blockchain.current_hash()
    }

    pub fn mempool_stats(&self) -> MempoolStats {
        MempoolStats {
            verified: self.mempool.verified_len(),
            unverified: self.mempool.unverified_len(),
            capacity: self.settings.memory_pool_max_verified,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MempoolStats {
    pub verified: usize,
    pub unverified: usize,
    pub capacity: usize,
}
