//! Three-tier transaction pool (spec §4.6): a sorted-by-priority verified
//! view and an unsorted-by-hash verified view over the same admitted set,
//! plus a FIFO pool of transactions not yet (re)verified.

use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

use indexmap::IndexMap;
use neo_core::{Transaction, UInt256};
use tokio::sync::broadcast;

/// Verified-tier capacity; matches the reference client's default.
pub const DEFAULT_MAX_VERIFIED: usize = 50_000;
/// Unverified-tier capacity.
pub const DEFAULT_MAX_UNVERIFIED: usize = 500;
/// Entries re-checked per `reverify` tick.
pub const DEFAULT_REVERIFY_BATCH: usize = 250;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MempoolConfig {
    pub max_verified: usize,
    pub max_unverified: usize,
    pub reverify_batch_size: usize,
}

impl Default for MempoolConfig {
    fn default() -> Self {
        Self {
            max_verified: DEFAULT_MAX_VERIFIED,
            max_unverified: DEFAULT_MAX_UNVERIFIED,
            reverify_batch_size: DEFAULT_REVERIFY_BATCH,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    /// Included in a persisted block.
    Confirmed,
    /// Dropped for capacity or policy reasons.
    Evicted,
    /// `validUntilBlock` passed without being persisted.
    Expired,
    /// Invalidated by another transaction's `Conflicts` attribute.
    Conflict,
}

#[derive(Debug, Clone)]
pub enum MempoolEvent {
    TransactionAdded(UInt256),
    TransactionRemoved { hash: UInt256, reason: RemovalReason },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionResult {
    /// Inserted into the verified tier.
    AddedVerified,
    /// Inserted into the unverified tier.
    AddedUnverified,
    /// Already present in one of the tiers.
    Duplicate,
    /// Verified, but every existing verified entry outranks it and the
    /// pool is full.
    DroppedLowPriority,
}

/// Verifies a candidate transaction against current chain state. The
/// mempool holds one of these but never constructs it — `neo-node` wires
/// a real verifier backed by a `DataCache` snapshot.
pub trait TransactionVerifier: Send + Sync {
    fn verify(&self, tx: &Transaction) -> bool;
}

#[derive(Debug, Clone)]
struct PooledTransaction {
    transaction: Transaction,
    priority: u64,
}

impl PooledTransaction {
    fn new(transaction: Transaction) -> Self {
        let size = transaction.size().max(1) as u64;
        let priority = transaction.network_fee as u64 / size;
        Self { transaction, priority }
    }
}

struct Inner {
    verified: HashMap<UInt256, PooledTransaction>,
    verified_by_priority: BTreeSet<(u64, UInt256)>,
    unverified: IndexMap<UInt256, Transaction>,
}

impl Inner {
    fn contains(&self, hash: &UInt256) -> bool {
        self.verified.contains_key(hash) || self.unverified.contains_key(hash)
    }
}

pub struct Mempool {
    config: MempoolConfig,
    inner: RwLock<Inner>,
    events: broadcast::Sender<MempoolEvent>,
}

impl Mempool {
    pub fn new(config: MempoolConfig) -> Self {
        let (events, _) = broadcast::channel(1024);
        Self {
            config,
            inner: RwLock::new(Inner {
                verified: HashMap::new(),
                verified_by_priority: BTreeSet::new(),
                unverified: IndexMap::new(),
            }),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MempoolEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: MempoolEvent) {
        let _ = self.events.send(event);
    }

    pub fn len(&self) -> usize {
        let inner = self.inner.read().unwrap();
        inner.verified.len() + inner.unverified.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Verified-tier size, for `mempool.stats()` (spec §6.4).
    pub fn verified_len(&self) -> usize {
        self.inner.read().unwrap().verified.len()
    }

    /// Unverified-tier size, for `mempool.stats()` (spec §6.4).
    pub fn unverified_len(&self) -> usize {
        self.inner.read().unwrap().unverified.len()
    }

    pub fn contains(&self, hash: &UInt256) -> bool {
        self.inner.read().unwrap().contains(hash)
    }

    /// `TryAdd`: runs `verifier` and admits `tx` per the five-step
    /// procedure in §4.6.
    pub fn try_add(&self, tx: Transaction, verifier: &dyn TransactionVerifier) -> AdmissionResult {
        let hash = tx.hash();
        let mut inner = self.inner.write().unwrap();
        if inner.contains(&hash) {
            return AdmissionResult::Duplicate;
        }

        let verified = verifier.verify(&tx);
        let conflicts: Vec<UInt256> = tx
            .attributes
            .iter()
            .filter_map(|a| match a {
                neo_core::TransactionAttribute::Conflicts { hash } => Some(*hash),
                _ => None,
            })
            .collect();
        let pooled = PooledTransaction::new(tx);

        if verified {
            if inner.verified.len() >= self.config.max_verified {
                let lowest = inner.verified_by_priority.iter().next().copied();
                match lowest {
                    Some((lowest_priority, lowest_hash)) if lowest_priority < pooled.priority => {
                        inner.verified_by_priority.remove(&(lowest_priority, lowest_hash));
                        inner.verified.remove(&lowest_hash);
                        drop(inner);
                        self.emit(MempoolEvent::TransactionRemoved { hash: lowest_hash, reason: RemovalReason::Evicted });
                        inner = self.inner.write().unwrap();
                    }
                    _ => return AdmissionResult::DroppedLowPriority,
                }
            }
            for conflict in conflicts {
                if inner.contains(&conflict) {
                    inner.verified.remove(&conflict);
                    inner.verified_by_priority.retain(|(_, h)| *h != conflict);
                    inner.unverified.shift_remove(&conflict);
                    drop(inner);
                    self.emit(MempoolEvent::TransactionRemoved { hash: conflict, reason: RemovalReason::Conflict });
                    inner = self.inner.write().unwrap();
                }
            }
            inner.verified_by_priority.insert((pooled.priority, hash));
            inner.verified.insert(hash, pooled);
            drop(inner);
            self.emit(MempoolEvent::TransactionAdded(hash));
            AdmissionResult::AddedVerified
        } else {
            if inner.unverified.len() >= self.config.max_unverified {
                if let Some(oldest) = inner.unverified.keys().next().copied() {
                    inner.unverified.shift_remove(&oldest);
                    drop(inner);
                    self.emit(MempoolEvent::TransactionRemoved { hash: oldest, reason: RemovalReason::Evicted });
                    inner = self.inner.write().unwrap();
                }
            }
            inner.unverified.insert(hash, pooled.transaction);
            drop(inner);
            self.emit(MempoolEvent::TransactionAdded(hash));
            AdmissionResult::AddedUnverified
        }
    }

    /// `ReverifyTransactions(n)`: re-checks up to `n` unverified entries in
    /// FIFO order, promoting passes and dropping persistent failures.
    /// Returns `(promoted, dropped)`.
    pub fn reverify(&self, verifier: &dyn TransactionVerifier) -> (usize, usize) {
        let batch: Vec<(UInt256, Transaction)> = {
            let inner = self.inner.read().unwrap();
            inner.unverified.iter().take(self.config.reverify_batch_size).map(|(h, t)| (*h, t.clone())).collect()
        };

        let mut promoted = 0;
        let mut dropped = 0;
        for (hash, tx) in batch {
            if verifier.verify(&tx) {
                let mut inner = self.inner.write().unwrap();
                inner.unverified.shift_remove(&hash);
                let pooled = PooledTransaction::new(tx);
                if inner.verified.len() >= self.config.max_verified {
                    if let Some((lowest_priority, lowest_hash)) = inner.verified_by_priority.iter().next().copied() {
                        if lowest_priority < pooled.priority {
                            inner.verified_by_priority.remove(&(lowest_priority, lowest_hash));
                            inner.verified.remove(&lowest_hash);
                            drop(inner);
                            self.emit(MempoolEvent::TransactionRemoved { hash: lowest_hash, reason: RemovalReason::Evicted });
                            let mut inner = self.inner.write().unwrap();
                            inner.verified_by_priority.insert((pooled.priority, hash));
                            inner.verified.insert(hash, pooled);
                            drop(inner);
                            self.emit(MempoolEvent::TransactionAdded(hash));
                            promoted += 1;
                            continue;
                        }
                    }
                    dropped += 1;
                    continue;
                }
                inner.verified_by_priority.insert((pooled.priority, hash));
                inner.verified.insert(hash, pooled);
                drop(inner);
                self.emit(MempoolEvent::TransactionAdded(hash));
                promoted += 1;
            } else {
                let mut inner = self.inner.write().unwrap();
                inner.unverified.shift_remove(&hash);
                drop(inner);
                self.emit(MempoolEvent::TransactionRemoved { hash, reason: RemovalReason::Evicted });
                dropped += 1;
            }
        }
        (promoted, dropped)
    }

    /// `GetTransactionsForBlock`: up to `max` verified transactions, best
    /// priority first.
    pub fn transactions_for_block(&self, max: usize) -> Vec<Transaction> {
        let inner = self.inner.read().unwrap();
        inner
            .verified_by_priority
            .iter()
            .rev()
            .take(max)
            .filter_map(|(_, hash)| inner.verified.get(hash).map(|p| p.transaction.clone()))
            .collect()
    }

    /// Removes every transaction in `hashes` with [`RemovalReason::Confirmed`].
    pub fn remove_confirmed(&self, hashes: &[UInt256]) {
        for hash in hashes {
            let removed = {
                let mut inner = self.inner.write().unwrap();
                let had_verified = inner.verified.remove(hash).is_some();
                inner.verified_by_priority.retain(|(_, h)| h != hash);
                let had_unverified = inner.unverified.shift_remove(hash).is_some();
                had_verified || had_unverified
            };
            if removed {
                self.emit(MempoolEvent::TransactionRemoved { hash: *hash, reason: RemovalReason::Confirmed });
            }
        }
    }

    /// Drops every pooled transaction whose `validUntilBlock` no longer
    /// covers `height`.
    pub fn remove_expired(&self, height: u32) {
        let expired: Vec<UInt256> = {
            let inner = self.inner.read().unwrap();
            inner
                .verified
                .iter()
                .filter(|(_, p)| p.transaction.valid_until_block < height)
                .map(|(h, _)| *h)
                .chain(inner.unverified.iter().filter(|(_, t)| t.valid_until_block < height).map(|(h, _)| *h))
                .collect()
        };
        for hash in expired {
            let mut inner = self.inner.write().unwrap();
            inner.verified.remove(&hash);
            inner.verified_by_priority.retain(|(_, h)| *h != hash);
            inner.unverified.shift_remove(&hash);
            drop(inner);
            self.emit(MempoolEvent::TransactionRemoved { hash, reason: RemovalReason::Expired });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neo_core::Signer;
    use neo_core::UInt160;
    use neo_core::WitnessScope;

    struct AlwaysVerified;
    impl TransactionVerifier for AlwaysVerified {
        fn verify(&self, _tx: &Transaction) -> bool {
            true
        }
    }

    struct AlwaysRejected;
    impl TransactionVerifier for AlwaysRejected {
        fn verify(&self, _tx: &Transaction) -> bool {
            false
        }
    }

    fn tx(nonce: u32, network_fee: i64, valid_until_block: u32) -> Transaction {
        Transaction {
            version: 0,
            nonce,
            system_fee: 0,
            network_fee,
            valid_until_block,
            signers: vec![Signer::new(UInt160::new([nonce as u8; 20]), WitnessScope::CALLED_BY_ENTRY)],
            attributes: vec![],
            script: vec![0x51],
            witnesses: vec![],
        }
    }

    #[test]
    fn admits_a_verified_transaction_and_emits_added() {
        let pool = Mempool::new(MempoolConfig::default());
        let mut events = pool.subscribe();
        let t = tx(1, 1000, 100);
        let hash = t.hash();
        assert_eq!(pool.try_add(t, &AlwaysVerified), AdmissionResult::AddedVerified);
        assert!(pool.contains(&hash));
        match events.try_recv().unwrap() {
            MempoolEvent::TransactionAdded(h) => assert_eq!(h, hash),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn rejects_duplicates() {
        let pool = Mempool::new(MempoolConfig::default());
        let t = tx(1, 1000, 100);
        assert_eq!(pool.try_add(t.clone(), &AlwaysVerified), AdmissionResult::AddedVerified);
        assert_eq!(pool.try_add(t, &AlwaysVerified), AdmissionResult::Duplicate);
    }

    #[test]
    fn unverified_transaction_goes_to_the_fifo_tier() {
        let pool = Mempool::new(MempoolConfig::default());
        let t = tx(1, 1000, 100);
        assert_eq!(pool.try_add(t, &AlwaysRejected), AdmissionResult::AddedUnverified);
    }

    #[test]
    fn full_verified_pool_evicts_the_lowest_priority_entry() {
        let config = MempoolConfig { max_verified: 1, max_unverified: 10, reverify_batch_size: 10 };
        let pool = Mempool::new(config);
        let low = tx(1, 100, 100);
        let low_hash = low.hash();
        let high = tx(2, 10_000, 100);
        assert_eq!(pool.try_add(low, &AlwaysVerified), AdmissionResult::AddedVerified);
        assert_eq!(pool.try_add(high, &AlwaysVerified), AdmissionResult::AddedVerified);
        assert!(!pool.contains(&low_hash));
    }

    #[test]
    fn a_lower_priority_entry_is_dropped_instead_of_evicting() {
        let config = MempoolConfig { max_verified: 1, max_unverified: 10, reverify_batch_size: 10 };
        let pool = Mempool::new(config);
        let high = tx(1, 10_000, 100);
        let high_hash = high.hash();
        let low = tx(2, 100, 100);
        assert_eq!(pool.try_add(high, &AlwaysVerified), AdmissionResult::AddedVerified);
        assert_eq!(pool.try_add(low, &AlwaysVerified), AdmissionResult::DroppedLowPriority);
        assert!(pool.contains(&high_hash));
    }

    #[test]
    fn transactions_for_block_orders_by_descending_priority() {
        let pool = Mempool::new(MempoolConfig::default());
        pool.try_add(tx(1, 100, 100), &AlwaysVerified);
        pool.try_add(tx(2, 10_000, 100), &AlwaysVerified);
        pool.try_add(tx(3, 1_000, 100), &AlwaysVerified);
        let ordered = pool.transactions_for_block(10);
        assert_eq!(ordered[0].nonce, 2);
        assert_eq!(ordered[1].nonce, 3);
        assert_eq!(ordered[2].nonce, 1);
    }

    #[test]
    fn reverify_promotes_passing_entries_and_drops_failures() {
        let pool = Mempool::new(MempoolConfig::default());
        pool.try_add(tx(1, 1000, 100), &AlwaysRejected);
        let (promoted, dropped) = pool.reverify(&AlwaysVerified);
        assert_eq!(promoted, 1);
        assert_eq!(dropped, 0);
        let (promoted, dropped) = pool.reverify(&AlwaysRejected);
        assert_eq!(promoted, 0);
        assert_eq!(dropped, 0); // already promoted, nothing left unverified
    }

    #[test]
    fn remove_expired_drops_transactions_past_their_valid_until_block() {
        let pool = Mempool::new(MempoolConfig::default());
        let t = tx(1, 1000, 5);
        let hash = t.hash();
        pool.try_add(t, &AlwaysVerified);
        pool.remove_expired(10);
        assert!(!pool.contains(&hash));
    }

    #[test]
    fn conflicts_attribute_evicts_the_referenced_transaction() {
        let pool = Mempool::new(MempoolConfig::default());
        let victim = tx(1, 1000, 100);
        let victim_hash = victim.hash();
        pool.try_add(victim, &AlwaysVerified);

        let mut attacker = tx(2, 2000, 100);
        attacker.attributes.push(neo_core::TransactionAttribute::Conflicts { hash: victim_hash });
        pool.try_add(attacker, &AlwaysVerified);
        assert!(!pool.contains(&victim_hash));
    }
}
