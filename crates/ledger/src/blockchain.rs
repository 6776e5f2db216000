//! `Blockchain`: the block/transaction verification and persistence
//! pipeline (spec §4.5). This node never proposes blocks — consensus
//! voting is out of scope — so every block arrives pre-built and
//! pre-signed, from sync or a manual import, and `Blockchain`'s only job
//! is to verify it and fold it into the store.

use std::sync::{Arc, RwLock};

use neo_core::{Block, Transaction, UInt160, UInt256};
use neo_smart_contract::application_engine::Container;
use neo_smart_contract::native::{gas_token, LedgerContract, NativeRegistry};
use neo_smart_contract::{ApplicationEngine, TriggerType};
use neo_vm::{CallFlags, VmState};
use tokio::sync::broadcast;

use crate::error::{LedgerError, LedgerResult};
use crate::store_adapter::{layered_cache, overlay_entries, replay, ChainStore};
use crate::witness;

#[derive(Debug, Clone)]
pub enum BlockchainEvent {
    BlockPersisted { index: u32, hash: UInt256, transactions: Vec<UInt256> },
}

/// The verification script genesis's `nextConsensus` resolves to: an
/// always-true script, standing in for the standby committee's multisig
/// this repo has no key material to construct (spec's consensus/voting
/// layer is out of scope, and `ProtocolSettings::standby_committee` is
/// never populated).
pub fn genesis_authority_script() -> Vec<u8> {
    vec![0x11] // PUSH1
}

pub(crate) fn genesis_authority() -> UInt160 {
    UInt160::new(neo_cryptography::hash160(&genesis_authority_script()))
}

#[derive(Debug, Clone, Copy)]
struct Tip {
    hash: UInt256,
    index: u32,
    timestamp: u64,
    next_consensus: UInt160,
}

pub struct Blockchain {
    store: ChainStore,
    natives: Arc<NativeRegistry>,
    settings: neo_config::ProtocolSettings,
    tip: RwLock<Tip>,
    events: broadcast::Sender<BlockchainEvent>,
}

impl Blockchain {
    /// Opens `store` under `settings`, writing the genesis block the first
    /// time it's used.
    pub fn open(store: ChainStore, settings: neo_config::ProtocolSettings) -> LedgerResult<Self> {
        let natives = Arc::new(NativeRegistry::new());
        let (events, _) = broadcast::channel(1024);
        let chain = Self {
            store,
            natives,
            settings,
            tip: RwLock::new(Tip { hash: UInt256::ZERO, index: 0, timestamp: 0, next_consensus: UInt160::ZERO }),
            events,
        };
        chain.open_or_init_genesis()?;
        Ok(chain)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BlockchainEvent> {
        self.events.subscribe()
    }

    pub fn height(&self) -> u32 {
        self.tip.read().unwrap().index
    }

    pub fn current_hash(&self) -> UInt256 {
        self.tip.read().unwrap().hash
    }

    pub fn settings(&self) -> &neo_config::ProtocolSettings {
        &self.settings
    }

    fn tip(&self) -> Tip {
        *self.tip.read().unwrap()
    }

    /// A throwaway `ApplicationEngine` over a fresh, uncommitted cache —
    /// for read-only access to already-persisted state.
    fn reader(&self) -> ApplicationEngine {
        let index = self.tip.read().unwrap().index;
        ApplicationEngine::new(
            TriggerType::Verification,
            layered_cache(&self.store),
            Container::Block { index },
            index,
            0,
            self.natives.clone(),
            i64::MAX,
        )
    }

    /// Genesis is a deterministic, witness-free block: this repo never
    /// populates a real standby committee, so there is no multisig to
    /// derive a `nextConsensus` from. Skipped if a tip is already on disk.
    fn open_or_init_genesis(&self) -> LedgerResult<()> {
        let reader = self.reader();
        if let Some(hash) = LedgerContract::current_hash(&reader.engine) {
            let index = LedgerContract::current_index(&reader.engine);
            let next_consensus = LedgerContract::block(&reader.engine, &hash)
                .map(|b| b.header.next_consensus)
                .unwrap_or(UInt160::ZERO);
            *self.tip.write().unwrap() = Tip { hash, index, timestamp: 0, next_consensus };
            return Ok(());
        }

        let genesis = self.genesis_block();
        let mut engine = ApplicationEngine::new(
            TriggerType::OnPersist,
            layered_cache(&self.store),
            Container::Block { index: 0 },
            0,
            genesis.header.timestamp,
            self.natives.clone(),
            i64::MAX,
        );
        LedgerContract::persist(&mut engine.engine, &genesis, 0);
        let cache = engine.into_snapshot();
        cache.commit()?;

        *self.tip.write().unwrap() = Tip {
            hash: genesis.hash(),
            index: 0,
            timestamp: genesis.header.timestamp,
            next_consensus: genesis.header.next_consensus,
        };
        self.emit(BlockchainEvent::BlockPersisted {
            index: 0,
            hash: genesis.hash(),
            transactions: vec![],
        });
        Ok(())
    }

    fn genesis_block(&self) -> Block {
        neo_core::Block {
            header: neo_core::BlockHeader {
                version: 0,
                previous_hash: UInt256::ZERO,
                merkle_root: UInt256::ZERO,
                timestamp: 0,
                nonce: 0,
                index: 0,
                primary_index: 0,
                next_consensus: genesis_authority(),
                witness: neo_core::Witness::new(vec![], vec![]),
            },
            transactions: vec![],
        }
    }

    fn emit(&self, event: BlockchainEvent) {
        let _ = self.events.send(event);
    }

    /// Runs the seven-step persistence pipeline (spec §4.5). Every prior
    /// step must pass before the block's child cache is touched; a faulted
    /// transaction within step 5 loses only its own state changes, not its
    /// charged fee, and not the rest of the block.
    pub fn persist_block(&self, block: Block) -> LedgerResult<()> {
        let tip = self.tip();

        // 1. Header.
        if block.index() != tip.index + 1 {
            return Err(LedgerError::OutOfOrder { expected: tip.index + 1, actual: block.index() });
        }
        if block.header.previous_hash != tip.hash {
            return Err(LedgerError::PreviousHashMismatch);
        }
        if block.header.timestamp <= tip.timestamp {
            return Err(LedgerError::TimestampNotIncreasing { parent: tip.timestamp, actual: block.header.timestamp });
        }

        if block.transactions.len() > self.settings.max_transactions_per_block as usize {
            return Err(LedgerError::TooManyTransactions {
                actual: block.transactions.len(),
                max: self.settings.max_transactions_per_block as usize,
            });
        }
        let total_system_fee: i64 = block.transactions.iter().map(|tx| tx.system_fee).sum();
        if total_system_fee > self.settings.max_block_system_fee {
            return Err(LedgerError::SystemFeeExceedsBudget {
                actual: total_system_fee,
                max: self.settings.max_block_system_fee,
            });
        }

        // 2. Block witness + Merkle root.
        if block.header.merkle_root != block.compute_merkle_root() {
            return Err(LedgerError::InvalidMerkleRoot);
        }
        let authorized = witness::verify(
            &self.store,
            &self.natives,
            &block.header.witness,
            tip.next_consensus,
            Container::Block { index: block.index() },
            block.index(),
        );
        if !authorized {
            return Err(LedgerError::InvalidBlockWitness);
        }

        // 3. Per-transaction Verify trigger.
        for tx in &block.transactions {
            if !self.verify_transaction(tx, block.index()) {
                return Err(LedgerError::InvalidTransaction(tx.hash()));
            }
        }

        // 4. OnPersist, against the block's single child cache.
        let mut cache;
        {
            let mut engine = ApplicationEngine::new(
                TriggerType::OnPersist,
                layered_cache(&self.store),
                Container::Block { index: block.index() },
                block.index(),
                block.header.timestamp,
                self.natives.clone(),
                i64::MAX,
            );
            for native in self.natives.all() {
                native.on_persist(&mut engine.engine)?;
            }
            LedgerContract::persist(&mut engine.engine, &block, block.index());
            cache = engine.into_snapshot();
        }

        // 5. Per-transaction Application trigger with fault isolation.
        for tx in &block.transactions {
            cache = self.apply_transaction(cache, tx, &block)?;
        }

        // 6. PostPersist.
        {
            let mut engine = ApplicationEngine::new(
                TriggerType::PostPersist,
                cache,
                Container::Block { index: block.index() },
                block.index(),
                block.header.timestamp,
                self.natives.clone(),
                i64::MAX,
            );
            for native in self.natives.all() {
                native.post_persist(&mut engine.engine)?;
            }
            cache = engine.into_snapshot();
        }

        // 7. Commit, advance the tip, emit.
        cache.commit()?;
        *self.tip.write().unwrap() = Tip {
            hash: block.hash(),
            index: block.index(),
            timestamp: block.header.timestamp,
            next_consensus: block.header.next_consensus,
        };
        self.emit(BlockchainEvent::BlockPersisted {
            index: block.index(),
            hash: block.hash(),
            transactions: block.transactions.iter().map(|tx| tx.hash()).collect(),
        });
        Ok(())
    }

    /// Structural checks plus a witness run for every signer/witness pair,
    /// evaluated against the current tip. Exposed for `neo-node` to wire as
    /// the mempool's [`crate::mempool::TransactionVerifier`] (spec §4.6) —
    /// the mempool itself never constructs one.
    pub fn verify_for_mempool(&self, tx: &Transaction) -> bool {
        self.verify_transaction(tx, self.tip().index)
    }

    /// Structural checks plus a witness run for every signer/witness pair.
    fn verify_transaction(&self, tx: &Transaction, block_index: u32) -> bool {
        if tx.verify_structure().is_err() {
            return false;
        }
        if tx.signers.len() != tx.witnesses.len() {
            return false;
        }
        tx.signers.iter().zip(tx.witnesses.iter()).all(|(signer, wit)| {
            witness::verify(
                &self.store,
                &self.natives,
                wit,
                signer.account,
                Container::Transaction(tx.clone()),
                block_index,
            )
        })
    }

    /// Charges `tx`'s fees and executes its script against `cache`. On
    /// fault, replays the overlay captured just before the script ran —
    /// discarding the script's own changes while keeping the fee charge
    /// and every earlier stage's effects in this block.
    fn apply_transaction(
        &self,
        cache: neo_persistence::DataCache<Box<dyn neo_persistence::Store>>,
        tx: &Transaction,
        block: &Block,
    ) -> LedgerResult<neo_persistence::DataCache<Box<dyn neo_persistence::Store>>> {
        let mut cache = cache;
        if let Some(sender) = tx.sender() {
            let mut fee_engine = ApplicationEngine::new(
                TriggerType::Application,
                cache,
                Container::Transaction(tx.clone()),
                block.index(),
                block.header.timestamp,
                self.natives.clone(),
                0,
            );
            gas_token::fee(&mut fee_engine.engine, &sender, tx.system_fee + tx.network_fee)?;
            cache = fee_engine.into_snapshot();
        }

        let pre_script_overlay = overlay_entries(&cache);
        let mut engine = ApplicationEngine::new(
            TriggerType::Application,
            cache,
            Container::Transaction(tx.clone()),
            block.index(),
            block.header.timestamp,
            self.natives.clone(),
            tx.system_fee,
        );
        engine.load_script(tx.script.clone(), CallFlags::ALL)?;
        let state = engine.execute();
        if state == VmState::Halt {
            Ok(engine.into_snapshot())
        } else {
            Ok(replay(&self.store, pre_script_overlay))
        }
    }

    pub fn get_block(&self, hash: &UInt256) -> Option<Block> {
        LedgerContract::block(&self.reader().engine, hash)
    }

    pub fn get_block_hash(&self, index: u32) -> Option<UInt256> {
        LedgerContract::block_hash_at(&self.reader().engine, index)
    }

    pub fn get_transaction(&self, hash: &UInt256) -> Option<Transaction> {
        LedgerContract::transaction(&self.reader().engine, hash)
    }

    pub fn contains_transaction(&self, hash: &UInt256) -> bool {
        self.get_transaction(hash).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neo_core::{BlockHeader, Witness};
    use neo_persistence::MemoryStore;

    fn chain() -> Blockchain {
        let store: ChainStore = Arc::new(MemoryStore::new());
        Blockchain::open(store, neo_config::ProtocolSettings::private_net()).unwrap()
    }

    fn authorized_witness() -> Witness {
        Witness::new(vec![], genesis_authority_script())
    }

    fn child_block(chain: &Blockchain, transactions: Vec<Transaction>) -> Block {
        let tip = chain.tip();
        let mut header = BlockHeader {
            version: 0,
            previous_hash: tip.hash,
            merkle_root: UInt256::ZERO,
            timestamp: tip.timestamp + 1,
            nonce: 1,
            index: tip.index + 1,
            primary_index: 0,
            next_consensus: genesis_authority(),
            witness: authorized_witness(),
        };
        let block = Block { header: header.clone(), transactions };
        header.merkle_root = block.compute_merkle_root();
        Block { header, transactions: block.transactions }
    }

    #[test]
    fn opening_a_fresh_store_writes_genesis_at_height_zero() {
        let chain = chain();
        assert_eq!(chain.height(), 0);
        assert!(chain.get_block(&chain.current_hash()).is_some());
    }

    #[test]
    fn reopening_an_existing_store_recovers_the_tip() {
        let store: ChainStore = Arc::new(MemoryStore::new());
        let first = Blockchain::open(store.clone(), neo_config::ProtocolSettings::private_net()).unwrap();
        let genesis_hash = first.current_hash();
        drop(first);

        let second = Blockchain::open(store, neo_config::ProtocolSettings::private_net()).unwrap();
        assert_eq!(second.height(), 0);
        assert_eq!(second.current_hash(), genesis_hash);
    }

    #[test]
    fn persists_an_empty_block_extending_the_tip() {
        let chain = chain();
        let block = child_block(&chain, vec![]);
        let hash = block.hash();
        chain.persist_block(block).unwrap();
        assert_eq!(chain.height(), 1);
        assert_eq!(chain.current_hash(), hash);
    }

    #[test]
    fn rejects_a_block_with_the_wrong_previous_hash() {
        let chain = chain();
        let mut block = child_block(&chain, vec![]);
        block.header.previous_hash = UInt256::ZERO;
        let err = chain.persist_block(block).unwrap_err();
        assert!(matches!(err, LedgerError::PreviousHashMismatch));
    }

    #[test]
    fn rejects_a_block_whose_merkle_root_does_not_match() {
        let chain = chain();
        let mut block = child_block(&chain, vec![]);
        block.header.merkle_root = UInt256::new([1u8; 32]);
        let err = chain.persist_block(block).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidMerkleRoot));
    }

    #[test]
    fn a_faulting_transaction_still_persists_the_block_and_charges_its_fee() {
        let chain = chain();
        let sender = genesis_authority();
        let tx = Transaction {
            version: 0,
            nonce: 1,
            system_fee: 0,
            network_fee: 0,
            valid_until_block: 1000,
            signers: vec![neo_core::Signer::new(sender, neo_core::WitnessScope::CALLED_BY_ENTRY)],
            attributes: vec![],
            script: vec![0x45], // DROP on an empty stack: faults
            witnesses: vec![authorized_witness()],
        };
        let block = child_block(&chain, vec![tx.clone()]);
        chain.persist_block(block).unwrap();
        assert_eq!(chain.height(), 1);
        assert!(chain.contains_transaction(&tx.hash()));
    }
}
