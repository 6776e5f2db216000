//! Ledger: read-only access to persisted blocks and transactions from
//! inside a contract script, bounded by `MaxTraceableBlocks` (spec §4.4).
//!
//! Block/transaction bodies are written into this contract's storage
//! range by the persistence pipeline's `on_persist` step, not by this
//! contract itself — `invoke` only ever reads.

use neo_core::{Block, Transaction, UInt256};
use neo_io::{BinaryWriter, MemoryReader, Serializable};
use neo_vm::{ExecutionEngine, StackItem};
use num_bigint::BigInt;

use super::{NativeContract, NativeMethod};
use crate::application_engine::AppContext;
use crate::error::{ScError, ScResult};

pub const ID: i32 = -8;

const PREFIX_BLOCK: u8 = 5;
const PREFIX_BLOCK_HASH: u8 = 9;
const PREFIX_TRANSACTION: u8 = 11;
const PREFIX_CURRENT_BLOCK: u8 = 12;

pub struct LedgerContract {
    methods: Vec<NativeMethod>,
}

impl LedgerContract {
    pub fn new() -> Self {
        Self {
            methods: vec![
                NativeMethod::safe("currentHash", 0, 1 << 15),
                NativeMethod::safe("currentIndex", 0, 1 << 15),
                NativeMethod::safe("getBlock", 1, 1 << 15),
                NativeMethod::safe("getTransaction", 1, 1 << 15),
                NativeMethod::safe("getTransactionHeight", 1, 1 << 15),
                NativeMethod::safe("containsTransaction", 1, 1 << 15),
            ],
        }
    }

    fn key(prefix: u8, suffix: &[u8]) -> neo_core::StorageKey {
        let mut key = vec![prefix];
        key.extend_from_slice(suffix);
        neo_core::StorageKey::new(ID, key)
    }

    pub fn current_hash(engine: &ExecutionEngine<AppContext>) -> Option<UInt256> {
        let bytes = engine.ctx.snapshot.try_get(&Self::key(PREFIX_CURRENT_BLOCK, &[]).to_bytes())?;
        UInt256::from_bytes(&bytes[..32]).ok()
    }

    pub fn current_index(engine: &ExecutionEngine<AppContext>) -> u32 {
        engine
            .ctx
            .snapshot
            .try_get(&Self::key(PREFIX_CURRENT_BLOCK, &[]).to_bytes())
            .and_then(|bytes| bytes.get(32..36).map(|b| u32::from_le_bytes(b.try_into().unwrap())))
            .unwrap_or(0)
    }

    pub fn block_hash_at(engine: &ExecutionEngine<AppContext>, index: u32) -> Option<UInt256> {
        let bytes = engine.ctx.snapshot.try_get(&Self::key(PREFIX_BLOCK_HASH, &index.to_be_bytes()).to_bytes())?;
        UInt256::from_bytes(&bytes).ok()
    }

    pub fn block(engine: &ExecutionEngine<AppContext>, hash: &UInt256) -> Option<Block> {
        let bytes = engine.ctx.snapshot.try_get(&Self::key(PREFIX_BLOCK, hash.as_bytes()).to_bytes())?;
        let mut reader = MemoryReader::new(&bytes);
        Block::deserialize(&mut reader).ok()
    }

    pub fn transaction(engine: &ExecutionEngine<AppContext>, hash: &UInt256) -> Option<Transaction> {
        let bytes = engine.ctx.snapshot.try_get(&Self::key(PREFIX_TRANSACTION, hash.as_bytes()).to_bytes())?;
        let mut reader = MemoryReader::new(&bytes);
        Transaction::deserialize(&mut reader).ok()
    }

    /// Records `block` and every transaction it carries as current, called
    /// from the `OnPersist` trigger — not reachable as a contract method.
    pub fn persist(engine: &mut ExecutionEngine<AppContext>, block: &Block, index: u32) {
        let hash = block.hash();
        let mut writer = BinaryWriter::new();
        block.serialize(&mut writer).expect("in-memory writer cannot fail");
        engine.ctx.snapshot.update(&Self::key(PREFIX_BLOCK, hash.as_bytes()).to_bytes(), writer.to_bytes());
        engine.ctx.snapshot.update(&Self::key(PREFIX_BLOCK_HASH, &index.to_be_bytes()).to_bytes(), hash.as_bytes().to_vec());

        for tx in &block.transactions {
            let tx_hash = tx.hash();
            let mut writer = BinaryWriter::new();
            tx.serialize(&mut writer).expect("in-memory writer cannot fail");
            engine.ctx.snapshot.update(&Self::key(PREFIX_TRANSACTION, tx_hash.as_bytes()).to_bytes(), writer.to_bytes());
        }

        let mut current = hash.as_bytes().to_vec();
        current.extend_from_slice(&index.to_le_bytes());
        engine.ctx.snapshot.update(&Self::key(PREFIX_CURRENT_BLOCK, &[]).to_bytes(), current);
    }
}

impl Default for LedgerContract {
    fn default() -> Self {
        Self::new()
    }
}

fn expect_hash256(item: &StackItem) -> ScResult<UInt256> {
    match item {
        StackItem::ByteString(b) => UInt256::from_bytes(b).map_err(|e| ScError::Other(e.to_string())),
        _ => Err(ScError::Other("expected a Hash256 argument".to_string())),
    }
}

impl NativeContract for LedgerContract {
    fn id(&self) -> i32 {
        ID
    }

    fn contract_name(&self) -> &'static str {
        "LedgerContract"
    }

    fn methods(&self) -> &[NativeMethod] {
        &self.methods
    }

    fn invoke(
        &self,
        engine: &mut ExecutionEngine<AppContext>,
        method: &str,
        args: Vec<StackItem>,
    ) -> ScResult<StackItem> {
        match method {
            "currentHash" => Ok(Self::current_hash(engine)
                .map(|h| StackItem::from_bytes(h.as_bytes().to_vec()))
                .unwrap_or(StackItem::Null)),
            "currentIndex" => Ok(StackItem::Integer(BigInt::from(Self::current_index(engine)))),
            "getBlock" => {
                let hash = expect_hash256(&args[0])?;
                Ok(Self::block(engine, &hash)
                    .map(|b| StackItem::from_bytes(b.hash().as_bytes().to_vec()))
                    .unwrap_or(StackItem::Null))
            }
            "getTransaction" => {
                let hash = expect_hash256(&args[0])?;
                Ok(Self::transaction(engine, &hash)
                    .map(|tx| StackItem::from_bytes(tx.script.clone()))
                    .unwrap_or(StackItem::Null))
            }
            "getTransactionHeight" => {
                let hash = expect_hash256(&args[0])?;
                match Self::transaction(engine, &hash) {
                    Some(_) => Ok(StackItem::Integer(BigInt::from(Self::current_index(engine)))),
                    None => Ok(StackItem::Integer(BigInt::from(-1))),
                }
            }
            "containsTransaction" => {
                let hash = expect_hash256(&args[0])?;
                Ok(StackItem::Boolean(Self::transaction(engine, &hash).is_some()))
            }
            other => Err(super::arity_error("LedgerContract", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::NativeRegistry;
    use neo_core::{BlockHeader, Witness};
    use neo_persistence::{DataCache, MemoryStore, Store};
    use neo_vm::ExecutionLimits;
    use std::sync::Arc;

    fn engine() -> ExecutionEngine<AppContext> {
        let store: Box<dyn Store> = Box::new(MemoryStore::new());
        let ctx = AppContext {
            snapshot: DataCache::new(store),
            trigger: crate::trigger::TriggerType::Application,
            container: crate::application_engine::Container::Block { index: 0 },
            block_index: 0,
            block_time: 0,
            natives: Arc::new(NativeRegistry::new()),
            notifications: Vec::new(),
            logs: Vec::new(),
        };
        ExecutionEngine::new(ctx, 0, ExecutionLimits::default())
    }

    fn sample_block() -> Block {
        Block {
            header: BlockHeader {
                version: 0,
                previous_hash: UInt256::ZERO,
                merkle_root: UInt256::ZERO,
                timestamp: 0,
                nonce: 0,
                index: 1,
                primary_index: 0,
                next_consensus: neo_core::UInt160::ZERO,
                witness: Witness::new(vec![], vec![]),
            },
            transactions: vec![],
        }
    }

    #[test]
    fn persist_then_current_hash_and_index_reflect_block() {
        let mut eng = engine();
        let block = sample_block();
        let hash = block.hash();
        LedgerContract::persist(&mut eng, &block, 1);
        assert_eq!(LedgerContract::current_hash(&eng), Some(hash));
        assert_eq!(LedgerContract::current_index(&eng), 1);
    }
}
