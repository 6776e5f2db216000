//! Policy: configurable network limits (fees, block size, blocked accounts),
//! mutable only by the committee witness (spec §4.4).

use neo_core::UInt160;
use neo_vm::{CallFlags, ExecutionEngine, StackItem};
use num_bigint::BigInt;

use super::{NativeContract, NativeMethod};
use crate::application_engine::AppContext;
use crate::error::{ScError, ScResult};

pub const ID: i32 = -3;

const PREFIX_FEE_PER_BYTE: u8 = 10;
const PREFIX_EXEC_FEE_FACTOR: u8 = 18;
const PREFIX_STORAGE_PRICE: u8 = 19;
const PREFIX_BLOCKED_ACCOUNT: u8 = 15;

pub const DEFAULT_FEE_PER_BYTE: u32 = 1000;
pub const DEFAULT_EXEC_FEE_FACTOR: u32 = 30;
pub const DEFAULT_STORAGE_PRICE: u32 = 100_000;

pub struct PolicyContract {
    methods: Vec<NativeMethod>,
}

impl PolicyContract {
    pub fn new() -> Self {
        Self {
            methods: vec![
                NativeMethod::safe("getFeePerByte", 0, 1 << 15),
                NativeMethod::safe("getExecFeeFactor", 0, 1 << 15),
                NativeMethod::safe("getStoragePrice", 0, 1 << 15),
                NativeMethod::safe("isBlocked", 1, 1 << 15),
                NativeMethod::mutating("setFeePerByte", 1, 1 << 15, CallFlags::STATES),
                NativeMethod::mutating("setExecFeeFactor", 1, 1 << 15, CallFlags::STATES),
                NativeMethod::mutating("setStoragePrice", 1, 1 << 15, CallFlags::STATES),
                NativeMethod::mutating("blockAccount", 1, 1 << 15, CallFlags::STATES),
                NativeMethod::mutating("unblockAccount", 1, 1 << 15, CallFlags::STATES),
            ],
        }
    }

    fn key(prefix: u8, suffix: &[u8]) -> neo_core::StorageKey {
        let mut key = vec![prefix];
        key.extend_from_slice(suffix);
        neo_core::StorageKey::new(ID, key)
    }

    fn read_u32(engine: &ExecutionEngine<AppContext>, prefix: u8, default: u32) -> u32 {
        engine
            .ctx
            .snapshot
            .try_get(&Self::key(prefix, &[]).to_bytes())
            .and_then(|bytes| bytes.try_into().ok())
            .map(u32::from_le_bytes)
            .unwrap_or(default)
    }

    fn write_u32(engine: &mut ExecutionEngine<AppContext>, prefix: u8, value: u32) {
        engine.ctx.snapshot.update(&Self::key(prefix, &[]).to_bytes(), value.to_le_bytes().to_vec());
    }

    pub fn fee_per_byte(engine: &ExecutionEngine<AppContext>) -> u32 {
        Self::read_u32(engine, PREFIX_FEE_PER_BYTE, DEFAULT_FEE_PER_BYTE)
    }

    pub fn exec_fee_factor(engine: &ExecutionEngine<AppContext>) -> u32 {
        Self::read_u32(engine, PREFIX_EXEC_FEE_FACTOR, DEFAULT_EXEC_FEE_FACTOR)
    }

    pub fn storage_price(engine: &ExecutionEngine<AppContext>) -> u32 {
        Self::read_u32(engine, PREFIX_STORAGE_PRICE, DEFAULT_STORAGE_PRICE)
    }

    pub fn is_blocked(engine: &ExecutionEngine<AppContext>, account: &UInt160) -> bool {
        engine.ctx.snapshot.contains(&Self::key(PREFIX_BLOCKED_ACCOUNT, account.as_bytes()).to_bytes())
    }
}

impl Default for PolicyContract {
    fn default() -> Self {
        Self::new()
    }
}

fn expect_hash160(item: &StackItem) -> ScResult<UInt160> {
    match item {
        StackItem::ByteString(b) => UInt160::from_bytes(b).map_err(|e| ScError::Other(e.to_string())),
        _ => Err(ScError::Other("expected a Hash160 argument".to_string())),
    }
}

fn expect_u32(item: &StackItem) -> ScResult<u32> {
    let n = item.as_int().map_err(|e| ScError::Other(e.to_string()))?;
    n.try_into().map_err(|_| ScError::Other("value out of range for a u32".to_string()))
}

impl NativeContract for PolicyContract {
    fn id(&self) -> i32 {
        ID
    }

    fn contract_name(&self) -> &'static str {
        "PolicyContract"
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
            "getFeePerByte" => Ok(StackItem::Integer(BigInt::from(Self::fee_per_byte(engine)))),
            "getExecFeeFactor" => Ok(StackItem::Integer(BigInt::from(Self::exec_fee_factor(engine)))),
            "getStoragePrice" => Ok(StackItem::Integer(BigInt::from(Self::storage_price(engine)))),
            "isBlocked" => {
                let account = expect_hash160(&args[0])?;
                Ok(StackItem::Boolean(Self::is_blocked(engine, &account)))
            }
            "setFeePerByte" => {
                super::require_committee_witness(engine)?;
                Self::write_u32(engine, PREFIX_FEE_PER_BYTE, expect_u32(&args[0])?);
                Ok(StackItem::Null)
            }
            "setExecFeeFactor" => {
                super::require_committee_witness(engine)?;
                Self::write_u32(engine, PREFIX_EXEC_FEE_FACTOR, expect_u32(&args[0])?);
                Ok(StackItem::Null)
            }
            "setStoragePrice" => {
                super::require_committee_witness(engine)?;
                Self::write_u32(engine, PREFIX_STORAGE_PRICE, expect_u32(&args[0])?);
                Ok(StackItem::Null)
            }
            "blockAccount" => {
                super::require_committee_witness(engine)?;
                let account = expect_hash160(&args[0])?;
                engine.ctx.snapshot.update(&Self::key(PREFIX_BLOCKED_ACCOUNT, account.as_bytes()).to_bytes(), vec![1]);
                Ok(StackItem::Boolean(true))
            }
            "unblockAccount" => {
                super::require_committee_witness(engine)?;
                let account = expect_hash160(&args[0])?;
                engine.ctx.snapshot.delete(&Self::key(PREFIX_BLOCKED_ACCOUNT, account.as_bytes()).to_bytes());
                Ok(StackItem::Boolean(true))
            }
            other => Err(super::arity_error("PolicyContract", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::NativeRegistry;
    use neo_persistence::{DataCache, MemoryStore, Store};
    use neo_vm::ExecutionLimits;
    use std::sync::Arc;

    fn engine() -> ExecutionEngine<AppContext> {
        engine_with_container(crate::application_engine::Container::Block { index: 0 })
    }

    /// An engine whose container carries a `Global`-scoped signer for the
    /// genesis committee stand-in — the witness `blockAccount`/`unblockAccount`
    /// require before they'll mutate state.
    fn committee_witnessed_engine() -> ExecutionEngine<AppContext> {
        let signer = neo_core::Signer::new(
            crate::application_engine::bootstrap_committee_account(),
            neo_core::WitnessScope::GLOBAL,
        );
        let tx = neo_core::Transaction {
            version: 0,
            nonce: 0,
            system_fee: 0,
            network_fee: 0,
            valid_until_block: 0,
            signers: vec![signer],
            attributes: vec![],
            script: vec![],
            witnesses: vec![],
        };
        let mut engine = engine_with_container(crate::application_engine::Container::Transaction(tx));
        engine.load_script(neo_vm::Script::new(vec![0x40]).unwrap(), CallFlags::ALL);
        engine
    }

    fn engine_with_container(container: crate::application_engine::Container) -> ExecutionEngine<AppContext> {
        let store: Box<dyn Store> = Box::new(MemoryStore::new());
        let ctx = AppContext {
            snapshot: DataCache::new(store),
            trigger: crate::trigger::TriggerType::Application,
            container,
            block_index: 0,
            block_time: 0,
            natives: Arc::new(NativeRegistry::new()),
            notifications: Vec::new(),
            logs: Vec::new(),
        };
        ExecutionEngine::new(ctx, 0, ExecutionLimits::default())
    }

    #[test]
    fn defaults_match_mainnet_genesis_values() {
        let eng = engine();
        assert_eq!(PolicyContract::fee_per_byte(&eng), DEFAULT_FEE_PER_BYTE);
        assert_eq!(PolicyContract::exec_fee_factor(&eng), DEFAULT_EXEC_FEE_FACTOR);
    }

    #[test]
    fn setters_reject_a_witness_that_is_not_the_committee() {
        let mut eng = engine();
        let policy = PolicyContract::new();
        let err = policy.invoke(&mut eng, "setFeePerByte", vec![StackItem::Integer(BigInt::from(1))]);
        assert!(err.is_err());
    }

    #[test]
    fn block_then_unblock_account_round_trips() {
        let mut eng = committee_witnessed_engine();
        let account = UInt160::new([4u8; 20]);
        assert!(!PolicyContract::is_blocked(&eng, &account));
        let policy = PolicyContract::new();
        policy.invoke(&mut eng, "blockAccount", vec![StackItem::from_bytes(account.as_bytes().to_vec())]).unwrap();
        assert!(PolicyContract::is_blocked(&eng, &account));
        policy.invoke(&mut eng, "unblockAccount", vec![StackItem::from_bytes(account.as_bytes().to_vec())]).unwrap();
        assert!(!PolicyContract::is_blocked(&eng, &account));
    }
}
