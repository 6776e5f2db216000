//! GAS: the utility token, 8 decimals, minted per block to validators and
//! claimants rather than fixed at genesis (spec §4.4).

use neo_core::UInt160;
use neo_vm::{CallFlags, ExecutionEngine, StackItem};
use num_bigint::BigInt;
use num_traits::ToPrimitive;

use super::fungible_token;
use super::neo_token;
use super::{NativeContract, NativeMethod};
use crate::application_engine::AppContext;
use crate::error::{ScError, ScResult};

pub const ID: i32 = -6;
const DECIMALS: u8 = 8;

/// Per-block issuance before any halving — same order of magnitude as the
/// reference client's initial 5 GAS/block.
pub const GAS_PER_BLOCK_INITIAL: i64 = 5_0000_0000;
/// Blocks between each halving of the per-block issuance rate.
pub const GAS_GENERATION_REDUCTION_INTERVAL: u32 = 2_000_000;

/// GAS minted this block, halving every [`GAS_GENERATION_REDUCTION_INTERVAL`]
/// blocks.
pub fn block_reward(block_index: u32) -> i64 {
    let reductions = block_index / GAS_GENERATION_REDUCTION_INTERVAL;
    let mut amount = GAS_PER_BLOCK_INITIAL;
    for _ in 0..reductions {
        amount /= 2;
        if amount == 0 {
            break;
        }
    }
    amount
}

pub struct GasToken {
    methods: Vec<NativeMethod>,
}

impl GasToken {
    pub fn new() -> Self {
        Self {
            methods: vec![
                NativeMethod::safe("symbol", 0, 0),
                NativeMethod::safe("decimals", 0, 0),
                NativeMethod::safe("totalSupply", 0, 1 << 15),
                NativeMethod::safe("balanceOf", 1, 1 << 15),
                NativeMethod::mutating("transfer", 3, 1 << 17, CallFlags::STATES),
            ],
        }
    }
}

impl Default for GasToken {
    fn default() -> Self {
        Self::new()
    }
}

fn expect_hash160(item: &StackItem) -> ScResult<UInt160> {
    let bytes = match item {
        StackItem::ByteString(b) => b.to_vec(),
        _ => return Err(ScError::Other("expected a Hash160 argument".to_string())),
    };
    UInt160::from_bytes(&bytes).map_err(|e| ScError::Other(e.to_string()))
}

fn expect_int(item: &StackItem) -> ScResult<BigInt> {
    item.as_int().map_err(|e| ScError::Other(e.to_string()))
}

impl NativeContract for GasToken {
    fn id(&self) -> i32 {
        ID
    }

    fn contract_name(&self) -> &'static str {
        "GasToken"
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
            "symbol" => Ok(StackItem::from_bytes(b"GAS".to_vec())),
            "decimals" => Ok(StackItem::Integer(BigInt::from(DECIMALS))),
            "totalSupply" => Ok(StackItem::Integer(fungible_token::total_supply(engine, ID))),
            "balanceOf" => {
                let account = expect_hash160(&args[0])?;
                Ok(StackItem::Integer(fungible_token::balance_of(engine, ID, &account)))
            }
            "transfer" => {
                let from = expect_hash160(&args[0])?;
                let to = expect_hash160(&args[1])?;
                let amount = expect_int(&args[2])?;
                let ok = fungible_token::transfer(engine, ID, &from, &to, &amount)?;
                Ok(StackItem::Boolean(ok))
            }
            other => Err(super::arity_error("GasToken", other)),
        }
    }

    fn on_persist(&self, engine: &mut ExecutionEngine<AppContext>) -> ScResult<()> {
        // Real Neo credits the primary validator's share to the committee
        // address, which NEO's unclaimed-bonus formula then splits out by
        // holder; this repo has no separate validator key material, so the
        // whole per-block reward lands on the committee account computed
        // from the current candidate set (or the genesis stand-in before
        // any candidate registers).
        let height = engine.ctx.block_index;
        let amount = block_reward(height);
        if amount > 0 {
            let recipient = neo_token::committee_account(engine)
                .unwrap_or_else(crate::application_engine::bootstrap_committee_account);
            reward(engine, &recipient, amount);
        }
        Ok(())
    }
}

/// Mints `amount` GAS to `account` — exposed for the block persistence
/// pipeline's per-block issuance step, not reachable from a SYSCALL.
pub fn reward(engine: &mut ExecutionEngine<AppContext>, account: &UInt160, amount: i64) {
    fungible_token::mint(engine, ID, account, &BigInt::from(amount));
}

pub fn fee(engine: &mut ExecutionEngine<AppContext>, account: &UInt160, amount: i64) -> ScResult<()> {
    fungible_token::burn(engine, ID, account, &BigInt::from(amount))
}

#[allow(dead_code)]
fn amount_to_i64(amount: &BigInt) -> ScResult<i64> {
    amount.to_i64().ok_or_else(|| ScError::Other("amount out of range".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::NativeRegistry;
    use neo_persistence::{DataCache, MemoryStore, Store};
    use neo_vm::ExecutionLimits;

    fn engine() -> ExecutionEngine<AppContext> {
        let store: Box<dyn Store> = Box::new(MemoryStore::new());
        let ctx = AppContext {
            snapshot: DataCache::new(store),
            trigger: crate::trigger::TriggerType::Application,
            container: crate::application_engine::Container::Block { index: 0 },
            block_index: 0,
            block_time: 0,
            natives: std::sync::Arc::new(NativeRegistry::new()),
            notifications: Vec::new(),
            logs: Vec::new(),
        };
        ExecutionEngine::new(ctx, 0, ExecutionLimits::default())
    }

    #[test]
    fn symbol_and_decimals_are_fixed() {
        let token = GasToken::new();
        let mut eng = engine();
        assert_eq!(token.invoke(&mut eng, "decimals", vec![]).unwrap().as_int().unwrap(), BigInt::from(8));
    }

    #[test]
    fn reward_then_balance_of_reflects_issuance() {
        let mut eng = engine();
        let account = UInt160::new([7u8; 20]);
        reward(&mut eng, &account, 5_0000_0000);
        let token = GasToken::new();
        let balance = token
            .invoke(&mut eng, "balanceOf", vec![StackItem::from_bytes(account.as_bytes().to_vec())])
            .unwrap();
        assert_eq!(balance.as_int().unwrap(), BigInt::from(5_0000_0000i64));
    }
}
