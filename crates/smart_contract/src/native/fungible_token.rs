//! Shared NEP-17 storage helpers for [`super::NeoToken`] and
//! [`super::GasToken`]: balance/total-supply accounting and the `Transfer`
//! notification, factored out of both so the two tokens only need to
//! supply id, symbol, decimals, and minting policy.

use neo_core::UInt160;
use neo_vm::{ExecutionEngine, StackItem};
use num_bigint::BigInt;
use num_traits::{Signed, Zero};

use crate::application_engine::{AppContext, NotifyEvent};
use crate::error::{ScError, ScResult};

pub const PREFIX_TOTAL_SUPPLY: u8 = 11;
pub const PREFIX_ACCOUNT: u8 = 20;

fn storage_key(contract_id: i32, prefix: u8, suffix: &[u8]) -> neo_core::StorageKey {
    let mut key = vec![prefix];
    key.extend_from_slice(suffix);
    neo_core::StorageKey::new(contract_id, key)
}

fn read_bigint(engine: &ExecutionEngine<AppContext>, contract_id: i32, prefix: u8, suffix: &[u8]) -> BigInt {
    let key = storage_key(contract_id, prefix, suffix).to_bytes();
    match engine.ctx.snapshot.try_get(&key) {
        Some(bytes) => BigInt::from_signed_bytes_le(&bytes),
        None => BigInt::zero(),
    }
}

fn write_bigint(
    engine: &mut ExecutionEngine<AppContext>,
    contract_id: i32,
    prefix: u8,
    suffix: &[u8],
    value: &BigInt,
) {
    let key = storage_key(contract_id, prefix, suffix).to_bytes();
    if value.is_zero() {
        engine.ctx.snapshot.delete(&key);
    } else {
        engine.ctx.snapshot.update(&key, value.to_signed_bytes_le());
    }
}

pub fn total_supply(engine: &ExecutionEngine<AppContext>, contract_id: i32) -> BigInt {
    read_bigint(engine, contract_id, PREFIX_TOTAL_SUPPLY, &[])
}

pub fn balance_of(engine: &ExecutionEngine<AppContext>, contract_id: i32, account: &UInt160) -> BigInt {
    read_bigint(engine, contract_id, PREFIX_ACCOUNT, account.as_bytes())
}

pub fn mint(engine: &mut ExecutionEngine<AppContext>, contract_id: i32, account: &UInt160, amount: &BigInt) {
    if amount.is_zero() {
        return;
    }
    let balance = balance_of(engine, contract_id, account) + amount;
    write_bigint(engine, contract_id, PREFIX_ACCOUNT, account.as_bytes(), &balance);
    let supply = total_supply(engine, contract_id) + amount;
    write_bigint(engine, contract_id, PREFIX_TOTAL_SUPPLY, &[], &supply);
    emit_transfer(engine, contract_id, None, Some(account), amount);
}

pub fn burn(
    engine: &mut ExecutionEngine<AppContext>,
    contract_id: i32,
    account: &UInt160,
    amount: &BigInt,
) -> ScResult<()> {
    if amount.is_zero() {
        return Ok(());
    }
    let balance = balance_of(engine, contract_id, account);
    if balance < *amount {
        return Err(ScError::Other("insufficient balance to burn".to_string()));
    }
    write_bigint(engine, contract_id, PREFIX_ACCOUNT, account.as_bytes(), &(balance - amount));
    let supply = total_supply(engine, contract_id) - amount;
    write_bigint(engine, contract_id, PREFIX_TOTAL_SUPPLY, &[], &supply);
    emit_transfer(engine, contract_id, Some(account), None, amount);
    Ok(())
}

pub fn transfer(
    engine: &mut ExecutionEngine<AppContext>,
    contract_id: i32,
    from: &UInt160,
    to: &UInt160,
    amount: &BigInt,
) -> ScResult<bool> {
    if amount.is_negative() {
        return Err(ScError::Other("transfer amount must not be negative".to_string()));
    }
    if from == to {
        let balance = balance_of(engine, contract_id, from);
        if balance < *amount {
            return Ok(false);
        }
        emit_transfer(engine, contract_id, Some(from), Some(to), amount);
        return Ok(true);
    }
    let from_balance = balance_of(engine, contract_id, from);
    if from_balance < *amount {
        return Ok(false);
    }
    write_bigint(engine, contract_id, PREFIX_ACCOUNT, from.as_bytes(), &(from_balance - amount));
    let to_balance = balance_of(engine, contract_id, to) + amount;
    write_bigint(engine, contract_id, PREFIX_ACCOUNT, to.as_bytes(), &to_balance);
    emit_transfer(engine, contract_id, Some(from), Some(to), amount);
    Ok(true)
}

fn emit_transfer(
    engine: &mut ExecutionEngine<AppContext>,
    contract_id: i32,
    from: Option<&UInt160>,
    to: Option<&UInt160>,
    amount: &BigInt,
) {
    let to_item = |h: Option<&UInt160>| match h {
        Some(h) => StackItem::from_bytes(h.as_bytes().to_vec()),
        None => StackItem::Null,
    };
    let state = vec![to_item(from), to_item(to), StackItem::Integer(amount.clone())];
    let script_hash = engine.ctx.natives.by_id(contract_id).map(|n| n.script_hash()).unwrap_or(UInt160::ZERO);
    engine.ctx.notifications.push(NotifyEvent {
        script_hash,
        event_name: "Transfer".to_string(),
        state,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use neo_persistence::{DataCache, MemoryStore, Store};
    use neo_vm::ExecutionLimits;

    fn engine_with_empty_snapshot() -> ExecutionEngine<AppContext> {
        let store: Box<dyn Store> = Box::new(MemoryStore::new());
        let ctx = AppContext {
            snapshot: DataCache::new(store),
            trigger: crate::trigger::TriggerType::Application,
            container: crate::application_engine::Container::Block { index: 0 },
            block_index: 0,
            block_time: 0,
            natives: std::sync::Arc::new(crate::native::NativeRegistry::new()),
            notifications: Vec::new(),
            logs: Vec::new(),
        };
        ExecutionEngine::new(ctx, 0, ExecutionLimits::default())
    }

    #[test]
    fn mint_then_balance_of_round_trips() {
        let mut engine = engine_with_empty_snapshot();
        let account = UInt160::new([1u8; 20]);
        mint(&mut engine, -5, &account, &BigInt::from(100));
        assert_eq!(balance_of(&engine, -5, &account), BigInt::from(100));
        assert_eq!(total_supply(&engine, -5), BigInt::from(100));
    }

    #[test]
    fn transfer_moves_balance_between_accounts() {
        let mut engine = engine_with_empty_snapshot();
        let alice = UInt160::new([1u8; 20]);
        let bob = UInt160::new([2u8; 20]);
        mint(&mut engine, -5, &alice, &BigInt::from(100));
        let ok = transfer(&mut engine, -5, &alice, &bob, &BigInt::from(40)).unwrap();
        assert!(ok);
        assert_eq!(balance_of(&engine, -5, &alice), BigInt::from(60));
        assert_eq!(balance_of(&engine, -5, &bob), BigInt::from(40));
    }

    #[test]
    fn transfer_fails_on_insufficient_balance() {
        let mut engine = engine_with_empty_snapshot();
        let alice = UInt160::new([1u8; 20]);
        let bob = UInt160::new([2u8; 20]);
        let ok = transfer(&mut engine, -5, &alice, &bob, &BigInt::from(1)).unwrap();
        assert!(!ok);
    }

    #[test]
    fn burn_rejects_amount_exceeding_balance() {
        let mut engine = engine_with_empty_snapshot();
        let account = UInt160::new([1u8; 20]);
        mint(&mut engine, -5, &account, &BigInt::from(10));
        assert!(burn(&mut engine, -5, &account, &BigInt::from(20)).is_err());
    }
}
