//! `System.*` syscall table (spec §4.5): each entry is a plain function
//! pointer registered with [`neo_vm::ExecutionEngine::register_syscall`],
//! reusing the VM's own dispatch and gas-accounting rather than a second,
//! trait-object-based interop layer.

use neo_core::{StorageKey, UInt160};
use neo_cryptography::{hash160, Curve};
use neo_vm::{CallFlags, ExecutionContext, ExecutionEngine, Script, StackItem};
use num_traits::ToPrimitive;

use crate::application_engine::{AppContext, Container, LogEvent, NotifyEvent};
use crate::native::contract_management;
use crate::trigger::TriggerType;

const MAX_NOTIFICATION_NAME_LENGTH: usize = 32;
const MAX_LOG_MESSAGE_LENGTH: usize = 1024;

pub fn register_all(engine: &mut ExecutionEngine<AppContext>) {
    engine.register_syscall("System.Runtime.Platform", CallFlags::NONE, 1 << 10, runtime_platform);
    engine.register_syscall("System.Runtime.GetTrigger", CallFlags::NONE, 1 << 10, runtime_get_trigger);
    engine.register_syscall("System.Runtime.GetTime", CallFlags::READ_STATES, 1 << 10, runtime_get_time);
    engine.register_syscall(
        "System.Runtime.GetScriptContainer",
        CallFlags::NONE,
        1 << 10,
        runtime_get_script_container,
    );
    engine.register_syscall(
        "System.Runtime.GetExecutingScriptHash",
        CallFlags::NONE,
        1 << 10,
        runtime_get_executing_script_hash,
    );
    engine.register_syscall(
        "System.Runtime.GetCallingScriptHash",
        CallFlags::NONE,
        1 << 10,
        runtime_get_calling_script_hash,
    );
    engine.register_syscall(
        "System.Runtime.GetEntryScriptHash",
        CallFlags::NONE,
        1 << 10,
        runtime_get_entry_script_hash,
    );
    engine.register_syscall(
        "System.Runtime.CheckWitness",
        CallFlags::NONE,
        1 << 15,
        runtime_check_witness,
    );
    engine.register_syscall("System.Runtime.Log", CallFlags::ALLOW_NOTIFY, 1 << 15, runtime_log);
    engine.register_syscall("System.Runtime.Notify", CallFlags::ALLOW_NOTIFY, 1 << 15, runtime_notify);
    engine.register_syscall("System.Runtime.GasLeft", CallFlags::NONE, 1 << 4, runtime_gas_left);

    engine.register_syscall("System.Storage.GetContext", CallFlags::READ_STATES, 1 << 4, storage_get_context);
    engine.register_syscall(
        "System.Storage.GetReadOnlyContext",
        CallFlags::READ_STATES,
        1 << 4,
        storage_get_read_only_context,
    );
    engine.register_syscall("System.Storage.Get", CallFlags::READ_STATES, 1 << 15, storage_get);
    engine.register_syscall("System.Storage.Put", CallFlags::WRITE_STATES, 1 << 15, storage_put);
    engine.register_syscall("System.Storage.Delete", CallFlags::WRITE_STATES, 1 << 15, storage_delete);

    engine.register_syscall("System.Contract.GetCallFlags", CallFlags::NONE, 1 << 10, contract_get_call_flags);
    engine.register_syscall(
        "System.Contract.CreateStandardAccount",
        CallFlags::NONE,
        1 << 15,
        contract_create_standard_account,
    );
    engine.register_syscall("System.Contract.Call", CallFlags::ALLOW_CALL, 1 << 15, contract_call);

    engine.register_syscall("System.Crypto.CheckSig", CallFlags::NONE, 1 << 15, crypto_check_sig);
    engine.register_syscall("System.Crypto.CheckMultisig", CallFlags::NONE, 1 << 16, crypto_check_multisig);
}

fn runtime_platform(engine: &mut ExecutionEngine<AppContext>) -> Result<(), String> {
    engine.push(StackItem::from_bytes(b"NEO".to_vec()))
}

fn runtime_get_trigger(engine: &mut ExecutionEngine<AppContext>) -> Result<(), String> {
    let value = match engine.ctx.trigger {
        TriggerType::OnPersist => 0x10,
        TriggerType::PostPersist => 0x20,
        TriggerType::Verification => 0x20 | 0x01,
        TriggerType::Application => 0x40,
    };
    engine.push_int(num_bigint::BigInt::from(value))
}

fn runtime_get_time(engine: &mut ExecutionEngine<AppContext>) -> Result<(), String> {
    engine.push_int(num_bigint::BigInt::from(engine.ctx.block_time))
}

fn runtime_get_script_container(engine: &mut ExecutionEngine<AppContext>) -> Result<(), String> {
    match &engine.ctx.container {
        Container::Transaction(tx) => {
            let hash = tx.hash();
            engine.push(StackItem::from_bytes(hash.as_bytes().to_vec()))
        }
        Container::Block { .. } => engine.push(StackItem::Null),
    }
}

fn runtime_get_executing_script_hash(engine: &mut ExecutionEngine<AppContext>) -> Result<(), String> {
    let hash = current_script_hash(engine).ok_or("no executing context")?;
    engine.push(StackItem::from_bytes(hash.as_bytes().to_vec()))
}

fn runtime_get_calling_script_hash(engine: &mut ExecutionEngine<AppContext>) -> Result<(), String> {
    let depth = engine.invocation_stack.len();
    if depth < 2 {
        return engine.push(StackItem::Null);
    }
    let hash = UInt160::new(hash160(engine.invocation_stack[depth - 2].script.bytes()));
    engine.push(StackItem::from_bytes(hash.as_bytes().to_vec()))
}

fn runtime_get_entry_script_hash(engine: &mut ExecutionEngine<AppContext>) -> Result<(), String> {
    let hash = engine
        .invocation_stack
        .first()
        .map(|c| UInt160::new(hash160(c.script.bytes())))
        .ok_or("no executing context")?;
    engine.push(StackItem::from_bytes(hash.as_bytes().to_vec()))
}

fn runtime_check_witness(engine: &mut ExecutionEngine<AppContext>) -> Result<(), String> {
    let bytes = engine.pop_bytes()?;
    let hash = UInt160::from_bytes(&bytes).map_err(|e| e.to_string())?;
    let witnessed = crate::application_engine::check_witness(engine, hash);
    engine.push(StackItem::from_bool(witnessed))
}

fn runtime_log(engine: &mut ExecutionEngine<AppContext>) -> Result<(), String> {
    let bytes = engine.pop_bytes()?;
    if bytes.len() > MAX_LOG_MESSAGE_LENGTH {
        return Err("log message exceeds maximum length".to_string());
    }
    let message = String::from_utf8(bytes).map_err(|e| e.to_string())?;
    let script_hash = current_script_hash(engine).unwrap_or(UInt160::ZERO);
    engine.ctx.logs.push(LogEvent { script_hash, message });
    Ok(())
}

fn runtime_notify(engine: &mut ExecutionEngine<AppContext>) -> Result<(), String> {
    let state = engine.pop()?;
    let name_bytes = engine.pop_bytes()?;
    if name_bytes.len() > MAX_NOTIFICATION_NAME_LENGTH {
        return Err("event name exceeds maximum length".to_string());
    }
    let event_name = String::from_utf8(name_bytes).map_err(|e| e.to_string())?;
    let state_items = match state {
        StackItem::Array(h) => match engine.reference_counter.data(h) {
            neo_vm::CompoundData::Array(items) => items.clone(),
            _ => unreachable!(),
        },
        other => vec![other],
    };
    let script_hash = current_script_hash(engine).unwrap_or(UInt160::ZERO);
    engine.ctx.notifications.push(NotifyEvent { script_hash, event_name, state: state_items });
    Ok(())
}

fn runtime_gas_left(engine: &mut ExecutionEngine<AppContext>) -> Result<(), String> {
    let left = if engine.gas_limit <= 0 { i64::MAX } else { engine.gas_limit - engine.gas_consumed };
    engine.push_int(num_bigint::BigInt::from(left))
}

fn current_contract_id(engine: &ExecutionEngine<AppContext>, hash: &UInt160) -> Option<i32> {
    engine.ctx.natives.by_hash(hash).map(|n| n.id()).or_else(|| {
        contract_management::ContractManagement::load(engine, hash).map(|state| state.id)
    })
}

fn current_script_hash(engine: &ExecutionEngine<AppContext>) -> Option<UInt160> {
    engine.current_context().map(|c| UInt160::new(hash160(c.script.bytes())))
}

fn storage_get_context(engine: &mut ExecutionEngine<AppContext>) -> Result<(), String> {
    let hash = current_script_hash(engine).ok_or("no executing context")?;
    let id = current_contract_id(engine, &hash).ok_or("calling contract is not deployed")?;
    engine.push_int(num_bigint::BigInt::from(id))
}

fn storage_get_read_only_context(engine: &mut ExecutionEngine<AppContext>) -> Result<(), String> {
    let hash = current_script_hash(engine).ok_or("no executing context")?;
    let id = current_contract_id(engine, &hash).ok_or("calling contract is not deployed")?;
    // Negated id marks the context read-only; Put/Delete reject a negative id.
    engine.push_int(num_bigint::BigInt::from(-id - 1))
}

fn context_id(item_sign: i64) -> (i32, bool) {
    if item_sign < 0 {
        ((-item_sign - 1) as i32, true)
    } else {
        (item_sign as i32, false)
    }
}

fn storage_get(engine: &mut ExecutionEngine<AppContext>) -> Result<(), String> {
    let key = engine.pop_bytes()?;
    let raw_id = engine.pop_int()?;
    let (contract_id, _) = context_id(raw_id.to_i64().ok_or("storage context out of range")?);
    let storage_key = StorageKey::new(contract_id, key);
    match engine.ctx.snapshot.try_get(&storage_key.to_bytes()) {
        Some(bytes) => engine.push(StackItem::from_bytes(bytes)),
        None => engine.push(StackItem::Null),
    }
}

fn storage_put(engine: &mut ExecutionEngine<AppContext>) -> Result<(), String> {
    let value = engine.pop_bytes()?;
    let key = engine.pop_bytes()?;
    let raw_id = engine.pop_int()?;
    let (contract_id, read_only) = context_id(raw_id.to_i64().ok_or("storage context out of range")?);
    if read_only {
        return Err("cannot write through a read-only storage context".to_string());
    }
    engine.check_item_size(key.len())?;
    engine.check_item_size(value.len())?;
    let storage_key = StorageKey::new(contract_id, key);
    engine.ctx.snapshot.update(&storage_key.to_bytes(), value);
    Ok(())
}

fn storage_delete(engine: &mut ExecutionEngine<AppContext>) -> Result<(), String> {
    let key = engine.pop_bytes()?;
    let raw_id = engine.pop_int()?;
    let (contract_id, read_only) = context_id(raw_id.to_i64().ok_or("storage context out of range")?);
    if read_only {
        return Err("cannot write through a read-only storage context".to_string());
    }
    let storage_key = StorageKey::new(contract_id, key);
    engine.ctx.snapshot.delete(&storage_key.to_bytes());
    Ok(())
}

fn contract_get_call_flags(engine: &mut ExecutionEngine<AppContext>) -> Result<(), String> {
    let flags = engine.current_context().map(|c| c.call_flags).unwrap_or(CallFlags::NONE);
    engine.push_int(num_bigint::BigInt::from(flags.bits()))
}

fn contract_create_standard_account(engine: &mut ExecutionEngine<AppContext>) -> Result<(), String> {
    let pubkey = engine.pop_bytes()?;
    if pubkey.len() != 33 {
        return Err("expected a 33-byte compressed public key".to_string());
    }
    let mut script = Vec::with_capacity(2 + pubkey.len() + 5);
    script.push(neo_vm::OpCode::PushData1 as u8);
    script.push(pubkey.len() as u8);
    script.extend_from_slice(&pubkey);
    script.push(neo_vm::OpCode::Syscall as u8);
    script.extend_from_slice(&neo_vm::syscall_hash("System.Crypto.CheckSig").to_le_bytes());
    let hash = UInt160::new(hash160(&script));
    engine.push(StackItem::from_bytes(hash.as_bytes().to_vec()))
}

/// Dispatches to a native contract directly, or, for a deployed contract,
/// pushes a fresh [`ExecutionContext`] over its NEF script at the ABI
/// method's offset; [`ExecutionEngine::execute`] runs it to completion and
/// its `RET` drains the callee stack back onto the caller's, so the result
/// is visible to the script that issued this syscall once it resumes.
fn contract_call(engine: &mut ExecutionEngine<AppContext>) -> Result<(), String> {
    let args_item = engine.pop()?;
    let flags_raw = engine.pop_int()?.to_i64().ok_or("call flags out of range")?;
    let method = String::from_utf8(engine.pop_bytes()?).map_err(|e| e.to_string())?;
    let hash = UInt160::from_bytes(&engine.pop_bytes()?).map_err(|e| e.to_string())?;

    let caller_flags = engine.current_context().map(|c| c.call_flags).unwrap_or(CallFlags::NONE);
    if !caller_flags.contains(CallFlags::ALLOW_CALL) {
        return Err("calling contract requires the AllowCall flag".to_string());
    }
    let requested = CallFlags::from_bits_truncate(flags_raw as u8);
    let effective = requested & caller_flags;

    let args = match args_item {
        StackItem::Array(h) => match engine.reference_counter.data(h) {
            neo_vm::CompoundData::Array(items) => items.clone(),
            _ => unreachable!(),
        },
        other => vec![other],
    };

    if let Some(native) = engine.ctx.natives.by_hash(&hash).cloned() {
        let descriptor = native
            .find_method(&method, args.len())
            .ok_or_else(|| format!("{} has no method {} with {} parameters", native.contract_name(), method, args.len()))?;
        if !effective.contains(descriptor.required_call_flags) {
            return Err(format!("{}.{} requires call flags {:?}", native.contract_name(), method, descriptor.required_call_flags));
        }
        let result = native.invoke(engine, &method, args).map_err(|e| e.to_string())?;
        return engine.push(result);
    }

    let state = contract_management::ContractManagement::load(engine, &hash)
        .ok_or_else(|| format!("contract {hash} not found"))?;
    let descriptor = state
        .manifest
        .abi
        .find_method(&method, args.len())
        .ok_or_else(|| format!("{} has no method {} with {} parameters", hash, method, args.len()))?
        .offset;

    let script = Script::new(state.nef.script.clone()).map_err(|e| e.to_string())?;
    let mut callee = ExecutionContext::new(script, effective, 0);
    callee.instruction_pointer = descriptor as usize;
    for arg in args.into_iter().rev() {
        if let Some(h) = arg.compound_handle() {
            engine.reference_counter.add_stack_ref(h);
        }
        callee.evaluation_stack.push(arg, &mut engine.reference_counter).map_err(|e| e.to_string())?;
    }
    engine.invocation_stack.push(callee);
    Ok(())
}

fn sign_data(engine: &ExecutionEngine<AppContext>) -> Result<[u8; 32], String> {
    match &engine.ctx.container {
        Container::Transaction(tx) => Ok(tx.hash().0),
        Container::Block { .. } => Err("no transaction to verify a signature against".to_string()),
    }
}

fn crypto_check_sig(engine: &mut ExecutionEngine<AppContext>) -> Result<(), String> {
    let signature = engine.pop_bytes()?;
    let pubkey = engine.pop_bytes()?;
    let digest = sign_data(engine)?;
    let ok = neo_cryptography::verify(Curve::Secp256r1, &pubkey, &digest, &signature);
    engine.push(StackItem::from_bool(ok))
}

fn crypto_check_multisig(engine: &mut ExecutionEngine<AppContext>) -> Result<(), String> {
    let signatures = pop_byte_array(engine)?;
    let pubkeys = pop_byte_array(engine)?;
    if signatures.len() > pubkeys.len() {
        return Err("more signatures than public keys".to_string());
    }
    let digest = sign_data(engine)?;
    let mut sig_iter = signatures.iter();
    let mut expected = sig_iter.next();
    let mut matched = 0;
    for pubkey in &pubkeys {
        let Some(sig) = expected else { break };
        if neo_cryptography::verify(Curve::Secp256r1, pubkey, &digest, sig) {
            matched += 1;
            expected = sig_iter.next();
        }
    }
    engine.push(StackItem::from_bool(expected.is_none() && matched == signatures.len()))
}

fn pop_byte_array(engine: &mut ExecutionEngine<AppContext>) -> Result<Vec<Vec<u8>>, String> {
    let item = engine.pop()?;
    let handle = match item {
        StackItem::Array(h) => h,
        _ => return Err("expected an array".to_string()),
    };
    let neo_vm::CompoundData::Array(items) = engine.reference_counter.data(handle) else {
        return Err("expected an array".to_string());
    };
    items
        .iter()
        .map(|i| match i {
            StackItem::ByteString(b) => Ok(b.to_vec()),
            _ => Err("expected a byte string element".to_string()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application_engine::ApplicationEngine;
    use crate::native::NativeRegistry;
    use neo_persistence::{DataCache, MemoryStore, Store};
    use neo_vm::VmState;
    use std::sync::Arc;

    fn empty_snapshot() -> DataCache<Box<dyn Store>> {
        let store: Box<dyn Store> = Box::new(MemoryStore::new());
        DataCache::new(store)
    }

    #[test]
    fn platform_syscall_pushes_neo() {
        let natives = Arc::new(NativeRegistry::new());
        let mut app = ApplicationEngine::new(
            TriggerType::Application,
            empty_snapshot(),
            Container::Block { index: 0 },
            0,
            0,
            natives,
            10_000_000,
        );
        // SYSCALL System.Runtime.Platform ; RET
        let mut script = vec![neo_vm::OpCode::Syscall as u8];
        script.extend_from_slice(&neo_vm::syscall_hash("System.Runtime.Platform").to_le_bytes());
        script.push(0x40);
        app.load_script(script, CallFlags::ALL).unwrap();
        assert_eq!(app.execute(), VmState::Halt);
    }

    #[test]
    fn storage_put_then_get_round_trips() {
        let natives = Arc::new(NativeRegistry::new());
        let mut app = ApplicationEngine::new(
            TriggerType::Application,
            empty_snapshot(),
            Container::Block { index: 0 },
            0,
            0,
            natives,
            10_000_000,
        );
        app.engine.ctx.snapshot.update(&StorageKey::new(5, b"k".to_vec()).to_bytes(), b"v".to_vec());
        let fetched = app.engine.ctx.snapshot.try_get(&StorageKey::new(5, b"k".to_vec()).to_bytes());
        assert_eq!(fetched, Some(b"v".to_vec()));
    }

    #[test]
    fn contract_call_dispatches_to_a_native() {
        let natives = Arc::new(NativeRegistry::new());
        let mut app = ApplicationEngine::new(
            TriggerType::Application,
            empty_snapshot(),
            Container::Block { index: 0 },
            0,
            0,
            natives,
            10_000_000,
        );
        // A context with AllowCall is required before the callee can be dispatched.
        app.load_script(vec![0x40], CallFlags::ALL).unwrap();

        let hash = crate::native::StdLibContract::default().script_hash();
        app.engine.push(StackItem::from_bytes(hash.as_bytes().to_vec())).unwrap();
        app.engine.push(StackItem::from_bytes(b"atoi".to_vec())).unwrap();
        app.engine.push_int(num_bigint::BigInt::from(CallFlags::ALL.bits())).unwrap();
        let args = app.engine.alloc_array(vec![StackItem::from_bytes(b"42".to_vec())]).unwrap();
        app.engine.push(args).unwrap();

        contract_call(&mut app.engine).unwrap();
        let result = app.engine.pop().unwrap();
        assert_eq!(result.as_int().unwrap(), num_bigint::BigInt::from(42));
    }
}
