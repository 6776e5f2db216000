//! `ApplicationEngine`: the glue that executes a contract script against a
//! ledger snapshot (spec §4.5) — a `neo_vm::ExecutionEngine` generalized
//! over `neo-vm`'s host-context type parameter with an [`AppContext`]
//! carrying the `DataCache`, trigger, container, notifications and logs.

use std::sync::Arc;

use neo_core::{Transaction, UInt160, WitnessCondition, WitnessRuleAction, WitnessScope};
use neo_cryptography::hash160;
use neo_persistence::{DataCache, Store};
use neo_vm::{CallFlags, ExecutionEngine, ExecutionLimits, Script, VmState};

use crate::error::{ScError, ScResult};
use crate::native::{self, NativeRegistry};
use crate::trigger::TriggerType;

/// One-byte always-true script, the same stand-in
/// `neo_ledger::genesis_authority_script` uses for genesis's
/// `nextConsensus` — this repo has no standby-committee key material, so
/// before any candidate registers with [`native::committee_account`] this
/// is the account governance setters trust.
pub(crate) fn bootstrap_committee_account() -> UInt160 {
    UInt160::new(hash160(&[0x11]))
}

/// What the executing script is running on behalf of.
#[derive(Debug, Clone)]
pub enum Container {
    Transaction(Transaction),
    /// `OnPersist`/`PostPersist` run with no transaction container, only a
    /// block index.
    Block { index: u32 },
}

#[derive(Debug, Clone)]
pub struct NotifyEvent {
    pub script_hash: UInt160,
    pub event_name: String,
    pub state: Vec<neo_vm::StackItem>,
}

#[derive(Debug, Clone)]
pub struct LogEvent {
    pub script_hash: UInt160,
    pub message: String,
}

/// Host state threaded through every `SYSCALL` handler.
pub struct AppContext {
    pub snapshot: DataCache<Box<dyn Store>>,
    pub trigger: TriggerType,
    pub container: Container,
    /// Index of the block being persisted (or the block containing
    /// `container`, for an `Application`-trigger run).
    pub block_index: u32,
    pub block_time: u64,
    pub natives: Arc<NativeRegistry>,
    pub notifications: Vec<NotifyEvent>,
    pub logs: Vec<LogEvent>,
}

impl AppContext {
    /// The hash carried by the container, when it is a transaction.
    pub fn container_script_hash(&self) -> Option<UInt160> {
        match &self.container {
            Container::Transaction(tx) => tx.sender(),
            Container::Block { .. } => None,
        }
    }

    pub fn container_signers(&self) -> &[neo_core::Signer] {
        match &self.container {
            Container::Transaction(tx) => &tx.signers,
            Container::Block { .. } => &[],
        }
    }
}

pub struct ApplicationEngine {
    pub engine: ExecutionEngine<AppContext>,
}

impl ApplicationEngine {
    pub fn new(
        trigger: TriggerType,
        snapshot: DataCache<Box<dyn Store>>,
        container: Container,
        block_index: u32,
        block_time: u64,
        natives: Arc<NativeRegistry>,
        gas_limit: i64,
    ) -> Self {
        let ctx = AppContext {
            snapshot,
            trigger,
            container,
            block_index,
            block_time,
            natives,
            notifications: Vec::new(),
            logs: Vec::new(),
        };
        let mut engine = ExecutionEngine::new(ctx, gas_limit, ExecutionLimits::default());
        crate::interop::register_all(&mut engine);
        Self { engine }
    }

    /// Loads `script` as the entry context with `call_flags`.
    pub fn load_script(&mut self, script_bytes: Vec<u8>, call_flags: CallFlags) -> ScResult<()> {
        let script = Script::new(script_bytes).map_err(|e| ScError::Other(e.to_string()))?;
        self.engine.load_script(script, call_flags);
        Ok(())
    }

    pub fn execute(&mut self) -> VmState {
        self.engine.execute()
    }

    pub fn gas_consumed(&self) -> i64 {
        self.engine.gas_consumed
    }

    pub fn fault_message(&self) -> Option<&str> {
        self.engine.fault_message.as_deref()
    }

    pub fn notifications(&self) -> &[NotifyEvent] {
        &self.engine.ctx.notifications
    }

    pub fn logs(&self) -> &[LogEvent] {
        &self.engine.ctx.logs
    }

    /// The script hash of the currently executing context.
    pub fn current_script_hash(&self) -> Option<UInt160> {
        self.engine
            .current_context()
            .map(|c| UInt160::new(hash160(c.script.bytes())))
    }

    /// Top of the result stack after a `Halt`, as a boolean — the shape a
    /// witness or `Verification`-trigger run is checked against.
    pub fn result_is_truthy(&self) -> bool {
        self.engine
            .result_stack()
            .first()
            .map(|item| item.as_bool(&self.engine.reference_counter))
            .unwrap_or(false)
    }

    /// `System.Runtime.CheckWitness` (spec §3.4/§4.5): `hash` is witnessed
    /// if some signer's account matches it and that signer's scope permits
    /// the current call stack — `Global` always, `CalledByEntry` only when
    /// the immediate caller is the entry script (or there is none), custom
    /// contracts/groups against the executing script, and `WitnessRules`
    /// by evaluating the first matching rule's condition tree.
    pub fn check_witness(&self, hash: UInt160) -> bool {
        check_witness(&self.engine, hash)
    }

    /// Governance setters (Policy/RoleManagement) require this before
    /// mutating state (spec §4.4): the live committee multisig is
    /// witnessed once a candidate has registered, or
    /// [`bootstrap_committee_account`] before then.
    pub fn check_committee_witness(&self) -> bool {
        let committee = native::committee_account(&self.engine).unwrap_or_else(bootstrap_committee_account);
        self.check_witness(committee)
    }

    /// Reclaims the snapshot this engine was constructed with, carrying
    /// whatever changes the run staged — callers decide whether to
    /// `commit()` them or fold them into a fresh cache after a fault.
    pub fn into_snapshot(self) -> DataCache<Box<dyn Store>> {
        self.engine.ctx.snapshot
    }
}

/// Script hash of the context one level up the invocation stack from
/// `depth`, or `None` when `depth` is the entry context.
fn calling_script_hash_at(engine: &ExecutionEngine<AppContext>, depth: usize) -> Option<UInt160> {
    if depth < 2 {
        return None;
    }
    Some(UInt160::new(hash160(engine.invocation_stack[depth - 2].script.bytes())))
}

fn manifest_groups(engine: &ExecutionEngine<AppContext>, hash: &UInt160) -> Vec<Vec<u8>> {
    crate::native::contract_groups(engine, hash)
}

fn evaluate_condition(
    condition: &WitnessCondition,
    engine: &ExecutionEngine<AppContext>,
    current_hash: UInt160,
    calling_hash: Option<UInt160>,
) -> bool {
    match condition {
        WitnessCondition::Boolean(value) => *value,
        WitnessCondition::Not(inner) => !evaluate_condition(inner, engine, current_hash, calling_hash),
        WitnessCondition::And(conditions) => {
            conditions.iter().all(|c| evaluate_condition(c, engine, current_hash, calling_hash))
        }
        WitnessCondition::Or(conditions) => {
            conditions.iter().any(|c| evaluate_condition(c, engine, current_hash, calling_hash))
        }
        WitnessCondition::ScriptHash(hash) => *hash == current_hash,
        WitnessCondition::Group(pubkey) => manifest_groups(engine, &current_hash).iter().any(|g| g == pubkey),
        WitnessCondition::CalledByEntry => calling_hash.map_or(true, |h| Some(h) == entry_script_hash(engine)),
        WitnessCondition::CalledByContract(hash) => calling_hash == Some(*hash),
        WitnessCondition::CalledByGroup(pubkey) => {
            calling_hash.map_or(false, |h| manifest_groups(engine, &h).iter().any(|g| g == pubkey))
        }
    }
}

fn entry_script_hash(engine: &ExecutionEngine<AppContext>) -> Option<UInt160> {
    engine.invocation_stack.first().map(|c| UInt160::new(hash160(c.script.bytes())))
}

/// Shared by [`ApplicationEngine::check_witness`] and the
/// `System.Runtime.CheckWitness` syscall (`interop::runtime_check_witness`),
/// so a contract's own witness check and the engine's internal committee
/// check evaluate scope identically.
pub(crate) fn check_witness(engine: &ExecutionEngine<AppContext>, hash: UInt160) -> bool {
    let depth = engine.invocation_stack.len();
    let current_hash = match entry_script_hash_at_depth(engine, depth) {
        Some(h) => h,
        None => return false,
    };
    let calling_hash = calling_script_hash_at(engine, depth);
    let entry_hash = entry_script_hash(engine);

    engine.ctx.container_signers().iter().any(|signer| {
        if signer.account != hash {
            return false;
        }
        if signer.scopes.contains(WitnessScope::GLOBAL) {
            return true;
        }
        if signer.scopes.contains(WitnessScope::CALLED_BY_ENTRY)
            && calling_hash.map_or(true, |h| Some(h) == entry_hash)
        {
            return true;
        }
        if signer.scopes.contains(WitnessScope::CUSTOM_CONTRACTS)
            && signer.allowed_contracts.contains(&current_hash)
        {
            return true;
        }
        if signer.scopes.contains(WitnessScope::CUSTOM_GROUPS) {
            let groups = manifest_groups(engine, &current_hash);
            if signer.allowed_groups.iter().any(|g| groups.contains(g)) {
                return true;
            }
        }
        if signer.scopes.contains(WitnessScope::WITNESS_RULES) {
            for rule in &signer.rules {
                if evaluate_condition(&rule.condition, engine, current_hash, calling_hash) {
                    return rule.action == WitnessRuleAction::Allow;
                }
            }
        }
        false
    })
}

fn entry_script_hash_at_depth(engine: &ExecutionEngine<AppContext>, depth: usize) -> Option<UInt160> {
    if depth == 0 {
        return None;
    }
    Some(UInt160::new(hash160(engine.invocation_stack[depth - 1].script.bytes())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use neo_persistence::MemoryStore;

    fn empty_snapshot() -> DataCache<Box<dyn Store>> {
        let store: Box<dyn Store> = Box::new(MemoryStore::new());
        DataCache::new(store)
    }

    #[test]
    fn halts_on_a_trivial_script() {
        let natives = Arc::new(NativeRegistry::new());
        let mut engine = ApplicationEngine::new(
            TriggerType::Application,
            empty_snapshot(),
            Container::Block { index: 0 },
            0,
            0,
            natives,
            10_000_000,
        );
        // PUSH1 RET
        engine.load_script(vec![0x11, 0x40], CallFlags::ALL).unwrap();
        assert_eq!(engine.execute(), VmState::Halt);
    }

    #[test]
    fn faults_on_stack_underflow() {
        let natives = Arc::new(NativeRegistry::new());
        let mut engine = ApplicationEngine::new(
            TriggerType::Application,
            empty_snapshot(),
            Container::Block { index: 0 },
            0,
            0,
            natives,
            10_000_000,
        );
        // DROP with nothing on the stack.
        engine.load_script(vec![0x45], CallFlags::ALL).unwrap();
        assert_eq!(engine.execute(), VmState::Fault);
    }
}
