//! Native contracts (spec §4.4): a registry mapping contract id and script
//! hash to a built-in implementation invoked from `System.Contract.Call`
//! rather than interpreted bytecode.

pub(crate) mod contract_management;
mod crypto_lib;
mod fungible_token;
mod gas_token;
mod ledger_contract;
mod neo_token;
mod oracle;
mod policy;
mod role_management;
mod std_lib;

pub use contract_management::ContractManagement;
pub use crypto_lib::CryptoLib;
pub use gas_token::GasToken;
pub use ledger_contract::LedgerContract;
pub use neo_token::{committee_account, NeoToken};
pub use oracle::Oracle;
pub use policy::PolicyContract;
pub use role_management::RoleManagement;
pub use std_lib::StdLibContract;

use std::collections::HashMap;

use neo_core::UInt160;
use neo_vm::{CallFlags, StackItem};

use crate::application_engine::AppContext;
use crate::error::{ScError, ScResult};

/// A single callable entry point on a native contract.
pub struct NativeMethod {
    pub name: &'static str,
    pub param_count: usize,
    pub gas_cost: i64,
    pub safe: bool,
    pub required_call_flags: CallFlags,
}

impl NativeMethod {
    pub const fn safe(name: &'static str, param_count: usize, gas_cost: i64) -> Self {
        Self { name, param_count, gas_cost, safe: true, required_call_flags: CallFlags::READ_STATES }
    }

    pub const fn mutating(
        name: &'static str,
        param_count: usize,
        gas_cost: i64,
        required_call_flags: CallFlags,
    ) -> Self {
        Self { name, param_count, gas_cost, safe: false, required_call_flags }
    }
}

/// A built-in contract invoked directly by id/hash, not by interpreting a
/// script. `engine` is the raw VM engine so natives share the same
/// evaluation-stack/gas-accounting primitives syscall handlers use.
pub trait NativeContract: Send + Sync {
    fn id(&self) -> i32;
    fn contract_name(&self) -> &'static str;
    fn methods(&self) -> &[NativeMethod];

    fn invoke(
        &self,
        engine: &mut neo_vm::ExecutionEngine<AppContext>,
        method: &str,
        args: Vec<StackItem>,
    ) -> ScResult<StackItem>;

    fn initialize(&self, _engine: &mut neo_vm::ExecutionEngine<AppContext>) -> ScResult<()> {
        Ok(())
    }

    fn on_persist(&self, _engine: &mut neo_vm::ExecutionEngine<AppContext>) -> ScResult<()> {
        Ok(())
    }

    fn post_persist(&self, _engine: &mut neo_vm::ExecutionEngine<AppContext>) -> ScResult<()> {
        Ok(())
    }

    /// Script hash a native is addressable at: `Hash160("NativeContract:<name>")`,
    /// matching the reference client's derivation of a native's script hash
    /// from its name rather than a real deployed script.
    fn script_hash(&self) -> UInt160 {
        let preimage = format!("NativeContract:{}", self.contract_name());
        UInt160::new(neo_cryptography::hash160(preimage.as_bytes()))
    }

    fn find_method(&self, name: &str, param_count: usize) -> Option<&NativeMethod> {
        self.methods().iter().find(|m| m.name == name && m.param_count == param_count)
    }
}

/// Looks natives up by contract id (storage key prefix) or script hash
/// (`System.Contract.Call` target).
pub struct NativeRegistry {
    by_id: HashMap<i32, std::sync::Arc<dyn NativeContract>>,
    by_hash: HashMap<UInt160, i32>,
}

impl NativeRegistry {
    pub fn new() -> Self {
        let mut registry = Self { by_id: HashMap::new(), by_hash: HashMap::new() };
        registry.register(std::sync::Arc::new(ContractManagement::new()));
        registry.register(std::sync::Arc::new(StdLibContract::new()));
        registry.register(std::sync::Arc::new(CryptoLib::new()));
        registry.register(std::sync::Arc::new(LedgerContract::new()));
        registry.register(std::sync::Arc::new(NeoToken::new()));
        registry.register(std::sync::Arc::new(GasToken::new()));
        registry.register(std::sync::Arc::new(PolicyContract::new()));
        registry.register(std::sync::Arc::new(RoleManagement::new()));
        registry.register(std::sync::Arc::new(Oracle::new()));
        registry
    }

    fn register(&mut self, native: std::sync::Arc<dyn NativeContract>) {
        self.by_hash.insert(native.script_hash(), native.id());
        self.by_id.insert(native.id(), native);
    }

    pub fn by_id(&self, id: i32) -> Option<&std::sync::Arc<dyn NativeContract>> {
        self.by_id.get(&id)
    }

    pub fn by_hash(&self, hash: &UInt160) -> Option<&std::sync::Arc<dyn NativeContract>> {
        self.by_hash.get(hash).and_then(|id| self.by_id.get(id))
    }

    pub fn all(&self) -> impl Iterator<Item = &std::sync::Arc<dyn NativeContract>> {
        self.by_id.values()
    }
}

impl Default for NativeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn arity_error(contract: &'static str, method: &str) -> ScError {
    ScError::UnknownNativeMethod(contract, method.to_string())
}

/// Deployed-contract manifest group pubkeys at `hash`, for
/// `Group`/`CalledByGroup` witness-condition evaluation.
pub(crate) fn contract_groups(engine: &neo_vm::ExecutionEngine<AppContext>, hash: &UInt160) -> Vec<Vec<u8>> {
    ContractManagement::load(engine, hash)
        .map(|state| state.manifest.groups.iter().filter_map(|g| hex::decode(&g.pubkey).ok()).collect())
        .unwrap_or_default()
}

/// Gate shared by every governance setter (Policy's fee/price/block-account
/// setters, RoleManagement's `designateAsRole`): spec §4.4 requires a
/// committee witness before any of them mutate state.
pub(crate) fn require_committee_witness(engine: &neo_vm::ExecutionEngine<AppContext>) -> ScResult<()> {
    let committee = committee_account(engine).unwrap_or_else(crate::application_engine::bootstrap_committee_account);
    if crate::application_engine::check_witness(engine, committee) {
        Ok(())
    } else {
        Err(ScError::Other("committee witness required".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_resolves_every_native_by_both_id_and_hash() {
        let registry = NativeRegistry::new();
        for native in registry.all() {
            assert!(registry.by_id(native.id()).is_some());
            assert!(registry.by_hash(&native.script_hash()).is_some());
        }
    }
}
