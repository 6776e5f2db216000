//! Witness verification (spec §4.5): compose a witness's verification
//! script with its invocation script prepended and run it; a truthy top
//! of the result stack authorizes the signer/`nextConsensus` it stands
//! for. Signature checks (`System.Crypto.CheckSig`/`CheckMultisig`) and
//! `System.Runtime.CheckWitness` are the VM's own syscalls — this module
//! only drives the engine that evaluates them. `Signer.scopes`/`rules`
//! don't gate whether a verification script runs here (every listed
//! witness always runs in full); they gate `CheckWitness` calls a script
//! makes against *other* accounts, which is enforced once, in the shared
//! `application_engine::check_witness` this module's engine also runs
//! through.
//!
//! Contract-based witnesses (an empty verification script whose account
//! resolves to a deployed contract's own `verify` method) are not
//! implemented; every witness here must carry an embedded verification
//! script whose hash matches the account it witnesses.

use std::sync::Arc;

use neo_core::{UInt160, Witness};
use neo_smart_contract::{
    native::NativeRegistry, ApplicationEngine, Container, TriggerType,
};
use neo_vm::CallFlags;

use crate::store_adapter::{layered_cache, ChainStore};

/// Gas allowance for a single witness run — matches the reference
/// client's `MaxVerificationGas` (0.5 GAS at 8 decimals).
pub const MAX_VERIFICATION_GAS: i64 = 50_000_000;

/// Verifies `witness` authorizes `account` as of `store`/`natives`,
/// running under `container` at `block_index`.
pub fn verify(
    store: &ChainStore,
    natives: &Arc<NativeRegistry>,
    witness: &Witness,
    account: UInt160,
    container: Container,
    block_index: u32,
) -> bool {
    if witness.verification_script.is_empty() {
        return false;
    }
    if witness.script_hash() != account {
        return false;
    }

    let mut combined = witness.invocation_script.clone();
    combined.extend_from_slice(&witness.verification_script);

    let mut engine = ApplicationEngine::new(
        TriggerType::Verification,
        layered_cache(store),
        container,
        block_index,
        0,
        natives.clone(),
        MAX_VERIFICATION_GAS,
    );
    if engine.load_script(combined, CallFlags::READ_ONLY).is_err() {
        return false;
    }
    engine.execute() == neo_vm::VmState::Halt && engine.result_is_truthy()
}

#[cfg(test)]
mod tests {
    use super::*;
    use neo_core::Transaction;
    use neo_persistence::MemoryStore;

    fn store() -> ChainStore {
        Arc::new(MemoryStore::new())
    }

    fn sample_tx() -> Transaction {
        Transaction {
            version: 0,
            nonce: 1,
            system_fee: 0,
            network_fee: 0,
            valid_until_block: 1000,
            signers: vec![],
            attributes: vec![],
            script: vec![0x51],
            witnesses: vec![],
        }
    }

    #[test]
    fn a_push_true_verification_script_authorizes_its_own_hash() {
        let verification_script = vec![0x11]; // PUSH1
        let witness = Witness::new(vec![], verification_script.clone());
        let account = witness.script_hash();
        let natives = Arc::new(NativeRegistry::new());
        let ok = verify(
            &store(),
            &natives,
            &witness,
            account,
            Container::Transaction(sample_tx()),
            0,
        );
        assert!(ok);
    }

    #[test]
    fn a_push_false_verification_script_is_rejected() {
        let verification_script = vec![0x10]; // PUSH0
        let witness = Witness::new(vec![], verification_script.clone());
        let account = witness.script_hash();
        let natives = Arc::new(NativeRegistry::new());
        let ok = verify(
            &store(),
            &natives,
            &witness,
            account,
            Container::Transaction(sample_tx()),
            0,
        );
        assert!(!ok);
    }

    #[test]
    fn a_script_hash_mismatch_is_rejected_without_running_the_script() {
        let witness = Witness::new(vec![], vec![0x11]);
        let natives = Arc::new(NativeRegistry::new());
        let ok = verify(
            &store(),
            &natives,
            &witness,
            UInt160::ZERO,
            Container::Transaction(sample_tx()),
            0,
        );
        assert!(!ok);
    }
}
