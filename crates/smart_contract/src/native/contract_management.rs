//! ContractManagement: deploy/update/destroy user contracts and look them
//! up by hash or id (spec §4.4).

use neo_core::UInt160;
use neo_io::{BinaryWriter, MemoryReader, Serializable};
use neo_vm::{CallFlags, ExecutionEngine, StackItem};

use super::{NativeContract, NativeMethod};
use crate::application_engine::AppContext;
use crate::contract_state::ContractState;
use crate::error::{ScError, ScResult};
use crate::manifest::ContractManifest;
use crate::nef::NefFile;

pub const ID: i32 = -1;

const PREFIX_NEXT_ID: u8 = 15;
const PREFIX_CONTRACT: u8 = 8;
const PREFIX_CONTRACT_HASH_BY_ID: u8 = 12;

pub const DEFAULT_MINIMUM_DEPLOYMENT_FEE: i64 = 10_0000_0000;

pub struct ContractManagement {
    methods: Vec<NativeMethod>,
}

impl ContractManagement {
    pub fn new() -> Self {
        Self {
            methods: vec![
                NativeMethod::safe("getContract", 1, 1 << 15),
                NativeMethod::safe("getContractById", 1, 1 << 15),
                NativeMethod::mutating("deploy", 2, 0, CallFlags::STATES),
                NativeMethod::mutating("update", 2, 0, CallFlags::STATES),
                NativeMethod::mutating("destroy", 0, 1 << 15, CallFlags::STATES),
            ],
        }
    }

    fn key(prefix: u8, suffix: &[u8]) -> neo_core::StorageKey {
        let mut key = vec![prefix];
        key.extend_from_slice(suffix);
        neo_core::StorageKey::new(ID, key)
    }

    fn next_id(engine: &mut ExecutionEngine<AppContext>) -> i32 {
        let key = Self::key(PREFIX_NEXT_ID, &[]).to_bytes();
        let id = match engine.ctx.snapshot.try_get(&key) {
            Some(bytes) if bytes.len() == 4 => i32::from_le_bytes(bytes.try_into().unwrap()) + 1,
            _ => 1,
        };
        engine.ctx.snapshot.update(&key, id.to_le_bytes().to_vec());
        id
    }

    pub fn load(engine: &ExecutionEngine<AppContext>, hash: &UInt160) -> Option<ContractState> {
        let bytes = engine.ctx.snapshot.try_get(&Self::key(PREFIX_CONTRACT, hash.as_bytes()).to_bytes())?;
        let mut reader = MemoryReader::new(&bytes);
        ContractState::deserialize(&mut reader).ok()
    }

    fn store(engine: &mut ExecutionEngine<AppContext>, state: &ContractState) {
        let mut writer = BinaryWriter::new();
        state.serialize(&mut writer).expect("in-memory writer cannot fail");
        engine.ctx.snapshot.update(&Self::key(PREFIX_CONTRACT, state.hash.as_bytes()).to_bytes(), writer.to_bytes());
        engine.ctx.snapshot.update(
            &Self::key(PREFIX_CONTRACT_HASH_BY_ID, &state.id.to_le_bytes()).to_bytes(),
            state.hash.as_bytes().to_vec(),
        );
    }

    fn hash_by_id(engine: &ExecutionEngine<AppContext>, id: i32) -> Option<UInt160> {
        let bytes = engine.ctx.snapshot.try_get(&Self::key(PREFIX_CONTRACT_HASH_BY_ID, &id.to_le_bytes()).to_bytes())?;
        UInt160::from_bytes(&bytes).ok()
    }

    fn contract_state_to_item(state: &ContractState) -> ScResult<StackItem> {
        let manifest_json = state.manifest.to_json()?;
        Ok(StackItem::from_bytes(
            format!("{}:{}:{}", state.id, state.hash, manifest_json).into_bytes(),
        ))
    }
}

impl Default for ContractManagement {
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

fn expect_bytes(item: &StackItem) -> ScResult<Vec<u8>> {
    match item {
        StackItem::ByteString(b) => Ok(b.to_vec()),
        _ => Err(ScError::Other("expected a byte string argument".to_string())),
    }
}

impl NativeContract for ContractManagement {
    fn id(&self) -> i32 {
        ID
    }

    fn contract_name(&self) -> &'static str {
        "ContractManagement"
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
            "getContract" => {
                let hash = expect_hash160(&args[0])?;
                match Self::load(engine, &hash) {
                    Some(state) => Self::contract_state_to_item(&state),
                    None => Ok(StackItem::Null),
                }
            }
            "getContractById" => {
                let id = args[0].as_int().map_err(|e| ScError::Other(e.to_string()))?;
                let id: i32 = id.try_into().map_err(|_| ScError::Other("contract id out of range".to_string()))?;
                match Self::hash_by_id(engine, id).and_then(|hash| Self::load(engine, &hash)) {
                    Some(state) => Self::contract_state_to_item(&state),
                    None => Ok(StackItem::Null),
                }
            }
            "deploy" => {
                let nef_bytes = expect_bytes(&args[0])?;
                let manifest_json = String::from_utf8(expect_bytes(&args[1])?)
                    .map_err(|e| ScError::Other(e.to_string()))?;
                let mut reader = MemoryReader::new(&nef_bytes);
                let nef = NefFile::deserialize(&mut reader).map_err(ScError::Io)?;
                if !nef.is_checksum_valid() {
                    return Err(ScError::InvalidNef("checksum mismatch".to_string()));
                }
                let manifest = ContractManifest::from_json(&manifest_json)?;
                let sender = engine
                    .ctx
                    .container_script_hash()
                    .ok_or_else(|| ScError::Other("deploy requires a transaction sender".to_string()))?;
                let hash = ContractState::calculate_hash(&sender, nef.checksum, &manifest.name);
                if Self::load(engine, &hash).is_some() {
                    return Err(ScError::ContractAlreadyExists);
                }
                let id = Self::next_id(engine);
                let state = ContractState::new(id, hash, nef, manifest);
                Self::store(engine, &state);
                Self::contract_state_to_item(&state)
            }
            "update" => {
                let nef_bytes = expect_bytes(&args[0])?;
                let manifest_json = String::from_utf8(expect_bytes(&args[1])?)
                    .map_err(|e| ScError::Other(e.to_string()))?;
                let hash = engine
                    .current_context()
                    .map(|c| UInt160::new(neo_cryptography::hash160(c.script.bytes())))
                    .ok_or_else(|| ScError::Other("update requires a calling context".to_string()))?;
                let mut state = Self::load(engine, &hash)
                    .ok_or_else(|| ScError::ContractNotFound(hash.to_string()))?;
                let mut reader = MemoryReader::new(&nef_bytes);
                let nef = NefFile::deserialize(&mut reader).map_err(ScError::Io)?;
                if !nef.is_checksum_valid() {
                    return Err(ScError::InvalidNef("checksum mismatch".to_string()));
                }
                let manifest = ContractManifest::from_json(&manifest_json)?;
                state.apply_update(nef, manifest);
                Self::store(engine, &state);
                Ok(StackItem::Null)
            }
            "destroy" => {
                let hash = engine
                    .current_context()
                    .map(|c| UInt160::new(neo_cryptography::hash160(c.script.bytes())))
                    .ok_or_else(|| ScError::Other("destroy requires a calling context".to_string()))?;
                engine.ctx.snapshot.delete(&Self::key(PREFIX_CONTRACT, hash.as_bytes()).to_bytes());
                Ok(StackItem::Null)
            }
            other => Err(super::arity_error("ContractManagement", other)),
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

    fn sample_manifest() -> ContractManifest {
        ContractManifest {
            name: "Demo".to_string(),
            groups: vec![],
            supported_standards: vec![],
            abi: crate::manifest::ContractAbi { methods: vec![], events: vec![] },
            permissions: vec![],
            trusts: vec![],
            extra: serde_json::Value::Null,
        }
    }

    #[test]
    fn next_id_is_monotonically_increasing() {
        let mut eng = engine();
        assert_eq!(ContractManagement::next_id(&mut eng), 1);
        assert_eq!(ContractManagement::next_id(&mut eng), 2);
        assert_eq!(ContractManagement::next_id(&mut eng), 3);
    }

    #[test]
    fn store_then_load_round_trips_by_hash_and_id() {
        let mut eng = engine();
        let hash = UInt160::new([9u8; 20]);
        let nef = NefFile::new("test".to_string(), String::new(), vec![], vec![0x40]);
        let manifest = sample_manifest();
        let state = ContractState::new(1, hash, nef, manifest);
        ContractManagement::store(&mut eng, &state);
        assert!(ContractManagement::load(&eng, &hash).is_some());
        assert_eq!(ContractManagement::hash_by_id(&eng, 1), Some(hash));
    }
}
