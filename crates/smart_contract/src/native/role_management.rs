//! RoleManagement: designated node public keys per role, indexed by the
//! block height the designation took effect at (spec §4.4).

use neo_vm::{CallFlags, ExecutionEngine, StackItem};

use super::{NativeContract, NativeMethod};
use crate::application_engine::AppContext;
use crate::error::{ScError, ScResult};

pub const ID: i32 = -4;

const PREFIX_ROLE: u8 = 33;

/// Designated roles, matching the reference client's byte values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Role {
    StateValidator = 4,
    Oracle = 8,
    NeoFSAlphabetNode = 16,
    P2PNotary = 32,
}

impl Role {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            4 => Some(Role::StateValidator),
            8 => Some(Role::Oracle),
            16 => Some(Role::NeoFSAlphabetNode),
            32 => Some(Role::P2PNotary),
            _ => None,
        }
    }
}

pub struct RoleManagement {
    methods: Vec<NativeMethod>,
}

impl RoleManagement {
    pub fn new() -> Self {
        Self {
            methods: vec![
                NativeMethod::safe("getDesignatedByRole", 2, 1 << 15),
                NativeMethod::mutating("designateAsRole", 2, 1 << 15, CallFlags::STATES),
            ],
        }
    }

    fn key(role: Role, index: u32) -> neo_core::StorageKey {
        let mut key = vec![PREFIX_ROLE, role as u8];
        key.extend_from_slice(&index.to_be_bytes());
        neo_core::StorageKey::new(ID, key)
    }

    /// Public keys designated for `role` as of `index`: the designation with
    /// the largest recorded index not exceeding `index`.
    pub fn designated_by_role(engine: &ExecutionEngine<AppContext>, role: Role, index: u32) -> Vec<Vec<u8>> {
        let prefix = neo_core::StorageKey::new(ID, vec![PREFIX_ROLE, role as u8]).to_bytes();
        let mut best: Option<(u32, Vec<u8>)> = None;
        for (key, value) in engine.ctx.snapshot.seek(&prefix, neo_persistence::SeekDirection::Forward) {
            if key.len() < prefix.len() + 4 {
                continue;
            }
            let mut idx_bytes = [0u8; 4];
            idx_bytes.copy_from_slice(&key[prefix.len()..prefix.len() + 4]);
            let idx = u32::from_be_bytes(idx_bytes);
            if idx > index {
                continue;
            }
            let replace = match &best {
                Some((best_idx, _)) => idx > *best_idx,
                None => true,
            };
            if replace {
                best = Some((idx, value));
            }
        }
        best.map(|(_, bytes)| bytes.chunks(33).map(|c| c.to_vec()).collect()).unwrap_or_default()
    }

    pub fn designate(engine: &mut ExecutionEngine<AppContext>, role: Role, index: u32, pubkeys: &[Vec<u8>]) {
        let flat: Vec<u8> = pubkeys.iter().flatten().copied().collect();
        engine.ctx.snapshot.update(&Self::key(role, index).to_bytes(), flat);
    }
}

impl Default for RoleManagement {
    fn default() -> Self {
        Self::new()
    }
}

fn expect_role(item: &StackItem) -> ScResult<Role> {
    let n = item.as_int().map_err(|e| ScError::Other(e.to_string()))?;
    let byte: u8 = n.try_into().map_err(|_| ScError::Other("role out of range".to_string()))?;
    Role::from_u8(byte).ok_or_else(|| ScError::Other(format!("unknown role byte {byte}")))
}

fn expect_u32(item: &StackItem) -> ScResult<u32> {
    item.as_int().map_err(|e| ScError::Other(e.to_string()))?.try_into().map_err(|_| ScError::Other("value out of range for a u32".to_string()))
}

fn expect_pubkey_array(item: &StackItem, engine: &ExecutionEngine<AppContext>) -> ScResult<Vec<Vec<u8>>> {
    let handle = match item {
        StackItem::Array(h) => *h,
        _ => return Err(ScError::Other("expected an array of public keys".to_string())),
    };
    let neo_vm::CompoundData::Array(items) = engine.reference_counter.data(handle) else {
        return Err(ScError::Other("expected an array of public keys".to_string()));
    };
    items
        .iter()
        .map(|i| match i {
            StackItem::ByteString(b) => Ok(b.to_vec()),
            _ => Err(ScError::Other("expected a public key byte string".to_string())),
        })
        .collect()
}

impl NativeContract for RoleManagement {
    fn id(&self) -> i32 {
        ID
    }

    fn contract_name(&self) -> &'static str {
        "RoleManagement"
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
            "getDesignatedByRole" => {
                let role = expect_role(&args[0])?;
                let index = expect_u32(&args[1])?;
                let items = Self::designated_by_role(engine, role, index)
                    .into_iter()
                    .map(StackItem::from_bytes)
                    .collect();
                engine.alloc_array(items).map_err(ScError::VmFault)
            }
            "designateAsRole" => {
                super::require_committee_witness(engine)?;
                let role = expect_role(&args[0])?;
                let pubkeys = expect_pubkey_array(&args[1], engine)?;
                Self::designate(engine, role, engine.ctx.block_index, &pubkeys);
                Ok(StackItem::Null)
            }
            other => Err(super::arity_error("RoleManagement", other)),
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
            container: crate::application_engine::Container::Block { index: 100 },
            block_index: 100,
            block_time: 0,
            natives: Arc::new(NativeRegistry::new()),
            notifications: Vec::new(),
            logs: Vec::new(),
        };
        ExecutionEngine::new(ctx, 0, ExecutionLimits::default())
    }

    #[test]
    fn designate_then_lookup_at_or_after_the_designation_height() {
        let mut eng = engine();
        let pubkey = vec![0x02; 33];
        RoleManagement::designate(&mut eng, Role::Oracle, 50, &[pubkey.clone()]);
        let found = RoleManagement::designated_by_role(&eng, Role::Oracle, 100);
        assert_eq!(found, vec![pubkey]);
    }

    #[test]
    fn lookup_before_any_designation_returns_empty() {
        let eng = engine();
        assert!(RoleManagement::designated_by_role(&eng, Role::Oracle, 10).is_empty());
    }
}
