//! CryptoLib: hashing and signature-verification primitives exposed to
//! contract scripts (spec §4.4).

use neo_cryptography::{hash160, hash256, ripemd160, sha256, verify, Curve};
use neo_vm::{ExecutionEngine, StackItem};

use super::{NativeContract, NativeMethod};
use crate::application_engine::AppContext;
use crate::error::{ScError, ScResult};

pub const ID: i32 = -2;

pub struct CryptoLib {
    methods: Vec<NativeMethod>,
}

impl CryptoLib {
    pub fn new() -> Self {
        Self {
            methods: vec![
                NativeMethod::safe("sha256", 1, 1 << 15),
                NativeMethod::safe("ripemd160", 1, 1 << 15),
                NativeMethod::safe("hash160", 1, 1 << 15),
                NativeMethod::safe("hash256", 1, 1 << 15),
                NativeMethod::safe("verifyWithECDsaSecp256r1", 3, 1 << 15),
                NativeMethod::safe("verifyWithECDsaSecp256k1", 3, 1 << 15),
            ],
        }
    }
}

impl Default for CryptoLib {
    fn default() -> Self {
        Self::new()
    }
}

fn expect_bytes(item: &StackItem) -> ScResult<Vec<u8>> {
    match item {
        StackItem::ByteString(b) => Ok(b.to_vec()),
        _ => Err(ScError::Other("expected a byte string argument".to_string())),
    }
}

fn expect_digest(bytes: &[u8]) -> ScResult<[u8; 32]> {
    bytes.try_into().map_err(|_| ScError::Other("message must be exactly 32 bytes".to_string()))
}

impl NativeContract for CryptoLib {
    fn id(&self) -> i32 {
        ID
    }

    fn contract_name(&self) -> &'static str {
        "CryptoLib"
    }

    fn methods(&self) -> &[NativeMethod] {
        &self.methods
    }

    fn invoke(
        &self,
        _engine: &mut ExecutionEngine<AppContext>,
        method: &str,
        args: Vec<StackItem>,
    ) -> ScResult<StackItem> {
        match method {
            "sha256" => Ok(StackItem::from_bytes(sha256(&expect_bytes(&args[0])?).to_vec())),
            "ripemd160" => Ok(StackItem::from_bytes(ripemd160(&expect_bytes(&args[0])?).to_vec())),
            "hash160" => Ok(StackItem::from_bytes(hash160(&expect_bytes(&args[0])?).to_vec())),
            "hash256" => Ok(StackItem::from_bytes(hash256(&expect_bytes(&args[0])?).to_vec())),
            "verifyWithECDsaSecp256r1" => verify_signature(&args, Curve::Secp256r1),
            "verifyWithECDsaSecp256k1" => verify_signature(&args, Curve::Secp256k1),
            other => Err(super::arity_error("CryptoLib", other)),
        }
    }
}

fn verify_signature(args: &[StackItem], curve: Curve) -> ScResult<StackItem> {
    let message = expect_bytes(&args[0])?;
    let pubkey = expect_bytes(&args[1])?;
    let signature = expect_bytes(&args[2])?;
    let digest = expect_digest(&sha256(&message))?;
    Ok(StackItem::Boolean(verify(curve, &pubkey, &digest, &signature)))
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

    #[test]
    fn sha256_matches_known_vector() {
        let mut eng = engine();
        let lib = CryptoLib::new();
        let result = lib.invoke(&mut eng, "sha256", vec![StackItem::from_bytes(b"".to_vec())]).unwrap();
        let expected: Vec<u8> = vec![
            0xe3, 0xb0, 0xc4, 0x42, 0x98, 0xfc, 0x1c, 0x14, 0x9a, 0xfb, 0xf4, 0xc8, 0x99, 0x6f,
            0xb9, 0x24, 0x27, 0xae, 0x41, 0xe4, 0x64, 0x9b, 0x93, 0x4c, 0xa4, 0x95, 0x99, 0x1b,
            0x78, 0x52, 0xb8, 0x55,
        ];
        assert_eq!(result.as_bytes(&eng.reference_counter).unwrap(), expected);
    }
}
