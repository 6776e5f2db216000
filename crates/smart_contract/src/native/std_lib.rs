//! StdLib: base64/hex/number/JSON helpers exposed to contract scripts
//! (spec §4.4). Pure functions — nothing reads or writes storage.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use neo_vm::{ExecutionEngine, StackItem};
use num_bigint::BigInt;
use num_traits::ToPrimitive;

use super::{NativeContract, NativeMethod};
use crate::application_engine::AppContext;
use crate::error::{ScError, ScResult};

pub const ID: i32 = -7;

pub struct StdLibContract {
    methods: Vec<NativeMethod>,
}

impl StdLibContract {
    pub fn new() -> Self {
        Self {
            methods: vec![
                NativeMethod::safe("itoa", 1, 1 << 12),
                NativeMethod::safe("atoi", 1, 1 << 12),
                NativeMethod::safe("base64Encode", 1, 1 << 12),
                NativeMethod::safe("base64Decode", 1, 1 << 12),
                NativeMethod::safe("jsonSerialize", 1, 1 << 12),
                NativeMethod::safe("memoryCompare", 2, 1 << 10),
            ],
        }
    }
}

impl Default for StdLibContract {
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

impl NativeContract for StdLibContract {
    fn id(&self) -> i32 {
        ID
    }

    fn contract_name(&self) -> &'static str {
        "StdLib"
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
            "itoa" => {
                let n = args[0].as_int().map_err(|e| ScError::Other(e.to_string()))?;
                Ok(StackItem::from_bytes(n.to_string().into_bytes()))
            }
            "atoi" => {
                let text = String::from_utf8(expect_bytes(&args[0])?).map_err(|e| ScError::Other(e.to_string()))?;
                let n: BigInt = text.parse().map_err(|_| ScError::Other(format!("not an integer: {text}")))?;
                Ok(StackItem::Integer(n))
            }
            "base64Encode" => Ok(StackItem::from_bytes(STANDARD.encode(expect_bytes(&args[0])?).into_bytes())),
            "base64Decode" => {
                let text = String::from_utf8(expect_bytes(&args[0])?).map_err(|e| ScError::Other(e.to_string()))?;
                let decoded = STANDARD.decode(text).map_err(|e| ScError::Other(e.to_string()))?;
                Ok(StackItem::from_bytes(decoded))
            }
            "jsonSerialize" => {
                let value = stack_item_to_json(&args[0])?;
                Ok(StackItem::from_bytes(value.to_string().into_bytes()))
            }
            "memoryCompare" => {
                let a = expect_bytes(&args[0])?;
                let b = expect_bytes(&args[1])?;
                Ok(StackItem::Integer(BigInt::from(a.cmp(&b) as i8)))
            }
            other => Err(super::arity_error("StdLib", other)),
        }
    }
}

fn stack_item_to_json(item: &StackItem) -> ScResult<serde_json::Value> {
    match item {
        StackItem::Null => Ok(serde_json::Value::Null),
        StackItem::Boolean(b) => Ok(serde_json::Value::Bool(*b)),
        StackItem::Integer(n) => {
            let as_i64 = n.to_i64().ok_or_else(|| ScError::Other("integer too large to serialize as JSON".to_string()))?;
            Ok(serde_json::Value::Number(serde_json::Number::from(as_i64)))
        }
        StackItem::ByteString(b) => Ok(serde_json::Value::String(
            base64::engine::general_purpose::STANDARD.encode(b.as_ref()),
        )),
        _ => Err(ScError::Other("only primitive stack items can be JSON-serialized".to_string())),
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

    #[test]
    fn base64_round_trips() {
        let mut eng = engine();
        let lib = StdLibContract::new();
        let encoded = lib.invoke(&mut eng, "base64Encode", vec![StackItem::from_bytes(b"neo".to_vec())]).unwrap();
        let decoded = lib.invoke(&mut eng, "base64Decode", vec![encoded]).unwrap();
        assert_eq!(decoded.as_bytes(&eng.reference_counter).unwrap(), b"neo".to_vec());
    }

    #[test]
    fn atoi_then_itoa_round_trips() {
        let mut eng = engine();
        let lib = StdLibContract::new();
        let n = lib.invoke(&mut eng, "atoi", vec![StackItem::from_bytes(b"42".to_vec())]).unwrap();
        assert_eq!(n.as_int().unwrap(), BigInt::from(42));
        let s = lib.invoke(&mut eng, "itoa", vec![n]).unwrap();
        assert_eq!(s.as_bytes(&eng.reference_counter).unwrap(), b"42".to_vec());
    }
}
