//! Oracle: tracks off-chain data requests and their responses (spec §4.4).
//!
//! The off-chain fetch/consensus-signing pipeline that resolves a request
//! lives outside the VM; `finish` only records the result a caller already
//! obtained and reached agreement on, matching this repo's decision not to
//! implement oracle response signature verification (no byte-exact wire
//! format for it is available yet — see spec's oracle notes).

use neo_core::UInt160;
use neo_io::{BinaryWriter, IoResult, MemoryReader, Serializable};
use neo_vm::{CallFlags, ExecutionEngine, StackItem};
use num_bigint::BigInt;

use super::{NativeContract, NativeMethod};
use crate::application_engine::AppContext;
use crate::error::{ScError, ScResult};

pub const ID: i32 = -9;

const PREFIX_PRICE: u8 = 5;
const PREFIX_REQUEST: u8 = 7;
const PREFIX_NEXT_ID: u8 = 9;

pub const DEFAULT_PRICE: i64 = 50_000_000;

const MAX_URL_LENGTH: usize = 256;
const MAX_FILTER_LENGTH: usize = 128;
const MAX_CALLBACK_LENGTH: usize = 32;
const MAX_USER_DATA_LENGTH: usize = 512;

#[derive(Debug, Clone, PartialEq, Eq)]
struct OracleRequest {
    requesting_contract: UInt160,
    url: String,
    filter: String,
    callback: String,
    user_data: Vec<u8>,
    gas_for_response: i64,
}

impl Serializable for OracleRequest {
    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        writer.write_serializable(&self.requesting_contract)?;
        writer.write_var_string(&self.url)?;
        writer.write_var_string(&self.filter)?;
        writer.write_var_string(&self.callback)?;
        writer.write_var_bytes(&self.user_data)?;
        writer.write_i64(self.gas_for_response)
    }

    fn deserialize(reader: &mut MemoryReader) -> IoResult<Self> {
        Ok(Self {
            requesting_contract: reader.read_serializable()?,
            url: reader.read_var_string(MAX_URL_LENGTH as u64)?,
            filter: reader.read_var_string(MAX_FILTER_LENGTH as u64)?,
            callback: reader.read_var_string(MAX_CALLBACK_LENGTH as u64)?,
            user_data: reader.read_var_bytes(MAX_USER_DATA_LENGTH as u64)?,
            gas_for_response: reader.read_i64()?,
        })
    }
}

pub struct Oracle {
    methods: Vec<NativeMethod>,
}

impl Oracle {
    pub fn new() -> Self {
        Self {
            methods: vec![
                NativeMethod::mutating("request", 5, 1 << 15, CallFlags::STATES | CallFlags::ALLOW_NOTIFY),
                NativeMethod::safe("getPrice", 0, 1 << 15),
                NativeMethod::mutating("setPrice", 1, 1 << 15, CallFlags::STATES),
                NativeMethod::mutating("finish", 2, 1 << 15, CallFlags::STATES | CallFlags::ALLOW_NOTIFY),
            ],
        }
    }

    fn key(prefix: u8, suffix: &[u8]) -> neo_core::StorageKey {
        let mut key = vec![prefix];
        key.extend_from_slice(suffix);
        neo_core::StorageKey::new(ID, key)
    }

    pub fn price(engine: &ExecutionEngine<AppContext>) -> i64 {
        engine
            .ctx
            .snapshot
            .try_get(&Self::key(PREFIX_PRICE, &[]).to_bytes())
            .and_then(|bytes| bytes.try_into().ok())
            .map(i64::from_le_bytes)
            .unwrap_or(DEFAULT_PRICE)
    }

    fn next_id(engine: &mut ExecutionEngine<AppContext>) -> u64 {
        let key = Self::key(PREFIX_NEXT_ID, &[]).to_bytes();
        let id = match engine.ctx.snapshot.try_get(&key) {
            Some(bytes) if bytes.len() == 8 => u64::from_le_bytes(bytes.try_into().unwrap()) + 1,
            _ => 0,
        };
        engine.ctx.snapshot.update(&key, id.to_le_bytes().to_vec());
        id
    }

    fn load_request(engine: &ExecutionEngine<AppContext>, id: u64) -> Option<OracleRequest> {
        let bytes = engine.ctx.snapshot.try_get(&Self::key(PREFIX_REQUEST, &id.to_be_bytes()).to_bytes())?;
        let mut reader = MemoryReader::new(&bytes);
        OracleRequest::deserialize(&mut reader).ok()
    }
}

impl Default for Oracle {
    fn default() -> Self {
        Self::new()
    }
}

fn expect_string(item: &StackItem, max_len: usize, what: &str) -> ScResult<String> {
    match item {
        StackItem::ByteString(b) => {
            if b.len() > max_len {
                return Err(ScError::Other(format!("{what} exceeds maximum length")));
            }
            String::from_utf8(b.to_vec()).map_err(|e| ScError::Other(e.to_string()))
        }
        StackItem::Null if what == "filter" => Ok(String::new()),
        _ => Err(ScError::Other(format!("expected a byte string for {what}"))),
    }
}

fn expect_bytes(item: &StackItem, max_len: usize) -> ScResult<Vec<u8>> {
    match item {
        StackItem::ByteString(b) if b.len() <= max_len => Ok(b.to_vec()),
        StackItem::ByteString(_) => Err(ScError::Other("user data exceeds maximum length".to_string())),
        StackItem::Null => Ok(Vec::new()),
        _ => Err(ScError::Other("expected a byte string argument".to_string())),
    }
}

impl NativeContract for Oracle {
    fn id(&self) -> i32 {
        ID
    }

    fn contract_name(&self) -> &'static str {
        "OracleContract"
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
            "request" => {
                let url = expect_string(&args[0], MAX_URL_LENGTH, "url")?;
                let filter = expect_string(&args[1], MAX_FILTER_LENGTH, "filter")?;
                let callback = expect_string(&args[2], MAX_CALLBACK_LENGTH, "callback")?;
                let user_data = expect_bytes(&args[3], MAX_USER_DATA_LENGTH)?;
                let gas_for_response =
                    args[4].as_int().map_err(|e| ScError::Other(e.to_string()))?.try_into().map_err(|_| {
                        ScError::Other("gas for response out of range".to_string())
                    })?;
                if gas_for_response < Self::price(engine) {
                    return Err(ScError::Other("gas for response is below the oracle price".to_string()));
                }
                let requesting_contract = engine
                    .current_context()
                    .map(|c| UInt160::new(neo_cryptography::hash160(c.script.bytes())))
                    .ok_or_else(|| ScError::Other("request requires a calling context".to_string()))?;
                let id = Self::next_id(engine);
                let request =
                    OracleRequest { requesting_contract, url, filter, callback, user_data, gas_for_response };
                let mut writer = BinaryWriter::new();
                request.serialize(&mut writer).expect("in-memory writer cannot fail");
                engine.ctx.snapshot.update(&Self::key(PREFIX_REQUEST, &id.to_be_bytes()).to_bytes(), writer.to_bytes());
                Ok(StackItem::Integer(BigInt::from(id)))
            }
            "getPrice" => Ok(StackItem::Integer(BigInt::from(Self::price(engine)))),
            "setPrice" => {
                let price: i64 = args[0].as_int().map_err(|e| ScError::Other(e.to_string()))?.try_into().map_err(
                    |_| ScError::Other("price out of range".to_string()),
                )?;
                engine.ctx.snapshot.update(&Self::key(PREFIX_PRICE, &[]).to_bytes(), price.to_le_bytes().to_vec());
                Ok(StackItem::Null)
            }
            "finish" => {
                let id: u64 = args[0].as_int().map_err(|e| ScError::Other(e.to_string()))?.try_into().map_err(
                    |_| ScError::Other("request id out of range".to_string()),
                )?;
                let _result = expect_bytes(&args[1], u16::MAX as usize)?;
                if Self::load_request(engine, id).is_none() {
                    return Err(ScError::Other(format!("no pending oracle request {id}")));
                }
                engine.ctx.snapshot.delete(&Self::key(PREFIX_REQUEST, &id.to_be_bytes()).to_bytes());
                Ok(StackItem::Null)
            }
            other => Err(super::arity_error("OracleContract", other)),
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

    #[test]
    fn request_then_finish_clears_the_pending_entry() {
        let mut eng = engine();
        let oracle = Oracle::new();
        let id = oracle
            .invoke(
                &mut eng,
                "request",
                vec![
                    StackItem::from_bytes(b"https://example.com".to_vec()),
                    StackItem::Null,
                    StackItem::from_bytes(b"callback".to_vec()),
                    StackItem::Null,
                    StackItem::Integer(BigInt::from(DEFAULT_PRICE)),
                ],
            )
            .unwrap();
        assert_eq!(id.as_int().unwrap(), BigInt::from(0));
        assert!(Oracle::load_request(&eng, 0).is_some());
        oracle
            .invoke(&mut eng, "finish", vec![StackItem::Integer(BigInt::from(0)), StackItem::from_bytes(b"ok".to_vec())])
            .unwrap();
        assert!(Oracle::load_request(&eng, 0).is_none());
    }

    #[test]
    fn request_below_price_is_rejected() {
        let mut eng = engine();
        let oracle = Oracle::new();
        let result = oracle.invoke(
            &mut eng,
            "request",
            vec![
                StackItem::from_bytes(b"https://example.com".to_vec()),
                StackItem::Null,
                StackItem::from_bytes(b"callback".to_vec()),
                StackItem::Null,
                StackItem::Integer(BigInt::from(1)),
            ],
        );
        assert!(result.is_err());
    }
}
