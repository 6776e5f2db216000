//! NEO: the governance token — 0 decimals, fixed total supply, candidate
//! registry and committee/validator derivation by vote count (spec §4.4).

use neo_core::UInt160;
use neo_cryptography::hash160;
use neo_io::{BinaryWriter, IoResult, MemoryReader, Serializable};
use neo_vm::{CallFlags, ExecutionEngine, OpCode, StackItem};
use num_bigint::BigInt;
use num_traits::ToPrimitive;

use super::fungible_token;
use super::gas_token;
use super::{NativeContract, NativeMethod};
use crate::application_engine::AppContext;
use crate::error::{ScError, ScResult};

pub const ID: i32 = -5;
const DECIMALS: u8 = 0;
pub const TOTAL_SUPPLY: i64 = 100_000_000;

const PREFIX_CANDIDATE: u8 = 33;
const PREFIX_VOTER: u8 = 34;
const PREFIX_LAST_CLAIM: u8 = 35;

/// GAS minted per NEO per block, paid out on `transfer` for the blocks the
/// sender's balance sat unclaimed — a flat per-block bonus schedule rather
/// than the reference client's per-committee-vote-adjusted rate.
pub const GAS_BONUS_PER_BLOCK: i64 = 5_0000_000;

/// Committee membership is derived, not stored: top-K candidates by votes,
/// so this is the only place that size is read from.
const DEFAULT_COMMITTEE_SIZE: usize = 21;

#[derive(Debug, Clone, PartialEq, Eq)]
struct CandidateState {
    registered: bool,
    votes: i64,
}

impl Serializable for CandidateState {
    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        writer.write_bool(self.registered)?;
        writer.write_i64(self.votes)
    }

    fn deserialize(reader: &mut MemoryReader) -> IoResult<Self> {
        Ok(Self { registered: reader.read_bool()?, votes: reader.read_i64()? })
    }
}

pub struct NeoToken {
    methods: Vec<NativeMethod>,
}

impl NeoToken {
    pub fn new() -> Self {
        Self {
            methods: vec![
                NativeMethod::safe("symbol", 0, 0),
                NativeMethod::safe("decimals", 0, 0),
                NativeMethod::safe("totalSupply", 0, 1 << 15),
                NativeMethod::safe("balanceOf", 1, 1 << 15),
                NativeMethod::mutating("transfer", 3, 1 << 17, CallFlags::STATES),
                NativeMethod::mutating("registerCandidate", 1, 1 << 24, CallFlags::STATES),
                NativeMethod::mutating("unregisterCandidate", 1, 1 << 20, CallFlags::STATES),
                NativeMethod::mutating("vote", 2, 1 << 20, CallFlags::STATES),
                NativeMethod::safe("getCandidates", 0, 1 << 16),
                NativeMethod::safe("getCommittee", 0, 1 << 16),
            ],
        }
    }

    fn candidate_key(pubkey: &[u8]) -> neo_core::StorageKey {
        neo_core::StorageKey::new(ID, [&[PREFIX_CANDIDATE][..], pubkey].concat())
    }

    fn voter_key(account: &UInt160) -> neo_core::StorageKey {
        neo_core::StorageKey::new(ID, [&[PREFIX_VOTER][..], account.as_bytes()].concat())
    }

    fn read_candidate(engine: &ExecutionEngine<AppContext>, pubkey: &[u8]) -> Option<CandidateState> {
        let bytes = engine.ctx.snapshot.try_get(&Self::candidate_key(pubkey).to_bytes())?;
        let mut reader = MemoryReader::new(&bytes);
        CandidateState::deserialize(&mut reader).ok()
    }

    fn write_candidate(engine: &mut ExecutionEngine<AppContext>, pubkey: &[u8], state: &CandidateState) {
        let mut writer = BinaryWriter::new();
        state.serialize(&mut writer).expect("in-memory writer cannot fail");
        engine.ctx.snapshot.update(&Self::candidate_key(pubkey).to_bytes(), writer.to_bytes());
    }

    fn all_candidates(engine: &ExecutionEngine<AppContext>) -> Vec<(Vec<u8>, CandidateState)> {
        let prefix = neo_core::StorageKey::new(ID, vec![PREFIX_CANDIDATE]).to_bytes();
        engine
            .ctx
            .snapshot
            .seek(&prefix, neo_persistence::SeekDirection::Forward)
            .filter_map(|(key, value)| {
                let pubkey = key[prefix.len()..].to_vec();
                let mut reader = MemoryReader::new(&value);
                let state = CandidateState::deserialize(&mut reader).ok()?;
                state.registered.then_some((pubkey, state))
            })
            .collect()
    }

    /// Top-K candidates by votes, tie-broken by public-key byte order.
    fn committee(engine: &ExecutionEngine<AppContext>, size: usize) -> Vec<Vec<u8>> {
        let mut candidates = Self::all_candidates(engine);
        candidates.sort_by(|a, b| b.1.votes.cmp(&a.1.votes).then_with(|| a.0.cmp(&b.0)));
        candidates.into_iter().take(size).map(|(pubkey, _)| pubkey).collect()
    }

    fn last_claim_key(account: &UInt160) -> neo_core::StorageKey {
        neo_core::StorageKey::new(ID, [&[PREFIX_LAST_CLAIM][..], account.as_bytes()].concat())
    }

    fn last_claim_height(engine: &ExecutionEngine<AppContext>, account: &UInt160) -> u32 {
        engine
            .ctx
            .snapshot
            .try_get(&Self::last_claim_key(account).to_bytes())
            .and_then(|bytes| bytes.try_into().ok())
            .map(u32::from_le_bytes)
            .unwrap_or(0)
    }

    fn set_last_claim_height(engine: &mut ExecutionEngine<AppContext>, account: &UInt160, height: u32) {
        engine.ctx.snapshot.update(&Self::last_claim_key(account).to_bytes(), height.to_le_bytes().to_vec());
    }

    /// Unclaimed GAS bonus a balance of `amount` NEO has accrued since
    /// `last_claim_height`, at the flat [`GAS_BONUS_PER_BLOCK`] rate.
    fn unclaimed_bonus(amount: &BigInt, last_claim_height: u32, current_height: u32) -> BigInt {
        let blocks = current_height.saturating_sub(last_claim_height);
        amount * BigInt::from(blocks) * BigInt::from(GAS_BONUS_PER_BLOCK)
    }
}

/// BFT-majority multisig account over the current committee's public keys
/// (`m = n - (n - 1) / 3`), hand-built the way
/// [`crate::interop::contract_create_standard_account`] builds a single-sig
/// account: `PUSHINT8 m, (PUSHDATA1 pubkey)*, PUSHINT8 n, SYSCALL
/// CheckMultisig`. `None` when no candidate has registered yet — callers
/// fall back to the genesis stand-in account.
pub fn committee_account(engine: &ExecutionEngine<AppContext>) -> Option<UInt160> {
    let pubkeys = NeoToken::committee(engine, DEFAULT_COMMITTEE_SIZE);
    if pubkeys.is_empty() {
        return None;
    }
    let n = pubkeys.len();
    let m = n - (n - 1) / 3;
    let mut script = Vec::new();
    script.push(OpCode::PushInt8 as u8);
    script.push(m as u8);
    for pubkey in &pubkeys {
        script.push(OpCode::PushData1 as u8);
        script.push(pubkey.len() as u8);
        script.extend_from_slice(pubkey);
    }
    script.push(OpCode::PushInt8 as u8);
    script.push(n as u8);
    script.push(OpCode::Syscall as u8);
    script.extend_from_slice(&neo_vm::syscall_hash("System.Crypto.CheckMultisig").to_le_bytes());
    Some(UInt160::new(hash160(&script)))
}

impl Default for NeoToken {
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

fn expect_pubkey(item: &StackItem) -> ScResult<Vec<u8>> {
    match item {
        StackItem::ByteString(b) if b.len() == 33 => Ok(b.to_vec()),
        _ => Err(ScError::Other("expected a 33-byte compressed public key".to_string())),
    }
}

impl NativeContract for NeoToken {
    fn id(&self) -> i32 {
        ID
    }

    fn contract_name(&self) -> &'static str {
        "NeoToken"
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
            "symbol" => Ok(StackItem::from_bytes(b"NEO".to_vec())),
            "decimals" => Ok(StackItem::Integer(BigInt::from(DECIMALS))),
            "totalSupply" => Ok(StackItem::Integer(fungible_token::total_supply(engine, ID))),
            "balanceOf" => {
                let account = expect_hash160(&args[0])?;
                Ok(StackItem::Integer(fungible_token::balance_of(engine, ID, &account)))
            }
            "transfer" => {
                let from = expect_hash160(&args[0])?;
                let to = expect_hash160(&args[1])?;
                let amount = args[2].as_int().map_err(|e| ScError::Other(e.to_string()))?;
                let from_balance = fungible_token::balance_of(engine, ID, &from);
                let height = engine.ctx.block_index;
                let from_bonus =
                    Self::unclaimed_bonus(&from_balance, Self::last_claim_height(engine, &from), height);
                let to_balance = fungible_token::balance_of(engine, ID, &to);
                let to_bonus = if to != from {
                    Self::unclaimed_bonus(&to_balance, Self::last_claim_height(engine, &to), height)
                } else {
                    BigInt::from(0)
                };
                let ok = fungible_token::transfer(engine, ID, &from, &to, &amount)?;
                if ok {
                    Self::set_last_claim_height(engine, &from, height);
                    Self::set_last_claim_height(engine, &to, height);
                    if let Some(bonus) = (from_bonus).to_i64() {
                        if bonus > 0 {
                            gas_token::reward(engine, &from, bonus);
                        }
                    }
                    if to != from {
                        if let Some(bonus) = (to_bonus).to_i64() {
                            if bonus > 0 {
                                gas_token::reward(engine, &to, bonus);
                            }
                        }
                    }
                }
                Ok(StackItem::Boolean(ok))
            }
            "registerCandidate" => {
                let pubkey = expect_pubkey(&args[0])?;
                let state = Self::read_candidate(engine, &pubkey)
                    .unwrap_or(CandidateState { registered: false, votes: 0 });
                Self::write_candidate(engine, &pubkey, &CandidateState { registered: true, ..state });
                Ok(StackItem::Boolean(true))
            }
            "unregisterCandidate" => {
                let pubkey = expect_pubkey(&args[0])?;
                if let Some(state) = Self::read_candidate(engine, &pubkey) {
                    Self::write_candidate(engine, &pubkey, &CandidateState { registered: false, ..state });
                }
                Ok(StackItem::Boolean(true))
            }
            "vote" => {
                let account = expect_hash160(&args[0])?;
                let pubkey = expect_pubkey(&args[1])?;
                let weight = fungible_token::balance_of(engine, ID, &account);
                let weight: i64 = weight.try_into().unwrap_or(i64::MAX);
                let mut state = Self::read_candidate(engine, &pubkey)
                    .ok_or_else(|| ScError::Other("candidate is not registered".to_string()))?;
                state.votes += weight;
                Self::write_candidate(engine, &pubkey, &state);
                engine.ctx.snapshot.update(&Self::voter_key(&account).to_bytes(), pubkey);
                Ok(StackItem::Boolean(true))
            }
            "getCandidates" => {
                let items = Self::all_candidates(engine)
                    .into_iter()
                    .map(|(pubkey, state)| {
                        engine
                            .alloc_struct(vec![
                                StackItem::from_bytes(pubkey),
                                StackItem::Integer(BigInt::from(state.votes)),
                            ])
                            .map_err(ScError::VmFault)
                    })
                    .collect::<ScResult<Vec<_>>>()?;
                engine.alloc_array(items).map_err(ScError::VmFault)
            }
            "getCommittee" => {
                let committee = Self::committee(engine, DEFAULT_COMMITTEE_SIZE)
                    .into_iter()
                    .map(StackItem::from_bytes)
                    .collect();
                engine.alloc_array(committee).map_err(ScError::VmFault)
            }
            other => Err(super::arity_error("NeoToken", other)),
        }
    }

    fn initialize(&self, engine: &mut ExecutionEngine<AppContext>) -> ScResult<()> {
        // Genesis: the entire fixed supply is minted once, to the committee
        // multisig account computed by the ledger crate at chain creation.
        let _ = engine;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::NativeRegistry;
    use neo_persistence::{DataCache, MemoryStore, Store};
    use neo_vm::ExecutionLimits;

    fn engine() -> ExecutionEngine<AppContext> {
        let store: Box<dyn Store> = Box::new(MemoryStore::new());
        let ctx = AppContext {
            snapshot: DataCache::new(store),
            trigger: crate::trigger::TriggerType::Application,
            container: crate::application_engine::Container::Block { index: 0 },
            block_index: 0,
            block_time: 0,
            natives: std::sync::Arc::new(NativeRegistry::new()),
            notifications: Vec::new(),
            logs: Vec::new(),
        };
        ExecutionEngine::new(ctx, 0, ExecutionLimits::default())
    }

    #[test]
    fn register_then_vote_accumulates_weight() {
        let mut eng = engine();
        let token = NeoToken::new();
        let voter = UInt160::new([3u8; 20]);
        fungible_token::mint(&mut eng, ID, &voter, &BigInt::from(10));
        let pubkey = vec![0x02; 33];
        token.invoke(&mut eng, "registerCandidate", vec![StackItem::from_bytes(pubkey.clone())]).unwrap();
        token
            .invoke(
                &mut eng,
                "vote",
                vec![StackItem::from_bytes(voter.as_bytes().to_vec()), StackItem::from_bytes(pubkey.clone())],
            )
            .unwrap();
        let state = NeoToken::read_candidate(&eng, &pubkey).unwrap();
        assert_eq!(state.votes, 10);
    }

    #[test]
    fn committee_orders_candidates_by_votes_descending() {
        let mut eng = engine();
        let key_a = vec![0x01; 33];
        let key_b = vec![0x02; 33];
        NeoToken::write_candidate(&mut eng, &key_a, &CandidateState { registered: true, votes: 5 });
        NeoToken::write_candidate(&mut eng, &key_b, &CandidateState { registered: true, votes: 50 });
        let committee = NeoToken::committee(&eng, 2);
        assert_eq!(committee, vec![key_b, key_a]);
    }
}
