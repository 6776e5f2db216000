//! Protocol settings: the network-wide constants every other crate reads to
//! interpret blocks, transactions, and wire messages consistently.
//!
//! This crate holds values only. Loading them from a TOML/JSON config file
//! is the CLI's job (out of scope per the core's spec); the core always
//! receives an already-constructed [`ProtocolSettings`].

use neo_core::UInt160;
use serde::{Deserialize, Serialize};

/// Mainnet P2P magic (`"NEO3"` read little-endian as a u32).
pub const MAINNET_MAGIC: u32 = 0x334F_454E;
/// Testnet P2P magic.
pub const TESTNET_MAGIC: u32 = 0x4E45_4F54;

/// Mainnet Base58Check address version byte (produces `N...` addresses).
pub const MAINNET_ADDRESS_VERSION: u8 = 0x35;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolSettings {
    /// P2P network magic distinguishing MainNet/TestNet/private nets.
    pub network: u32,
    /// Base58Check address version byte.
    pub address_version: u8,
    /// Target milliseconds between blocks.
    pub milliseconds_per_block: u32,
    /// Number of validators in the consensus committee.
    pub validators_count: u32,
    /// Size of the full committee (validators + council members).
    pub committee_members_count: u32,
    /// Maximum number of blocks a node will serve or accept proofs for
    /// beyond the current height (`Ledger` native contract bound).
    pub max_traceable_blocks: u32,
    /// Maximum transactions considered when filling a block.
    pub max_transactions_per_block: u32,
    /// Maximum total gas any single block's transactions may spend.
    pub max_block_system_fee: i64,
    /// Verified-tier mempool capacity.
    pub memory_pool_max_verified: usize,
    /// Unverified-tier mempool capacity.
    pub memory_pool_max_unverified: usize,
    /// Seed node addresses (`host:port`), consulted by the sync engine for
    /// its initial peer set.
    pub seed_list: Vec<String>,
    /// Block index at which each native contract activates; absent entries
    /// activate at genesis.
    pub native_activations: Vec<NativeActivation>,
    /// Accounts allowed to sign the genesis/initial `nextConsensus`.
    pub standby_committee: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeActivation {
    pub contract_name: String,
    pub active_from: u32,
}

impl ProtocolSettings {
    pub fn mainnet() -> Self {
        Self {
            network: MAINNET_MAGIC,
            address_version: MAINNET_ADDRESS_VERSION,
            milliseconds_per_block: 15_000,
            validators_count: 7,
            committee_members_count: 21,
            max_traceable_blocks: 2_102_400,
            max_transactions_per_block: 512,
            max_block_system_fee: 900_000_000_000,
            memory_pool_max_verified: 50_000,
            memory_pool_max_unverified: 500,
            seed_list: vec![
                "seed1.neo.org:10333".to_string(),
                "seed2.neo.org:10333".to_string(),
                "seed3.neo.org:10333".to_string(),
                "seed4.neo.org:10333".to_string(),
                "seed5.neo.org:10333".to_string(),
            ],
            native_activations: Vec::new(),
            standby_committee: Vec::new(),
        }
    }

    pub fn testnet() -> Self {
        Self {
            network: TESTNET_MAGIC,
            address_version: MAINNET_ADDRESS_VERSION,
            seed_list: vec![
                "seed1t5.neo.org:20333".to_string(),
                "seed2t5.neo.org:20333".to_string(),
                "seed3t5.neo.org:20333".to_string(),
                "seed4t5.neo.org:20333".to_string(),
                "seed5t5.neo.org:20333".to_string(),
            ],
            ..Self::mainnet()
        }
    }

    /// A minimal, fast-block private network used by integration tests.
    pub fn private_net() -> Self {
        Self {
            network: 0x4E45_4F50,
            milliseconds_per_block: 1_000,
            validators_count: 1,
            committee_members_count: 1,
            seed_list: Vec::new(),
            memory_pool_max_verified: 1_000,
            memory_pool_max_unverified: 100,
            ..Self::mainnet()
        }
    }

    pub fn reverification_batch_size(&self) -> usize {
        250
    }

    pub fn is_native_active(&self, contract_name: &str, height: u32) -> bool {
        self.native_activations
            .iter()
            .find(|a| a.contract_name == contract_name)
            .map(|a| height >= a.active_from)
            .unwrap_or(true)
    }
}

impl Default for ProtocolSettings {
    fn default() -> Self {
        Self::mainnet()
    }
}

/// Address (de)rendering against a given network's version byte. Lives here
/// rather than `neo-cryptography` because the version byte is a protocol
/// setting, not a cryptographic constant.
pub fn script_hash_to_address(settings: &ProtocolSettings, script_hash: &UInt160) -> String {
    let mut payload = Vec::with_capacity(21);
    payload.push(settings.address_version);
    payload.extend_from_slice(script_hash.as_bytes());
    neo_cryptography::encode_check(&payload)
}

pub fn address_to_script_hash(
    settings: &ProtocolSettings,
    address: &str,
) -> Result<UInt160, String> {
    let payload = neo_cryptography::decode_check(address).map_err(|e| e.to_string())?;
    if payload.len() != 21 || payload[0] != settings.address_version {
        return Err("address version byte mismatch".to_string());
    }
    UInt160::from_bytes(&payload[1..]).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mainnet_and_testnet_have_distinct_magic() {
        assert_ne!(ProtocolSettings::mainnet().network, ProtocolSettings::testnet().network);
    }

    #[test]
    fn address_round_trips() {
        let settings = ProtocolSettings::mainnet();
        let hash = UInt160::ZERO;
        let address = script_hash_to_address(&settings, &hash);
        assert!(address.starts_with('N'));
        let recovered = address_to_script_hash(&settings, &address).unwrap();
        assert_eq!(recovered, hash);
    }

    #[test]
    fn rejects_wrong_version_byte_address() {
        let settings = ProtocolSettings::mainnet();
        let mut other = settings.clone();
        other.address_version = 0x17;
        let address = script_hash_to_address(&other, &UInt160::ZERO);
        assert!(address_to_script_hash(&settings, &address).is_err());
    }
}
