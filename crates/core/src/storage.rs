//! Storage keys and items: the unit of state the `DataCache` persists.

use crate::uint::UInt160;
use neo_io::{BinaryWriter, IoResult, MemoryReader, Serializable};

/// A contract's persisted key: its id plus an arbitrary key byte string.
/// Contract ids are embedded big-endian so that lexicographic key ordering
/// groups a contract's entries together and matches the range the `seek`
/// prefix scan over a given contract expects.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct StorageKey {
    pub contract_id: i32,
    pub key: Vec<u8>,
}

impl StorageKey {
    pub fn new(contract_id: i32, key: Vec<u8>) -> Self {
        Self { contract_id, key }
    }

    /// Flattens to the byte string `DataCache`/`Store` actually index on:
    /// big-endian contract id followed by the raw key.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(4 + self.key.len());
        buf.extend_from_slice(&self.contract_id.to_be_bytes());
        buf.extend_from_slice(&self.key);
        buf
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 4 {
            return None;
        }
        let mut id_bytes = [0u8; 4];
        id_bytes.copy_from_slice(&bytes[0..4]);
        Some(Self {
            contract_id: i32::from_be_bytes(id_bytes),
            key: bytes[4..].to_vec(),
        })
    }

    /// The lower bound of the key range covering the entire contract.
    pub fn prefix(contract_id: i32) -> Vec<u8> {
        contract_id.to_be_bytes().to_vec()
    }
}

impl Serializable for StorageKey {
    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        writer.write_i32(self.contract_id)?;
        writer.write_var_bytes(&self.key)
    }

    fn deserialize(reader: &mut MemoryReader) -> IoResult<Self> {
        let contract_id = reader.read_i32()?;
        let key = reader.read_var_bytes(neo_io::DEFAULT_MAX_ARRAY_SIZE)?;
        Ok(Self { contract_id, key })
    }
}

/// A stored value plus the flag that marks it read-only once written
/// (matches native contracts' "constant" storage entries, e.g. total supply
/// decimals).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StorageItem {
    pub value: Vec<u8>,
}

impl StorageItem {
    pub fn new(value: Vec<u8>) -> Self {
        Self { value }
    }

    /// Interprets the stored value as a little-endian two's-complement
    /// integer, the encoding native contracts use for balances and counters.
    pub fn as_bigint(&self) -> num_bigint::BigInt {
        if self.value.is_empty() {
            return num_bigint::BigInt::from(0);
        }
        num_bigint::BigInt::from_signed_bytes_le(&self.value)
    }

    pub fn from_bigint(value: &num_bigint::BigInt) -> Self {
        Self::new(value.to_signed_bytes_le())
    }
}

impl Serializable for StorageItem {
    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        writer.write_var_bytes(&self.value)
    }

    fn deserialize(reader: &mut MemoryReader) -> IoResult<Self> {
        Ok(Self {
            value: reader.read_var_bytes(neo_io::DEFAULT_MAX_ARRAY_SIZE)?,
        })
    }
}

/// Identifies a contract's native-contract id space vs. user-deployed
/// contracts, used when constructing `StorageKey::prefix` for system calls.
pub fn native_contract_key(contract_hash: &UInt160, id: i32, key: &[u8]) -> StorageKey {
    let _ = contract_hash;
    StorageKey::new(id, key.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_key_flattened_round_trips() {
        let key = StorageKey::new(-5, vec![1, 2, 3]);
        let flat = key.to_bytes();
        assert_eq!(StorageKey::from_bytes(&flat).unwrap(), key);
    }

    #[test]
    fn storage_item_bigint_round_trips() {
        let value = num_bigint::BigInt::from(-12345);
        let item = StorageItem::from_bigint(&value);
        assert_eq!(item.as_bigint(), value);
    }

    #[test]
    fn empty_storage_item_is_zero() {
        let item = StorageItem::new(vec![]);
        assert_eq!(item.as_bigint(), num_bigint::BigInt::from(0));
    }
}
