//! The persisted record of a deployed contract (spec §4.4's
//! `ContractManagement` storage: id, update counter, script hash, NEF,
//! manifest).

use neo_core::UInt160;
use neo_cryptography::sha256;
use neo_io::{BinaryWriter, IoResult, MemoryReader, Serializable};

use crate::manifest::ContractManifest;
use crate::nef::NefFile;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractState {
    pub id: i32,
    pub update_counter: u16,
    pub hash: UInt160,
    pub nef: NefFile,
    pub manifest: ContractManifest,
}

impl ContractState {
    pub fn new(id: i32, hash: UInt160, nef: NefFile, manifest: ContractManifest) -> Self {
        Self { id, update_counter: 0, hash, nef, manifest }
    }

    /// `update` bumps the counter; every other field is replaced wholesale.
    pub fn apply_update(&mut self, nef: NefFile, manifest: ContractManifest) {
        self.nef = nef;
        self.manifest = manifest;
        self.update_counter += 1;
    }

    /// Deploy-time hash: `Hash160(sender || nef_checksum || contract_name)`,
    /// matching `ContractManagement.GetContractHash`.
    pub fn calculate_hash(sender: &UInt160, nef_checksum: u32, contract_name: &str) -> UInt160 {
        let mut preimage = Vec::with_capacity(20 + 4 + contract_name.len());
        preimage.extend_from_slice(sender.as_bytes());
        preimage.extend_from_slice(&nef_checksum.to_le_bytes());
        preimage.extend_from_slice(contract_name.as_bytes());
        let digest = sha256(&sha256(&preimage));
        UInt160::from_bytes(&digest[..20]).expect("sha256 digest is 32 bytes, truncated to 20")
    }
}

impl Serializable for ContractState {
    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        writer.write_i32(self.id)?;
        writer.write_u16(self.update_counter)?;
        writer.write_serializable(&self.hash)?;
        writer.write_serializable(&self.nef)?;
        let manifest_json = self.manifest.to_json().unwrap_or_default();
        writer.write_var_string(&manifest_json)
    }

    fn deserialize(reader: &mut MemoryReader) -> IoResult<Self> {
        let id = reader.read_i32()?;
        let update_counter = reader.read_u16()?;
        let hash = reader.read_serializable()?;
        let nef = reader.read_serializable()?;
        let manifest_json = reader.read_var_string(u16::MAX as u64)?;
        let manifest = ContractManifest::from_json(&manifest_json)
            .map_err(|e| neo_io::IoError::format(0, e.to_string()))?;
        Ok(Self { id, update_counter, hash, nef, manifest })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::ContractAbi;

    fn sample_manifest() -> ContractManifest {
        ContractManifest {
            name: "Sample".to_string(),
            groups: vec![],
            supported_standards: vec![],
            abi: ContractAbi::default(),
            permissions: vec![],
            trusts: vec![],
            extra: serde_json::Value::Null,
        }
    }

    #[test]
    fn round_trips_through_wire_format() {
        let nef = NefFile::new("c".to_string(), String::new(), vec![], vec![0x40]);
        let state = ContractState::new(1, UInt160::ZERO, nef, sample_manifest());
        let mut writer = BinaryWriter::new();
        state.serialize(&mut writer).unwrap();
        let bytes = writer.to_bytes();
        let mut reader = MemoryReader::new(&bytes);
        let decoded = ContractState::deserialize(&mut reader).unwrap();
        assert_eq!(decoded, state);
    }

    #[test]
    fn apply_update_bumps_counter() {
        let nef = NefFile::new("c".to_string(), String::new(), vec![], vec![0x40]);
        let mut state = ContractState::new(1, UInt160::ZERO, nef.clone(), sample_manifest());
        state.apply_update(nef, sample_manifest());
        assert_eq!(state.update_counter, 1);
    }

    #[test]
    fn calculate_hash_is_deterministic() {
        let a = ContractState::calculate_hash(&UInt160::ZERO, 42, "Sample");
        let b = ContractState::calculate_hash(&UInt160::ZERO, 42, "Sample");
        assert_eq!(a, b);
    }
}
