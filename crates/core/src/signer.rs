//! Transaction signer: an account plus the scope its witness authorizes.

use crate::error::CoreError;
use crate::uint::UInt160;
use crate::witness_rule::{WitnessRule, MAX_SUBITEMS};
use crate::witness_scope::WitnessScope;
use neo_io::{BinaryWriter, IoResult, MemoryReader, Serializable};

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Signer {
    pub account: UInt160,
    pub scopes: WitnessScope,
    pub allowed_contracts: Vec<UInt160>,
    /// Compressed secp256r1 public keys (33 bytes each).
    pub allowed_groups: Vec<Vec<u8>>,
    pub rules: Vec<WitnessRule>,
}

impl Signer {
    pub fn new(account: UInt160, scopes: WitnessScope) -> Self {
        Self {
            account,
            scopes,
            allowed_contracts: Vec::new(),
            allowed_groups: Vec::new(),
            rules: Vec::new(),
        }
    }
}

impl Serializable for Signer {
    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        writer.write_bytes(self.account.as_bytes())?;
        writer.write_u8(self.scopes.to_byte())?;

        if self.scopes.contains(WitnessScope::CUSTOM_CONTRACTS) {
            writer.write_var_int(self.allowed_contracts.len() as u64)?;
            for contract in &self.allowed_contracts {
                writer.write_bytes(contract.as_bytes())?;
            }
        }
        if self.scopes.contains(WitnessScope::CUSTOM_GROUPS) {
            writer.write_var_int(self.allowed_groups.len() as u64)?;
            for group in &self.allowed_groups {
                writer.write_bytes(group)?;
            }
        }
        if self.scopes.contains(WitnessScope::WITNESS_RULES) {
            writer.write_var_int(self.rules.len() as u64)?;
            for rule in &self.rules {
                rule.serialize(writer)?;
            }
        }
        Ok(())
    }

    fn deserialize(reader: &mut MemoryReader) -> IoResult<Self> {
        let account = UInt160::deserialize(reader)?;
        let scope_byte = reader.read_u8()?;
        let scopes = WitnessScope::from_byte(scope_byte)
            .ok_or_else(|| neo_io::IoError::format(reader.position(), "invalid witness scope"))?;

        let mut allowed_contracts = Vec::new();
        let mut allowed_groups = Vec::new();
        let mut rules = Vec::new();

        if scopes.contains(WitnessScope::CUSTOM_CONTRACTS) {
            let count = reader.read_var_int(MAX_SUBITEMS as u64)?;
            for _ in 0..count {
                allowed_contracts.push(UInt160::deserialize(reader)?);
            }
        }
        if scopes.contains(WitnessScope::CUSTOM_GROUPS) {
            let count = reader.read_var_int(MAX_SUBITEMS as u64)?;
            for _ in 0..count {
                allowed_groups.push(reader.read_bytes(33)?);
            }
        }
        if scopes.contains(WitnessScope::WITNESS_RULES) {
            let count = reader.read_var_int(MAX_SUBITEMS as u64)?;
            for _ in 0..count {
                rules.push(WitnessRule::deserialize(reader)?);
            }
        }

        Ok(Self {
            account,
            scopes,
            allowed_contracts,
            allowed_groups,
            rules,
        })
    }
}

impl Signer {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.allowed_contracts.len() > MAX_SUBITEMS || self.allowed_groups.len() > MAX_SUBITEMS
        {
            return Err(CoreError::TooManySubitems {
                actual: self.allowed_contracts.len().max(self.allowed_groups.len()),
                max: MAX_SUBITEMS,
            });
        }
        for rule in &self.rules {
            rule.is_valid()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_basic_signer() {
        let signer = Signer::new(UInt160::ZERO, WitnessScope::CALLED_BY_ENTRY);
        let mut writer = BinaryWriter::new();
        signer.serialize(&mut writer).unwrap();
        let bytes = writer.to_bytes();
        let mut reader = MemoryReader::new(&bytes);
        assert_eq!(Signer::deserialize(&mut reader).unwrap(), signer);
    }

    #[test]
    fn round_trips_signer_with_custom_contracts() {
        let mut signer = Signer::new(UInt160::ZERO, WitnessScope::CUSTOM_CONTRACTS);
        signer.allowed_contracts.push(UInt160::ZERO);
        let mut writer = BinaryWriter::new();
        signer.serialize(&mut writer).unwrap();
        let bytes = writer.to_bytes();
        let mut reader = MemoryReader::new(&bytes);
        assert_eq!(Signer::deserialize(&mut reader).unwrap(), signer);
    }
}
