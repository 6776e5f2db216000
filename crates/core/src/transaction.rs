//! The Neo N3 transaction format: fee-bearing, signer-scoped VM script
//! execution requests.

use crate::attribute::TransactionAttribute;
use crate::error::{CoreError, CoreResult};
use crate::signer::Signer;
use crate::uint::UInt256;
use crate::witness::Witness;
use neo_io::{BinaryWriter, IoResult, MemoryReader, Serializable};

pub const MAX_TRANSACTION_SIZE: usize = 102_400;
pub const MAX_TRANSACTION_ATTRIBUTES: usize = 16;
pub const MAX_SCRIPT_LENGTH: usize = MAX_TRANSACTION_SIZE;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Transaction {
    pub version: u8,
    pub nonce: u32,
    /// In datoshi (1 datoshi = 1e-8 GAS).
    pub system_fee: i64,
    /// In datoshi.
    pub network_fee: i64,
    pub valid_until_block: u32,
    pub signers: Vec<Signer>,
    pub attributes: Vec<TransactionAttribute>,
    pub script: Vec<u8>,
    pub witnesses: Vec<Witness>,
}

impl Transaction {
    /// The part of the transaction covered by signatures: everything except
    /// the witnesses.
    fn write_unsigned(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        writer.write_u8(self.version)?;
        writer.write_u32(self.nonce)?;
        writer.write_i64(self.system_fee)?;
        writer.write_i64(self.network_fee)?;
        writer.write_u32(self.valid_until_block)?;
        writer.write_serializable_list(&self.signers)?;
        writer.write_serializable_list(&self.attributes)?;
        writer.write_var_bytes(&self.script)
    }

    pub fn hash(&self) -> UInt256 {
        let mut writer = BinaryWriter::new();
        self.write_unsigned(&mut writer)
            .expect("serializing an in-memory transaction cannot fail");
        UInt256::new(neo_cryptography::hash256(&writer.to_bytes()))
    }

    pub fn size(&self) -> usize {
        self.to_bytes().len()
    }

    /// Structural checks independent of chain state: size/attribute/signer
    /// bounds and per-attribute validity. Witness verification and balance
    /// checks happen in `neo-ledger` against a `DataCache` snapshot.
    pub fn verify_structure(&self) -> CoreResult<()> {
        if self.attributes.len() > MAX_TRANSACTION_ATTRIBUTES {
            return Err(CoreError::TooManyAttributes {
                actual: self.attributes.len(),
                max: MAX_TRANSACTION_ATTRIBUTES,
            });
        }
        let mut seen_accounts = std::collections::HashSet::new();
        for signer in &self.signers {
            if !seen_accounts.insert(signer.account) {
                return Err(CoreError::InvalidAddress(
                    "duplicate signer account".to_string(),
                ));
            }
            signer.validate()?;
        }
        for attribute in &self.attributes {
            attribute.verify()?;
        }
        let size = self.size();
        if size > MAX_TRANSACTION_SIZE {
            return Err(CoreError::TransactionTooLarge {
                actual: size,
                max: MAX_TRANSACTION_SIZE,
            });
        }
        Ok(())
    }

    /// Convenience accessor for the primary signer (the fee payer).
    pub fn sender(&self) -> Option<crate::UInt160> {
        self.signers.first().map(|s| s.account)
    }
}

impl Serializable for Transaction {
    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        self.write_unsigned(writer)?;
        writer.write_serializable_list(&self.witnesses)
    }

    fn deserialize(reader: &mut MemoryReader) -> IoResult<Self> {
        let version = reader.read_u8()?;
        let nonce = reader.read_u32()?;
        let system_fee = reader.read_i64()?;
        let network_fee = reader.read_i64()?;
        let valid_until_block = reader.read_u32()?;
        let signers = reader.read_serializable_list::<Signer>(MAX_TRANSACTION_ATTRIBUTES as u64)?;
        let attributes = reader
            .read_serializable_list::<TransactionAttribute>(MAX_TRANSACTION_ATTRIBUTES as u64)?;
        let script = reader.read_var_bytes(MAX_SCRIPT_LENGTH as u64)?;
        let witnesses = reader.read_serializable_list::<Witness>(signers.len().max(1) as u64)?;

        Ok(Self {
            version,
            nonce,
            system_fee,
            network_fee,
            valid_until_block,
            signers,
            attributes,
            script,
            witnesses,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uint::UInt160;
    use crate::witness_scope::WitnessScope;

    fn sample_tx() -> Transaction {
        Transaction {
            version: 0,
            nonce: 1,
            system_fee: 100,
            network_fee: 200,
            valid_until_block: 1000,
            signers: vec![Signer::new(UInt160::ZERO, WitnessScope::CALLED_BY_ENTRY)],
            attributes: vec![TransactionAttribute::HighPriority],
            script: vec![0x51, 0x52],
            witnesses: vec![Witness::new(vec![], vec![])],
        }
    }

    #[test]
    fn round_trips() {
        let tx = sample_tx();
        let bytes = tx.to_bytes();
        let decoded = Transaction::from_bytes(&bytes).unwrap();
        assert_eq!(tx, decoded);
    }

    #[test]
    fn hash_excludes_witnesses() {
        let mut tx = sample_tx();
        let original_hash = tx.hash();
        tx.witnesses[0].invocation_script = vec![0xff; 8];
        assert_eq!(tx.hash(), original_hash);
    }

    #[test]
    fn rejects_duplicate_signer_accounts() {
        let mut tx = sample_tx();
        tx.signers.push(Signer::new(UInt160::ZERO, WitnessScope::GLOBAL));
        assert!(tx.verify_structure().is_err());
    }

    #[test]
    fn rejects_too_many_attributes() {
        let mut tx = sample_tx();
        tx.attributes = (0..MAX_TRANSACTION_ATTRIBUTES + 1)
            .map(|_| TransactionAttribute::HighPriority)
            .collect();
        assert!(tx.verify_structure().is_err());
    }
}
