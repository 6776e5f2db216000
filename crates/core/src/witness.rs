//! Witness: the invocation and verification scripts that satisfy a signer.

use neo_io::{BinaryWriter, IoResult, MemoryReader, Serializable};

/// `11 * (64 + 2)`: a 21-of-11 committee multi-signature invocation.
pub const MAX_INVOCATION_SCRIPT: usize = 1024;
/// `1 + (2 + 33) * 21 + 2 + 1 + 5`: a 21-member multi-signature verification.
pub const MAX_VERIFICATION_SCRIPT: usize = 1024;

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Witness {
    pub invocation_script: Vec<u8>,
    pub verification_script: Vec<u8>,
}

impl Witness {
    pub fn new(invocation_script: Vec<u8>, verification_script: Vec<u8>) -> Self {
        Self {
            invocation_script,
            verification_script,
        }
    }

    pub fn script_hash(&self) -> crate::UInt160 {
        let hash = neo_cryptography::hash160(&self.verification_script);
        crate::UInt160::new(hash)
    }
}

impl Serializable for Witness {
    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        writer.write_var_bytes(&self.invocation_script)?;
        writer.write_var_bytes(&self.verification_script)
    }

    fn deserialize(reader: &mut MemoryReader) -> IoResult<Self> {
        let invocation_script = reader.read_var_bytes(MAX_INVOCATION_SCRIPT as u64)?;
        let verification_script = reader.read_var_bytes(MAX_VERIFICATION_SCRIPT as u64)?;
        Ok(Self {
            invocation_script,
            verification_script,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let witness = Witness::new(vec![1, 2, 3], vec![4, 5, 6]);
        let mut writer = BinaryWriter::new();
        witness.serialize(&mut writer).unwrap();
        let bytes = writer.to_bytes();
        let mut reader = MemoryReader::new(&bytes);
        assert_eq!(Witness::deserialize(&mut reader).unwrap(), witness);
    }

    #[test]
    fn script_hash_is_hash160_of_verification_script() {
        let witness = Witness::new(vec![], vec![0x51]);
        assert_eq!(
            witness.script_hash().as_bytes(),
            &neo_cryptography::hash160(&[0x51])[..]
        );
    }
}
