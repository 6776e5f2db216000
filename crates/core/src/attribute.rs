//! Transaction attributes: out-of-band metadata attached to a transaction.

use crate::error::{CoreError, CoreResult};
use crate::uint::UInt256;
use neo_io::{BinaryWriter, IoResult, MemoryReader, Serializable};

pub const MAX_RESULT_SIZE: usize = u16::MAX as usize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[repr(u8)]
pub enum OracleResponseCode {
    Success = 0x00,
    ProtocolNotSupported = 0x10,
    ConsensusUnreachable = 0x12,
    NotFound = 0x14,
    Timeout = 0x16,
    Forbidden = 0x18,
    ResponseTooLarge = 0x1a,
    InsufficientFunds = 0x1c,
    ContentTypeNotSupported = 0x1f,
    Error = 0xff,
}

impl OracleResponseCode {
    fn from_byte(value: u8) -> CoreResult<Self> {
        Ok(match value {
            0x00 => Self::Success,
            0x10 => Self::ProtocolNotSupported,
            0x12 => Self::ConsensusUnreachable,
            0x14 => Self::NotFound,
            0x16 => Self::Timeout,
            0x18 => Self::Forbidden,
            0x1a => Self::ResponseTooLarge,
            0x1c => Self::InsufficientFunds,
            0x1f => Self::ContentTypeNotSupported,
            0xff => Self::Error,
            other => return Err(CoreError::UnknownAttributeType(other)),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TransactionAttribute {
    /// Requests consensus priority for this transaction within its block.
    HighPriority,
    /// An oracle node's response to a pending `Oracle.request`.
    OracleResponse {
        id: u64,
        code: OracleResponseCode,
        result: Vec<u8>,
    },
    /// The transaction is invalid before the given block height.
    NotValidBefore { height: u32 },
    /// Invalidates a previously broadcast transaction with the given hash.
    Conflicts { hash: UInt256 },
}

impl TransactionAttribute {
    fn usage_byte(&self) -> u8 {
        match self {
            Self::HighPriority => 0x01,
            Self::OracleResponse { .. } => 0x11,
            Self::NotValidBefore { .. } => 0x20,
            Self::Conflicts { .. } => 0x21,
        }
    }

    pub fn verify(&self) -> CoreResult<()> {
        match self {
            Self::OracleResponse { result, .. } if result.len() > MAX_RESULT_SIZE => {
                Err(CoreError::InvalidLength {
                    expected: MAX_RESULT_SIZE,
                    actual: result.len(),
                })
            }
            _ => Ok(()),
        }
    }
}

impl Serializable for TransactionAttribute {
    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        writer.write_u8(self.usage_byte())?;
        match self {
            Self::HighPriority => Ok(()),
            Self::OracleResponse { id, code, result } => {
                writer.write_u64(*id)?;
                writer.write_u8(*code as u8)?;
                writer.write_var_bytes(result)
            }
            Self::NotValidBefore { height } => writer.write_u32(*height),
            Self::Conflicts { hash } => writer.write_bytes(hash.as_bytes()),
        }
    }

    fn deserialize(reader: &mut MemoryReader) -> IoResult<Self> {
        let usage = reader.read_u8()?;
        Ok(match usage {
            0x01 => Self::HighPriority,
            0x11 => {
                let id = reader.read_u64()?;
                let code_byte = reader.read_u8()?;
                let code = OracleResponseCode::from_byte(code_byte)
                    .map_err(|e| neo_io::IoError::format(reader.position(), e.to_string()))?;
                let result = reader.read_var_bytes(MAX_RESULT_SIZE as u64)?;
                Self::OracleResponse { id, code, result }
            }
            0x20 => Self::NotValidBefore {
                height: reader.read_u32()?,
            },
            0x21 => Self::Conflicts {
                hash: UInt256::deserialize(reader)?,
            },
            other => {
                return Err(neo_io::IoError::format(
                    reader.position(),
                    format!("unknown transaction attribute usage 0x{other:02x}"),
                ))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_priority_round_trips() {
        let attr = TransactionAttribute::HighPriority;
        let mut writer = BinaryWriter::new();
        attr.serialize(&mut writer).unwrap();
        let bytes = writer.to_bytes();
        assert_eq!(bytes, vec![0x01]);
        let mut reader = MemoryReader::new(&bytes);
        assert_eq!(TransactionAttribute::deserialize(&mut reader).unwrap(), attr);
    }

    #[test]
    fn conflicts_round_trips() {
        let attr = TransactionAttribute::Conflicts {
            hash: UInt256::ZERO,
        };
        let mut writer = BinaryWriter::new();
        attr.serialize(&mut writer).unwrap();
        let bytes = writer.to_bytes();
        let mut reader = MemoryReader::new(&bytes);
        assert_eq!(TransactionAttribute::deserialize(&mut reader).unwrap(), attr);
    }

    #[test]
    fn oversized_oracle_result_fails_verification() {
        let attr = TransactionAttribute::OracleResponse {
            id: 1,
            code: OracleResponseCode::Success,
            result: vec![0u8; MAX_RESULT_SIZE + 1],
        };
        assert!(attr.verify().is_err());
    }
}
