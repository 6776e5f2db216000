//! Fixed-size hash types used throughout the protocol: `UInt160` (script
//! hashes / addresses) and `UInt256` (block and transaction hashes).
//!
//! Both are little-endian byte arrays. Wire encoding writes the bytes as-is;
//! `Display`/hex conversions reverse them, matching the Neo convention of
//! printing hashes in the same big-endian order block explorers use.

use crate::error::{CoreError, CoreResult};
use neo_io::{BinaryWriter, IoResult, MemoryReader, Serializable};
use std::fmt;
use std::str::FromStr;

macro_rules! fixed_hash {
    ($name:ident, $size:expr, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
        pub struct $name(pub [u8; $size]);

        impl $name {
            pub const SIZE: usize = $size;
            pub const ZERO: $name = $name([0u8; $size]);

            pub fn new(bytes: [u8; $size]) -> Self {
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &[u8] {
                &self.0
            }

            pub fn from_bytes(bytes: &[u8]) -> CoreResult<Self> {
                if bytes.len() != $size {
                    return Err(CoreError::InvalidLength {
                        expected: $size,
                        actual: bytes.len(),
                    });
                }
                let mut array = [0u8; $size];
                array.copy_from_slice(bytes);
                Ok(Self(array))
            }

            /// Parses the big-endian hex string (optionally `0x`-prefixed)
            /// that users and RPC payloads typically display.
            pub fn from_hex(s: &str) -> CoreResult<Self> {
                let s = s.strip_prefix("0x").unwrap_or(s);
                let mut bytes =
                    hex::decode(s).map_err(|e| CoreError::InvalidHex(e.to_string()))?;
                if bytes.len() != $size {
                    return Err(CoreError::InvalidLength {
                        expected: $size,
                        actual: bytes.len(),
                    });
                }
                bytes.reverse();
                let mut array = [0u8; $size];
                array.copy_from_slice(&bytes);
                Ok(Self(array))
            }

            /// Renders as big-endian hex (`0x`-prefixed), the conventional
            /// display form.
            pub fn to_hex(&self) -> String {
                let mut reversed = self.0.to_vec();
                reversed.reverse();
                format!("0x{}", hex::encode(reversed))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::ZERO
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.to_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_hex())
            }
        }

        impl FromStr for $name {
            type Err = CoreError;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_hex(s)
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl Serializable for $name {
            fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
                writer.write_bytes(&self.0)
            }

            fn deserialize(reader: &mut MemoryReader<'_>) -> IoResult<Self> {
                let bytes = reader.read_bytes($size)?;
                let mut array = [0u8; $size];
                array.copy_from_slice(&bytes);
                Ok(Self(array))
            }
        }
    };
}

fixed_hash!(UInt160, 20, "A 160-bit hash: a contract or account script hash.");
fixed_hash!(UInt256, 32, "A 256-bit hash: a block or transaction hash.");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uint160_hex_round_trips_in_big_endian_display_order() {
        let mut bytes = [0u8; 20];
        bytes[0] = 0x01;
        bytes[19] = 0xff;
        let h = UInt160::new(bytes);
        let hex = h.to_hex();
        let parsed = UInt160::from_hex(&hex).unwrap();
        assert_eq!(h, parsed);
    }

    #[test]
    fn uint256_serialize_round_trips() {
        let mut bytes = [0u8; 32];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = i as u8;
        }
        let h = UInt256::new(bytes);
        let mut writer = BinaryWriter::new();
        h.serialize(&mut writer).unwrap();
        let encoded = writer.to_bytes();
        assert_eq!(encoded.len(), 32);
        let mut reader = MemoryReader::new(&encoded);
        let decoded = UInt256::deserialize(&mut reader).unwrap();
        assert_eq!(h, decoded);
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(UInt160::from_bytes(&[0u8; 19]).is_err());
    }

    #[test]
    fn ordering_is_lexicographic_over_stored_bytes() {
        let a = UInt160::new([0u8; 20]);
        let mut b_bytes = [0u8; 20];
        b_bytes[19] = 1;
        let b = UInt160::new(b_bytes);
        assert!(a < b);
    }
}
