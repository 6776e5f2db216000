//! The `Serializable` trait implemented by every wire-format object.

use crate::{BinaryWriter, IoResult, MemoryReader};

/// Byte-exact binary (de)serialization, shared by every protocol object
/// (transactions, blocks, signers, witnesses, P2P payloads, ...).
pub trait Serializable: Sized {
    /// Writes `self` in its canonical wire form.
    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()>;

    /// Reads a value back from its canonical wire form.
    fn deserialize(reader: &mut MemoryReader) -> IoResult<Self>;

    /// Convenience: serialize into a fresh byte vector.
    fn to_bytes(&self) -> Vec<u8> {
        let mut writer = BinaryWriter::new();
        // Serialization of well-formed in-memory values never fails.
        self.serialize(&mut writer).expect("serialize is infallible for in-memory values");
        writer.to_bytes()
    }

    /// Convenience: deserialize from a byte slice, requiring the entire
    /// slice to be consumed.
    fn from_bytes(data: &[u8]) -> IoResult<Self> {
        let mut reader = MemoryReader::new(data);
        let value = Self::deserialize(&mut reader)?;
        Ok(value)
    }
}

impl Serializable for u8 {
    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        writer.write_u8(*self)
    }

    fn deserialize(reader: &mut MemoryReader) -> IoResult<Self> {
        reader.read_u8()
    }
}

impl Serializable for u32 {
    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        writer.write_u32(*self)
    }

    fn deserialize(reader: &mut MemoryReader) -> IoResult<Self> {
        reader.read_u32()
    }
}

impl Serializable for u64 {
    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        writer.write_u64(*self)
    }

    fn deserialize(reader: &mut MemoryReader) -> IoResult<Self> {
        reader.read_u64()
    }
}
