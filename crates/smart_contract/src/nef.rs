//! Neo Executable Format: the compiled-contract container a `deploy` call
//! carries (spec §4.4's "valid NEF ... and manifest" deploy precondition).

use neo_core::UInt160;
use neo_cryptography::hash256;
use neo_io::{BinaryWriter, IoError, IoResult, MemoryReader, Serializable};
use neo_vm::CallFlags;

const NEF_MAGIC: u32 = 0x3346_454E; // "NEF3" little-endian
const MAX_SCRIPT_LENGTH: u64 = 512 * 1024;
const MAX_SOURCE_LENGTH: u64 = 256;

/// A cross-contract call a script may invoke without its own `SYSCALL`/
/// `CALL` resolving the target at runtime — the target is baked into the
/// NEF at compile time and resolved once at load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodToken {
    pub hash: UInt160,
    pub method: String,
    pub parameters_count: u16,
    pub has_return_value: bool,
    pub call_flags: CallFlags,
}

impl Serializable for MethodToken {
    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        writer.write_serializable(&self.hash)?;
        writer.write_var_string(&self.method)?;
        writer.write_u16(self.parameters_count)?;
        writer.write_bool(self.has_return_value)?;
        writer.write_u8(self.call_flags.bits())
    }

    fn deserialize(reader: &mut MemoryReader) -> IoResult<Self> {
        let hash = reader.read_serializable()?;
        let method = reader.read_var_string(32)?;
        let parameters_count = reader.read_u16()?;
        let has_return_value = reader.read_bool()?;
        let bits = reader.read_u8()?;
        let call_flags = CallFlags::from_bits(bits)
            .ok_or_else(|| IoError::format(0, format!("invalid call flags byte 0x{bits:02x}")))?;
        Ok(Self { hash, method, parameters_count, has_return_value, call_flags })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NefFile {
    pub compiler: String,
    pub source: String,
    pub tokens: Vec<MethodToken>,
    pub script: Vec<u8>,
    pub checksum: u32,
}

impl NefFile {
    /// Builds a NEF with a freshly computed checksum, matching `compile`.
    pub fn new(compiler: String, source: String, tokens: Vec<MethodToken>, script: Vec<u8>) -> Self {
        let mut nef = Self { compiler, source, tokens, script, checksum: 0 };
        nef.checksum = nef.compute_checksum();
        nef
    }

    /// First 4 bytes little-endian of `Hash256` over every field but the
    /// checksum itself.
    pub fn compute_checksum(&self) -> u32 {
        let mut writer = BinaryWriter::new();
        self.write_unsigned(&mut writer).expect("in-memory writer cannot fail");
        let digest = hash256(&writer.to_bytes());
        u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]])
    }

    fn write_unsigned(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        writer.write_u32(NEF_MAGIC)?;
        write_fixed_string(writer, &self.compiler, 64)?;
        write_fixed_string(writer, &self.source, MAX_SOURCE_LENGTH as usize)?;
        writer.write_u8(0)?; // reserved
        writer.write_serializable_list(&self.tokens)?;
        writer.write_u16(0)?; // reserved
        writer.write_var_bytes(&self.script)
    }

    pub fn is_checksum_valid(&self) -> bool {
        self.checksum == self.compute_checksum()
    }
}

fn write_fixed_string(writer: &mut BinaryWriter, value: &str, len: usize) -> IoResult<()> {
    let mut buf = vec![0u8; len];
    let bytes = value.as_bytes();
    let n = bytes.len().min(len);
    buf[..n].copy_from_slice(&bytes[..n]);
    writer.write_bytes(&buf)
}

fn read_fixed_string(reader: &mut MemoryReader, len: usize) -> IoResult<String> {
    let bytes = reader.read_bytes(len)?;
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8(bytes[..end].to_vec()).map_err(|_| IoError::InvalidUtf8 { offset: 0 })
}

impl Serializable for NefFile {
    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        self.write_unsigned(writer)?;
        writer.write_u32(self.checksum)
    }

    fn deserialize(reader: &mut MemoryReader) -> IoResult<Self> {
        let magic = reader.read_u32()?;
        if magic != NEF_MAGIC {
            return Err(IoError::format(0, format!("bad NEF magic: 0x{magic:08x}")));
        }
        let compiler = read_fixed_string(reader, 64)?;
        let source = read_fixed_string(reader, MAX_SOURCE_LENGTH as usize)?;
        let reserved1 = reader.read_u8()?;
        if reserved1 != 0 {
            return Err(IoError::format(0, "NEF reserved byte must be zero"));
        }
        let tokens = reader.read_serializable_list(128)?;
        let reserved2 = reader.read_u16()?;
        if reserved2 != 0 {
            return Err(IoError::format(0, "NEF reserved field must be zero"));
        }
        let script = reader.read_var_bytes(MAX_SCRIPT_LENGTH)?;
        if script.is_empty() {
            return Err(IoError::format(0, "NEF script must not be empty"));
        }
        let checksum = reader.read_u32()?;
        let nef = Self { compiler, source, tokens, script, checksum };
        if !nef.is_checksum_valid() {
            return Err(IoError::format(0, "NEF checksum mismatch"));
        }
        Ok(nef)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_wire_format() {
        let nef = NefFile::new(
            "neo-csc 3.0".to_string(),
            String::new(),
            vec![],
            vec![0x51, 0x41], // PUSH1 RET-ish placeholder script bytes
        );
        let mut writer = BinaryWriter::new();
        nef.serialize(&mut writer).unwrap();
        let bytes = writer.to_bytes();
        let mut reader = MemoryReader::new(&bytes);
        let decoded = NefFile::deserialize(&mut reader).unwrap();
        assert_eq!(decoded, nef);
    }

    #[test]
    fn tampered_script_fails_checksum() {
        let mut nef = NefFile::new("c".to_string(), String::new(), vec![], vec![0x51]);
        nef.script = vec![0x52];
        assert!(!nef.is_checksum_valid());
    }
}
