//! Wire frame codec (spec §4.7): `magic|command|payloadLen|checksum|flags`
//! followed by the (possibly compressed) payload.

use neo_cryptography::{hash256, lz4_compress, lz4_decompress};
use neo_io::{BinaryWriter, IoError, MemoryReader};

use crate::command::MessageCommand;
use crate::error::{NetworkError, NetworkResult};

/// `PayloadMaxSize`: the largest payload a frame may declare.
pub const PAYLOAD_MAX_SIZE: usize = 0x0200_0000;

/// Below this size compression is never attempted — the LZ4 block header
/// overhead would make the frame larger, not smaller.
pub const COMPRESSION_MIN_SIZE: usize = 128;

bitflags::bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct FrameFlags: u8 {
        const COMPRESSED = 0b0000_0001;
    }
}

/// A decoded frame: the command identifies the payload type, `payload` is
/// always the decompressed bytes.
#[derive(Debug, Clone)]
pub struct Frame {
    pub command: MessageCommand,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(command: MessageCommand, payload: Vec<u8>) -> Self {
        Self { command, payload }
    }

    /// Encodes this frame for `magic`, compressing the payload when doing
    /// so pays for the 4-byte original-size prefix it adds.
    pub fn encode(&self, magic: u32) -> NetworkResult<Vec<u8>> {
        if self.payload.len() > PAYLOAD_MAX_SIZE {
            return Err(NetworkError::PayloadTooLarge { actual: self.payload.len(), max: PAYLOAD_MAX_SIZE });
        }

        let mut flags = FrameFlags::empty();
        let wire_payload = if self.payload.len() >= COMPRESSION_MIN_SIZE {
            let compressed = lz4_compress(&self.payload);
            if compressed.len() + 4 < self.payload.len() {
                flags |= FrameFlags::COMPRESSED;
                let mut framed = Vec::with_capacity(compressed.len() + 4);
                framed.extend_from_slice(&(self.payload.len() as u32).to_le_bytes());
                framed.extend_from_slice(&compressed);
                framed
            } else {
                self.payload.clone()
            }
        } else {
            self.payload.clone()
        };

        let checksum = frame_checksum(&wire_payload);

        let mut writer = BinaryWriter::with_capacity(16 + wire_payload.len());
        writer.write_u32(magic).map_err(NetworkError::Codec)?;
        writer.write_u8(self.command.to_byte()).map_err(NetworkError::Codec)?;
        writer.write_u32(wire_payload.len() as u32).map_err(NetworkError::Codec)?;
        writer.write_u32(checksum).map_err(NetworkError::Codec)?;
        writer.write_u8(flags.bits()).map_err(NetworkError::Codec)?;
        writer.write_bytes(&wire_payload).map_err(NetworkError::Codec)?;
        Ok(writer.to_bytes())
    }

    /// Decodes a frame whose bytes have already been read off the wire
    /// (i.e. the caller already knows `payloadLen` and read exactly that
    /// many payload bytes); see [`read_header`] for the split read this
    /// enables over an async stream.
    pub fn decode(magic: u32, bytes: &[u8]) -> NetworkResult<Self> {
        let mut reader = MemoryReader::new(bytes);
        let header = FrameHeader::read(&mut reader)?;
        if header.magic != magic {
            return Err(NetworkError::MagicMismatch { expected: magic, actual: header.magic });
        }
        let wire_payload = reader.read_bytes(header.payload_len as usize).map_err(NetworkError::Codec)?;
        Self::from_parts(header, wire_payload)
    }

    pub(crate) fn from_parts(header: FrameHeader, wire_payload: Vec<u8>) -> NetworkResult<Self> {
        if frame_checksum(&wire_payload) != header.checksum {
            return Err(NetworkError::BadChecksum);
        }

        let payload = if header.flags.contains(FrameFlags::COMPRESSED) {
            if wire_payload.len() < 4 {
                return Err(NetworkError::Codec(IoError::format(0, "compressed payload missing size prefix")));
            }
            let original_size = u32::from_le_bytes([wire_payload[0], wire_payload[1], wire_payload[2], wire_payload[3]]) as usize;
            lz4_decompress(&wire_payload[4..], original_size, PAYLOAD_MAX_SIZE)
                .map_err(|e| NetworkError::Codec(IoError::format(0, e.to_string())))?
        } else {
            wire_payload
        };

        let command = MessageCommand::from_byte(header.command_byte)?;
        Ok(Self { command, payload })
    }
}

/// The fixed 14-byte preamble (magic|command|len|checksum|flags), decoded
/// ahead of the payload so an async reader knows how many more bytes to
/// pull off the socket.
pub struct FrameHeader {
    pub magic: u32,
    pub command_byte: u8,
    pub payload_len: u32,
    pub checksum: u32,
    pub flags: FrameFlags,
}

pub const FRAME_HEADER_SIZE: usize = 14;

impl FrameHeader {
    pub fn read(reader: &mut MemoryReader) -> NetworkResult<Self> {
        let magic = reader.read_u32().map_err(NetworkError::Codec)?;
        let command_byte = reader.read_u8().map_err(NetworkError::Codec)?;
        let payload_len = reader.read_u32().map_err(NetworkError::Codec)?;
        if payload_len as usize > PAYLOAD_MAX_SIZE {
            return Err(NetworkError::PayloadTooLarge { actual: payload_len as usize, max: PAYLOAD_MAX_SIZE });
        }
        let checksum = reader.read_u32().map_err(NetworkError::Codec)?;
        let flags = FrameFlags::from_bits_truncate(reader.read_u8().map_err(NetworkError::Codec)?);
        Ok(Self { magic, command_byte, payload_len, checksum, flags })
    }

    pub fn from_bytes(bytes: &[u8; FRAME_HEADER_SIZE]) -> NetworkResult<Self> {
        let mut reader = MemoryReader::new(bytes);
        Self::read(&mut reader)
    }
}

/// `checksum = first 4 bytes (little-endian) of Sha256(Sha256(payload))`.
fn frame_checksum(payload: &[u8]) -> u32 {
    let digest = hash256(payload);
    u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_payloads_round_trip_uncompressed() {
        let frame = Frame::new(MessageCommand::Verack, vec![]);
        let bytes = frame.encode(0x334F_454E).unwrap();
        let decoded = Frame::decode(0x334F_454E, &bytes).unwrap();
        assert_eq!(decoded.command, MessageCommand::Verack);
        assert!(decoded.payload.is_empty());
    }

    #[test]
    fn large_compressible_payloads_round_trip() {
        let payload = vec![0x42u8; 4096];
        let frame = Frame::new(MessageCommand::Block, payload.clone());
        let bytes = frame.encode(0x334F_454E).unwrap();
        assert!(bytes.len() < payload.len());
        let decoded = Frame::decode(0x334F_454E, &bytes).unwrap();
        assert_eq!(decoded.payload, payload);
    }

    #[test]
    fn incompressible_small_payloads_are_not_wrapped() {
        let payload = vec![1, 2, 3, 4];
        let frame = Frame::new(MessageCommand::Ping, payload.clone());
        let bytes = frame.encode(0x334F_454E).unwrap();
        let decoded = Frame::decode(0x334F_454E, &bytes).unwrap();
        assert_eq!(decoded.payload, payload);
    }

    #[test]
    fn magic_mismatch_is_rejected() {
        let frame = Frame::new(MessageCommand::Verack, vec![]);
        let bytes = frame.encode(0x334F_454E).unwrap();
        assert!(matches!(Frame::decode(0x4E45_4F54, &bytes), Err(NetworkError::MagicMismatch { .. })));
    }

    #[test]
    fn corrupted_payload_fails_checksum() {
        let frame = Frame::new(MessageCommand::Ping, vec![1, 2, 3, 4]);
        let mut bytes = frame.encode(0x334F_454E).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        assert!(matches!(Frame::decode(0x334F_454E, &bytes), Err(NetworkError::BadChecksum)));
    }
}
