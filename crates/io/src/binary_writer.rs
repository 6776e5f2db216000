//! Binary writer for Neo N3 wire-format (de)serialization.

use crate::{IoResult, Serializable};
use bytes::{BufMut, BytesMut};

/// Writes little-endian integers, varints, and length-prefixed byte/string
/// data into a growable buffer, matching the Neo N3 binary protocol.
pub struct BinaryWriter {
    buffer: BytesMut,
}

impl BinaryWriter {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
        }
    }

    pub fn position(&self) -> usize {
        self.buffer.len()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn write_u8(&mut self, value: u8) -> IoResult<()> {
        self.buffer.put_u8(value);
        Ok(())
    }

    pub fn write_bool(&mut self, value: bool) -> IoResult<()> {
        self.write_u8(value as u8)
    }

    pub fn write_i8(&mut self, value: i8) -> IoResult<()> {
        self.write_u8(value as u8)
    }

    pub fn write_u16(&mut self, value: u16) -> IoResult<()> {
        self.buffer.put_u16_le(value);
        Ok(())
    }

    pub fn write_i16(&mut self, value: i16) -> IoResult<()> {
        self.buffer.put_i16_le(value);
        Ok(())
    }

    pub fn write_u32(&mut self, value: u32) -> IoResult<()> {
        self.buffer.put_u32_le(value);
        Ok(())
    }

    pub fn write_i32(&mut self, value: i32) -> IoResult<()> {
        self.buffer.put_i32_le(value);
        Ok(())
    }

    pub fn write_u64(&mut self, value: u64) -> IoResult<()> {
        self.buffer.put_u64_le(value);
        Ok(())
    }

    pub fn write_i64(&mut self, value: i64) -> IoResult<()> {
        self.buffer.put_i64_le(value);
        Ok(())
    }

    /// Writes a Neo varint: `0x00..0xFC` as one byte, `0xFD` + u16,
    /// `0xFE` + u32, or `0xFF` + u64.
    pub fn write_var_int(&mut self, value: u64) -> IoResult<()> {
        if value < 0xfd {
            self.write_u8(value as u8)
        } else if value <= 0xffff {
            self.write_u8(0xfd)?;
            self.write_u16(value as u16)
        } else if value <= 0xffff_ffff {
            self.write_u8(0xfe)?;
            self.write_u32(value as u32)
        } else {
            self.write_u8(0xff)?;
            self.write_u64(value)
        }
    }

    pub fn write_bytes(&mut self, value: &[u8]) -> IoResult<()> {
        self.buffer.put_slice(value);
        Ok(())
    }

    pub fn write_var_bytes(&mut self, value: &[u8]) -> IoResult<()> {
        self.write_var_int(value.len() as u64)?;
        self.write_bytes(value)
    }

    pub fn write_var_string(&mut self, value: &str) -> IoResult<()> {
        self.write_var_bytes(value.as_bytes())
    }

    pub fn write_serializable<T: Serializable>(&mut self, value: &T) -> IoResult<()> {
        value.serialize(self)
    }

    pub fn write_serializable_list<T: Serializable>(&mut self, items: &[T]) -> IoResult<()> {
        self.write_var_int(items.len() as u64)?;
        for item in items {
            self.write_serializable(item)?;
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.buffer.to_vec()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for BinaryWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns the number of bytes a Neo varint for `value` occupies.
pub fn var_int_size(value: u64) -> usize {
    if value < 0xfd {
        1
    } else if value <= 0xffff {
        3
    } else if value <= 0xffff_ffff {
        5
    } else {
        9
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn var_int_boundaries() {
        let mut w = BinaryWriter::new();
        w.write_var_int(0xfc).unwrap();
        assert_eq!(w.len(), 1);

        let mut w = BinaryWriter::new();
        w.write_var_int(0xfd).unwrap();
        assert_eq!(w.to_bytes(), vec![0xfd, 0xfd, 0x00]);

        let mut w = BinaryWriter::new();
        w.write_var_int(0x1_0000).unwrap();
        assert_eq!(w.to_bytes()[0], 0xfe);
        assert_eq!(w.len(), 5);

        let mut w = BinaryWriter::new();
        w.write_var_int(0x1_0000_0000).unwrap();
        assert_eq!(w.to_bytes()[0], 0xff);
        assert_eq!(w.len(), 9);
    }
}
