//! VM stack item types (spec §3.5). Primitive variants (`Null`, `Boolean`,
//! `Integer`, `ByteString`) are plain values; compound variants (`Buffer`,
//! `Array`, `Struct`, `Map`) hold a [`Handle`] into the owning
//! [`ReferenceCounter`]'s arena.

use crate::error::{VmError, VmResult};
use crate::reference_counter::Handle;
use crate::script::Script;
use num_bigint::BigInt;
use num_traits::{ToPrimitive, Zero};
use std::sync::Arc;

pub const MAX_ITEM_SIZE: usize = 1024 * 1024;
/// Two's-complement integers carry at most this many payload bytes.
pub const MAX_INTEGER_BYTES: usize = 32;

#[derive(Debug, Clone)]
pub enum StackItem {
    Null,
    Boolean(bool),
    Integer(BigInt),
    /// Immutable byte string.
    ByteString(Arc<[u8]>),
    /// Mutable byte buffer, heap-allocated in the `ReferenceCounter` arena.
    Buffer(Handle),
    Array(Handle),
    Struct(Handle),
    Map(Handle),
    Pointer { script: Script, offset: usize },
    InteropInterface(Arc<dyn std::any::Any + Send + Sync>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackItemType {
    Any = 0x00,
    Pointer = 0x10,
    Boolean = 0x20,
    Integer = 0x21,
    ByteString = 0x28,
    Buffer = 0x30,
    Array = 0x40,
    Struct = 0x41,
    Map = 0x48,
    InteropInterface = 0x60,
}

/// The payload a compound [`Handle`] resolves to in the arena.
#[derive(Debug, Clone)]
pub enum CompoundData {
    Buffer(Vec<u8>),
    Array(Vec<StackItem>),
    Struct(Vec<StackItem>),
    Map(Vec<(StackItem, StackItem)>),
}

impl CompoundData {
    /// Handles of every compound child, for the reference counter's
    /// reachability walk. `Map` keys are always primitives in a
    /// well-formed VM (compound keys are rejected at `SETITEM`), so only
    /// values are walked.
    pub fn child_handles(&self) -> Vec<Handle> {
        let mut out = Vec::new();
        let items: Box<dyn Iterator<Item = &StackItem>> = match self {
            CompoundData::Buffer(_) => return out,
            CompoundData::Array(v) | CompoundData::Struct(v) => Box::new(v.iter()),
            CompoundData::Map(m) => Box::new(m.iter().map(|(_, v)| v)),
        };
        for item in items {
            if let Some(h) = item.compound_handle() {
                out.push(h);
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        match self {
            CompoundData::Buffer(b) => b.len(),
            CompoundData::Array(v) | CompoundData::Struct(v) => v.len(),
            CompoundData::Map(m) => m.len(),
        }
    }
}

impl StackItem {
    pub fn from_bool(b: bool) -> Self {
        StackItem::Boolean(b)
    }

    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>) -> Self {
        StackItem::ByteString(bytes.into())
    }

    pub fn compound_handle(&self) -> Option<Handle> {
        match self {
            StackItem::Buffer(h) | StackItem::Array(h) | StackItem::Struct(h) | StackItem::Map(h) => {
                Some(*h)
            }
            _ => None,
        }
    }

    pub fn type_of(&self) -> StackItemType {
        match self {
            StackItem::Null => StackItemType::Any,
            StackItem::Boolean(_) => StackItemType::Boolean,
            StackItem::Integer(_) => StackItemType::Integer,
            StackItem::ByteString(_) => StackItemType::ByteString,
            StackItem::Buffer(_) => StackItemType::Buffer,
            StackItem::Array(_) => StackItemType::Array,
            StackItem::Struct(_) => StackItemType::Struct,
            StackItem::Map(_) => StackItemType::Map,
            StackItem::Pointer { .. } => StackItemType::Pointer,
            StackItem::InteropInterface(_) => StackItemType::InteropInterface,
        }
    }

    /// Truthiness per the VM's `CONVERT`-to-`Boolean` rule: `Null` and
    /// `Integer(0)` are false; empty byte strings/buffers are false.
    pub fn as_bool(&self, rc: &crate::reference_counter::ReferenceCounter) -> bool {
        match self {
            StackItem::Null => false,
            StackItem::Boolean(b) => *b,
            StackItem::Integer(i) => !i.is_zero(),
            StackItem::ByteString(b) => b.iter().any(|&x| x != 0),
            StackItem::Buffer(h) => match rc.data(*h) {
                CompoundData::Buffer(b) => b.iter().any(|&x| x != 0),
                _ => true,
            },
            _ => true,
        }
    }

    pub fn as_int(&self) -> VmResult<BigInt> {
        match self {
            StackItem::Integer(i) => Ok(i.clone()),
            StackItem::Boolean(b) => Ok(BigInt::from(*b as i64)),
            StackItem::ByteString(b) => Ok(bytes_to_bigint(b)),
            _ => Err(VmError::InvalidOperation("expected an integer-convertible item".into())),
        }
    }

    pub fn as_bytes(&self, rc: &crate::reference_counter::ReferenceCounter) -> VmResult<Vec<u8>> {
        match self {
            StackItem::ByteString(b) => Ok(b.to_vec()),
            StackItem::Buffer(h) => match rc.data(*h) {
                CompoundData::Buffer(b) => Ok(b.clone()),
                _ => Err(VmError::InvalidOperation("handle is not a buffer".into())),
            },
            StackItem::Integer(i) => Ok(bigint_to_bytes(i)),
            StackItem::Boolean(b) => Ok(vec![*b as u8]),
            _ => Err(VmError::InvalidOperation("item is not byte-convertible".into())),
        }
    }
}

/// Minimal little-endian two's-complement decode (spec §3.3): empty slice
/// is zero.
pub fn bytes_to_bigint(bytes: &[u8]) -> BigInt {
    if bytes.is_empty() {
        return BigInt::zero();
    }
    BigInt::from_signed_bytes_le(bytes)
}

/// Minimal little-endian two's-complement encode; zero encodes as the
/// empty buffer.
pub fn bigint_to_bytes(value: &BigInt) -> Vec<u8> {
    if value.is_zero() {
        return Vec::new();
    }
    value.to_signed_bytes_le()
}

pub fn bigint_fits_vm_integer(value: &BigInt) -> bool {
    bigint_to_bytes(value).len() <= MAX_INTEGER_BYTES
}

pub fn bigint_to_i64_checked(value: &BigInt) -> VmResult<i64> {
    value
        .to_i64()
        .ok_or_else(|| VmError::InvalidOperation("integer does not fit in i64".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_bytes_decode_to_zero() {
        assert_eq!(bytes_to_bigint(&[]), BigInt::zero());
    }

    #[test]
    fn zero_encodes_to_empty_bytes() {
        assert_eq!(bigint_to_bytes(&BigInt::zero()), Vec::<u8>::new());
    }

    #[test]
    fn round_trips_negative_numbers() {
        let v = BigInt::from(-42);
        assert_eq!(bytes_to_bigint(&bigint_to_bytes(&v)), v);
    }
}
