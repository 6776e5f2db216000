//! Binary (de)serialization primitives for the Neo N3 wire format.
//!
//! Every protocol object — transactions, blocks, signers, witnesses, P2P
//! payloads — implements [`Serializable`] in terms of [`BinaryWriter`] and
//! [`MemoryReader`], which together give byte-exact control over integer
//! width, endianness, and the varint-prefixed collection encoding used
//! throughout Neo N3.

pub mod binary_writer;
pub mod error;
pub mod memory_reader;
pub mod serializable;

pub use binary_writer::{var_int_size, BinaryWriter};
pub use error::{IoError, IoResult};
pub use memory_reader::{MemoryReader, DEFAULT_MAX_ARRAY_SIZE};
pub use serializable::Serializable;
