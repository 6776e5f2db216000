//! Error types for binary (de)serialization.

use thiserror::Error;

/// Errors produced while reading or writing the Neo N3 wire format.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IoError {
    /// Not enough bytes remained in the source to satisfy the read.
    #[error("unexpected end of stream at offset {offset}: needed {needed} more byte(s) while reading {context}")]
    EndOfStream {
        offset: usize,
        needed: usize,
        context: &'static str,
    },

    /// A varint, collection length, or other bounded value exceeded its
    /// declared maximum.
    #[error("format error at offset {offset}: {reason}")]
    Format { offset: usize, reason: String },

    /// A string was not valid UTF-8.
    #[error("invalid utf-8 at offset {offset}")]
    InvalidUtf8 { offset: usize },
}

impl IoError {
    pub fn end_of_stream(offset: usize, needed: usize, context: &'static str) -> Self {
        Self::EndOfStream {
            offset,
            needed,
            context,
        }
    }

    pub fn format(offset: usize, reason: impl Into<String>) -> Self {
        Self::Format {
            offset,
            reason: reason.into(),
        }
    }
}

/// Result type used throughout the I/O crate and its dependents.
pub type IoResult<T> = std::result::Result<T, IoError>;
