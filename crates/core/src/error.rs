//! Error type for the Neo N3 data model.

use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid witness scope byte: 0x{0:02x}")]
    InvalidWitnessScope(u8),

    #[error("invalid witness rule action byte: 0x{0:02x}")]
    InvalidWitnessRuleAction(u8),

    #[error("invalid witness condition type: 0x{0:02x}")]
    InvalidWitnessConditionType(u8),

    #[error("witness condition nesting too deep (max {max})")]
    WitnessConditionTooDeep { max: usize },

    #[error("witness condition has too many sub-items: {actual} (max {max})")]
    TooManySubitems { actual: usize, max: usize },

    #[error("too many transaction attributes: {actual} (max {max})")]
    TooManyAttributes { actual: usize, max: usize },

    #[error("transaction exceeds maximum size: {actual} (max {max})")]
    TransactionTooLarge { actual: usize, max: usize },

    #[error("unknown transaction attribute usage: 0x{0:02x}")]
    UnknownAttributeType(u8),

    #[error("invalid NEF checksum")]
    InvalidNefChecksum,

    #[error(transparent)]
    Io(#[from] neo_io::IoError),
}
