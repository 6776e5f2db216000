//! Error type for BLS12-381 point and pairing operations.

use thiserror::Error;

pub type Bls12381Result<T> = Result<T, Bls12381Error>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Bls12381Error {
    #[error("invalid G1 point encoding: expected {expected} bytes, got {actual}")]
    InvalidG1Length { expected: usize, actual: usize },

    #[error("invalid G2 point encoding: expected {expected} bytes, got {actual}")]
    InvalidG2Length { expected: usize, actual: usize },

    #[error("invalid GT element encoding: expected {expected} bytes, got {actual}")]
    InvalidGtLength { expected: usize, actual: usize },

    #[error("point is not on the curve")]
    NotOnCurve,

    #[error("point is not in the correct subgroup")]
    NotInSubgroup,

    #[error("scalar encoding must be exactly 32 bytes, got {0}")]
    InvalidScalarLength(usize),

    #[error("pairing input list must not be empty")]
    EmptyPairingInput,
}
