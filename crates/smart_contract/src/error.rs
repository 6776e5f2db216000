//! Errors surfaced by the application engine, NEF/manifest loading, and
//! native contracts.

use thiserror::Error;

pub type ScResult<T> = Result<T, ScError>;

#[derive(Error, Debug)]
pub enum ScError {
    #[error("vm fault: {0}")]
    VmFault(String),

    #[error("invalid NEF file: {0}")]
    InvalidNef(String),

    #[error("invalid contract manifest: {0}")]
    InvalidManifest(String),

    #[error("native contract {0} has no method {1}")]
    UnknownNativeMethod(&'static str, String),

    #[error("contract not found: {0}")]
    ContractNotFound(String),

    #[error("contract already deployed at this hash")]
    ContractAlreadyExists,

    #[error("insufficient call flags for this operation")]
    InsufficientCallFlags,

    #[error("witness check failed")]
    WitnessCheckFailed,

    #[error(transparent)]
    Io(#[from] neo_io::IoError),

    #[error(transparent)]
    Persistence(#[from] neo_persistence::PersistenceError),

    #[error("{0}")]
    Other(String),
}
