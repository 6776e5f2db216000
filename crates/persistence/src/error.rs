//! Errors surfaced by the `Store`/`DataCache` layer.

use thiserror::Error;

pub type PersistenceResult<T> = Result<T, PersistenceError>;

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("key already exists and is not deleted")]
    KeyAlreadyExists,

    #[error("data cache already committed")]
    AlreadyCommitted,

    #[error("underlying store I/O error: {0}")]
    Io(String),
}
