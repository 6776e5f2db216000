//! Errors surfaced by block/transaction verification and persistence.

use thiserror::Error;

pub type LedgerResult<T> = Result<T, LedgerError>;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("block index {actual} does not follow tip index {expected}")]
    OutOfOrder { expected: u32, actual: u32 },

    #[error("block previous hash does not match the current tip")]
    PreviousHashMismatch,

    #[error("block timestamp {actual} does not exceed parent timestamp {parent}")]
    TimestampNotIncreasing { parent: u64, actual: u64 },

    #[error("block witness failed verification")]
    InvalidBlockWitness,

    #[error("block merkle root does not match its transactions")]
    InvalidMerkleRoot,

    #[error("block carries {actual} transactions, over the limit of {max}")]
    TooManyTransactions { actual: usize, max: usize },

    #[error("block's total system fee {actual} exceeds the budget of {max}")]
    SystemFeeExceedsBudget { actual: i64, max: i64 },

    #[error("transaction {0} failed witness or policy verification")]
    InvalidTransaction(neo_core::UInt256),

    #[error("block already persisted at index {0}")]
    AlreadyPersisted(u32),

    #[error("unknown block or transaction")]
    NotFound,

    #[error("import stream entry exceeds the maximum block size")]
    ImportRecordTooLarge,

    #[error(transparent)]
    Core(#[from] neo_core::CoreError),

    #[error(transparent)]
    Io(#[from] neo_io::IoError),

    #[error(transparent)]
    Persistence(#[from] neo_persistence::PersistenceError),

    #[error(transparent)]
    Contract(#[from] neo_smart_contract::ScError),

    #[error("zip archive error: {0}")]
    Zip(String),
}
