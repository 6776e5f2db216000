//! VM error type. Most execution errors become a `Fault` state inside the
//! engine rather than a Rust `Err` — this type covers the errors that can
//! occur before or outside of a running script (load-time validation,
//! syscall registration).

use thiserror::Error;

pub type VmResult<T> = Result<T, VmError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VmError {
    #[error("invalid jump target: offset {0} is not a valid instruction boundary")]
    InvalidJumpTarget(i32),

    #[error("instruction pointer {0} is out of script bounds (length {1})")]
    InstructionPointerOutOfBounds(usize, usize),

    #[error("script exceeds maximum length: {actual} (max {max})")]
    ScriptTooLong { actual: usize, max: usize },

    #[error("unknown opcode: 0x{0:02x}")]
    UnknownOpCode(u8),

    #[error("truncated instruction operand at offset {0}")]
    TruncatedOperand(usize),

    #[error("invocation stack overflow: max depth {0}")]
    InvocationStackOverflow(usize),

    #[error("evaluation stack overflow: max size {0}")]
    EvaluationStackOverflow(usize),

    #[error("stack item exceeds maximum size: {actual} (max {max})")]
    ItemTooLarge { actual: usize, max: usize },

    #[error("array/struct/map exceeds maximum size: {actual} (max {max})")]
    ArrayTooLarge { actual: usize, max: usize },

    #[error("syscall not registered: 0x{0:08x}")]
    UnknownSyscall(u32),

    #[error("insufficient call flags: required {required:?}, have {actual:?}")]
    InsufficientCallFlags { required: String, actual: String },

    #[error("gas limit exceeded: consumed {consumed}, limit {limit}")]
    GasLimitExceeded { consumed: i64, limit: i64 },

    #[error("no execution context loaded")]
    NoContext,

    #[error("{0}")]
    InvalidOperation(String),
}
