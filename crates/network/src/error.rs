//! Errors surfaced by frame decoding, the handshake, and sync.

use thiserror::Error;

pub type NetworkResult<T> = Result<T, NetworkError>;

#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("frame magic {actual:#010x} does not match the configured network {expected:#010x}")]
    MagicMismatch { expected: u32, actual: u32 },

    #[error("frame payload of {actual} bytes exceeds the maximum of {max}")]
    PayloadTooLarge { actual: usize, max: usize },

    #[error("frame checksum mismatch")]
    BadChecksum,

    #[error("unknown message command byte {0:#04x}")]
    UnknownCommand(u8),

    #[error("peer sent {got} during the handshake, expected {expected}")]
    UnexpectedMessage { expected: &'static str, got: String },

    #[error("peer's protocol version {0} is not supported")]
    UnsupportedVersion(u32),

    #[error("handshake with {0} timed out")]
    HandshakeTimeout(std::net::SocketAddr),

    #[error("connection pool at peer {0} is already at capacity")]
    PoolFull(std::net::SocketAddr),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Codec(#[from] neo_io::IoError),

    #[error(transparent)]
    Ledger(#[from] neo_ledger::LedgerError),
}
