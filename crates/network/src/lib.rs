//! P2P wire protocol, version handshake, and the header/block sync engine
//! (spec §4.7, §4.9): framing with LZ4 compression and a double-SHA256
//! checksum, the `version`/`verack` handshake, payload codecs for every
//! protocol command, and a `SyncEngine` that drives header-first then
//! windowed block-body synchronization across a pool of peers.

pub mod command;
pub mod error;
pub mod frame;
pub mod handshake;
pub mod payload;
pub mod pool;
pub mod rate_limiter;
pub mod sync;
pub mod transport;

pub use command::{InventoryType, MessageCommand};
pub use error::{NetworkError, NetworkResult};
pub use frame::{Frame, FrameFlags, FrameHeader, COMPRESSION_MIN_SIZE, FRAME_HEADER_SIZE, PAYLOAD_MAX_SIZE};
pub use handshake::{accept, dial, local_version_payload, HANDSHAKE_TIMEOUT};
pub use pool::{ConnectionPool, Connector, PoolConfig};
pub use rate_limiter::{ConnectionLimiter, GlobalRateLimiter, RateLimiter, RateLimiterConfig};
pub use sync::{SyncEngine, SyncState, MAX_CONCURRENT_DOWNLOADS, MAX_ORPHAN_POOL_SIZE};
pub use transport::{read_frame, write_frame};
