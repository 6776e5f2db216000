//! One task per P2P connection (spec §4.7/§4.9): runs the handshake, then
//! loops reading frames and feeding them to the shared [`NodeContext`],
//! issuing the next `getheaders`/`getblockbyindex` request whenever this
//! connection is dialed to the best-known peer.

use std::net::SocketAddr;
use std::sync::Arc;

use neo_io::Serializable;
use neo_network::payload::{BlockPayload, HeadersPayload, IndexedRangePayload, PingPayload, TransactionPayload};
use neo_network::sync::SyncState;
use neo_network::{
    accept, dial, local_version_payload, read_frame, write_frame, Frame, MessageCommand, NetworkError,
    NetworkResult,
};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use crate::context::NodeContext;

const HEADERS_BATCH: i16 = 2_000;
const BLOCKS_BATCH: i16 = 100;

pub async fn run<S: AsyncRead + AsyncWrite + Unpin>(
    mut stream: S,
    peer_addr: SocketAddr,
    outbound: bool,
    ctx: Arc<NodeContext>,
) -> NetworkResult<()> {
    let magic = ctx.settings.network;
    let local = local_version_payload(magic, ctx.nonce, user_agent(), ctx.height());

    let peer_version = if outbound {
        dial(&mut stream, magic, &local, peer_addr).await?
    } else {
        accept(&mut stream, magic, &local, peer_addr).await?
    };
    info!(peer = %peer_addr, height = peer_version.start_height, "peer handshake complete");

    {
        let mut sync = ctx.sync.lock().unwrap();
        sync.on_peer_height(peer_addr, peer_version.start_height);
    }
    request_next_step(&mut stream, magic, peer_addr, &ctx).await?;

    loop {
        let frame = match read_frame(&mut stream, magic).await {
            Ok(frame) => frame,
            Err(NetworkError::Io(_)) => break,
            Err(err) => {
                warn!(peer = %peer_addr, error = %err, "dropping peer after a framing error");
                break;
            }
        };
        if ctx.rate_limiter.messages.is_banned(peer_addr) {
            warn!(peer = %peer_addr, "dropping peer: currently banned for rate-limit violations");
            break;
        }
        if !ctx.rate_limiter.messages.check_rate_limit(peer_addr) {
            debug!(peer = %peer_addr, "dropping a message over the per-peer rate limit");
            continue;
        }
        handle_frame(&mut stream, magic, peer_addr, &ctx, frame).await?;
        request_next_step(&mut stream, magic, peer_addr, &ctx).await?;
    }

    ctx.sync.lock().unwrap().cancel_peer(&peer_addr);
    ctx.rate_limiter.messages.clear_peer(peer_addr);
    Ok(())
}

async fn handle_frame<S: AsyncRead + AsyncWrite + Unpin>(
    stream: &mut S,
    magic: u32,
    peer_addr: SocketAddr,
    ctx: &Arc<NodeContext>,
    frame: Frame,
) -> NetworkResult<()> {
    match frame.command {
        MessageCommand::Ping => {
            let ping = PingPayload::from_bytes(&frame.payload).map_err(NetworkError::Codec)?;
            ctx.sync.lock().unwrap().on_peer_height(peer_addr, ping.last_block_index);
            let pong = PingPayload { last_block_index: ctx.height(), timestamp: ping.timestamp, nonce: ping.nonce };
            write_frame(stream, magic, &Frame::new(MessageCommand::Pong, pong.to_bytes())).await?;
        }
        MessageCommand::Pong => {
            let pong = PingPayload::from_bytes(&frame.payload).map_err(NetworkError::Codec)?;
            ctx.sync.lock().unwrap().on_peer_height(peer_addr, pong.last_block_index);
        }
        MessageCommand::Headers => {
            let payload = HeadersPayload::from_bytes(&frame.payload).map_err(NetworkError::Codec)?;
            let accepted = {
                let mut sync = ctx.sync.lock().unwrap();
                sync.ingest_headers(payload.headers, ctx.best_hash())
            };
            if !accepted {
                warn!(peer = %peer_addr, "peer sent a header batch that doesn't chain onto our tip");
            }
        }
        MessageCommand::Block => {
            let payload = BlockPayload::from_bytes(&frame.payload).map_err(NetworkError::Codec)?;
            let ready = ctx.sync.lock().unwrap().on_block(payload.block);
            for block in ready {
                let hashes: Vec<_> = block.transactions.iter().map(|tx| tx.hash()).collect();
                match ctx.blockchain.persist_block(block) {
                    Ok(()) => ctx.mempool.remove_confirmed(&hashes),
                    Err(err) => warn!(peer = %peer_addr, error = %err, "rejected block from peer"),
                }
            }
        }
        MessageCommand::Transaction => {
            let payload = TransactionPayload::from_bytes(&frame.payload).map_err(NetworkError::Codec)?;
            ctx.mempool.try_add(payload.transaction, ctx.verifier());
        }
        _ => debug!(peer = %peer_addr, command = ?frame.command, "ignoring unhandled message"),
    }
    Ok(())
}

/// Drives the sync state machine forward on this connection when it is
/// dialed to the best-known peer: requests the next header batch while
/// `SyncingHeaders`, or the next windowed block batch while
/// `SyncingBlocks` and spare download capacity remains.
async fn request_next_step<S: AsyncWrite + Unpin>(
    stream: &mut S,
    magic: u32,
    peer_addr: SocketAddr,
    ctx: &Arc<NodeContext>,
) -> NetworkResult<()> {
    let (state, is_best, next_index, capacity) = {
        let sync = ctx.sync.lock().unwrap();
        (sync.state(), sync.best_peer() == Some(peer_addr), sync.next_headers_request(), sync.block_download_capacity())
    };
    if !is_best {
        return Ok(());
    }
    match state {
        SyncState::SyncingHeaders => {
            let payload = IndexedRangePayload { index_start: next_index, count: HEADERS_BATCH };
            write_frame(stream, magic, &Frame::new(MessageCommand::GetHeaders, payload.to_bytes())).await?;
        }
        SyncState::SyncingBlocks if capacity > 0 => {
            let start = ctx.blockchain.height() + 1;
            let payload = IndexedRangePayload { index_start: start, count: BLOCKS_BATCH.min(capacity as i16) };
            ctx.sync.lock().unwrap().begin_block_download();
            write_frame(stream, magic, &Frame::new(MessageCommand::GetBlockByIndex, payload.to_bytes())).await?;
        }
        _ => {}
    }
    Ok(())
}

fn user_agent() -> String {
    format!("/neo-node-rs:{}/", env!("CARGO_PKG_VERSION"))
}
