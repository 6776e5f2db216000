//! Per-peer connection and message rate limiting (spec §5 resource
//! controls): a token bucket per peer, escalating to a timed ban after
//! repeated violations.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    pub max_requests_per_second: u32,
    pub burst_size: u32,
    pub penalty_duration: Duration,
    pub auto_ban_enabled: bool,
    pub violations_before_ban: u32,
    pub ban_duration: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            max_requests_per_second: 100,
            burst_size: 150,
            penalty_duration: Duration::from_secs(60),
            auto_ban_enabled: true,
            violations_before_ban: 5,
            ban_duration: Duration::from_secs(3600),
        }
    }
}

#[derive(Debug)]
struct PeerState {
    tokens: f64,
    last_update: Instant,
    violations: u32,
    penalty_until: Option<Instant>,
    total_requests: u64,
    denied_requests: u64,
}

impl PeerState {
    fn new(initial_tokens: f64) -> Self {
        Self {
            tokens: initial_tokens,
            last_update: Instant::now(),
            violations: 0,
            penalty_until: None,
            total_requests: 0,
            denied_requests: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PeerStats {
    pub total_requests: u64,
    pub denied_requests: u64,
    pub violations: u32,
    pub current_tokens: f64,
    pub is_penalized: bool,
}

pub struct RateLimiter {
    config: RateLimiterConfig,
    peers: RwLock<HashMap<SocketAddr, PeerState>>,
    banned_peers: RwLock<HashMap<SocketAddr, Instant>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_config(RateLimiterConfig::default())
    }

    pub fn with_config(config: RateLimiterConfig) -> Self {
        Self { config, peers: RwLock::new(HashMap::new()), banned_peers: RwLock::new(HashMap::new()) }
    }

    /// Consumes one token for `peer`, returning whether the request may
    /// proceed. Violations accumulate across the penalty window and trigger
    /// an auto-ban once `violations_before_ban` is reached.
    pub fn check_rate_limit(&self, peer: SocketAddr) -> bool {
        if self.is_banned(peer) {
            debug!(%peer, "peer is banned");
            return false;
        }

        let now = Instant::now();
        let mut peers = self.peers.write();
        let state = peers.entry(peer).or_insert_with(|| PeerState::new(self.config.burst_size as f64));
        state.total_requests += 1;

        if let Some(penalty_until) = state.penalty_until {
            if now < penalty_until {
                state.denied_requests += 1;
                return false;
            }
            state.penalty_until = None;
            state.tokens = self.config.burst_size as f64;
        }

        let elapsed = now.duration_since(state.last_update);
        let tokens_to_add = elapsed.as_secs_f64() * self.config.max_requests_per_second as f64;
        state.tokens = (state.tokens + tokens_to_add).min(self.config.burst_size as f64);
        state.last_update = now;

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            return true;
        }

        state.denied_requests += 1;
        state.violations += 1;
        state.penalty_until = Some(now + self.config.penalty_duration);
        let violations = state.violations;
        warn!(%peer, violations, denied = state.denied_requests, "rate limit exceeded");

        if self.config.auto_ban_enabled && violations >= self.config.violations_before_ban {
            drop(peers);
            self.ban_peer(peer, self.config.ban_duration);
        }

        false
    }

    pub fn ban_peer(&self, peer: SocketAddr, duration: Duration) {
        let ban_until = Instant::now() + duration;
        self.banned_peers.write().insert(peer, ban_until);
        warn!(%peer, ?duration, "peer banned");
    }

    pub fn is_banned(&self, peer: SocketAddr) -> bool {
        let mut banned = self.banned_peers.write();
        match banned.get(&peer) {
            Some(&until) if Instant::now() < until => true,
            Some(_) => {
                banned.remove(&peer);
                false
            }
            None => false,
        }
    }

    pub fn peer_stats(&self, peer: SocketAddr) -> Option<PeerStats> {
        self.peers.read().get(&peer).map(|state| PeerStats {
            total_requests: state.total_requests,
            denied_requests: state.denied_requests,
            violations: state.violations,
            current_tokens: state.tokens,
            is_penalized: state.penalty_until.is_some(),
        })
    }

    pub fn clear_peer(&self, peer: SocketAddr) {
        self.peers.write().remove(&peer);
        self.banned_peers.write().remove(&peer);
    }

    /// Drops bans that have expired and peers idle for over an hour.
    pub fn cleanup(&self) {
        let now = Instant::now();
        self.banned_peers.write().retain(|_, &mut until| now < until);
        let one_hour_ago = now - Duration::from_secs(3600);
        self.peers.write().retain(|_, state| state.last_update > one_hour_ago);
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

/// Separate buckets per operation category, so a burst of block requests
/// can't starve ordinary message handling.
pub struct GlobalRateLimiter {
    pub messages: RateLimiter,
    pub rpc: RateLimiter,
    pub blocks: RateLimiter,
    pub transactions: RateLimiter,
}

impl GlobalRateLimiter {
    pub fn new() -> Self {
        Self {
            messages: RateLimiter::with_config(RateLimiterConfig {
                max_requests_per_second: 200,
                burst_size: 300,
                ..Default::default()
            }),
            rpc: RateLimiter::with_config(RateLimiterConfig {
                max_requests_per_second: 50,
                burst_size: 75,
                ..Default::default()
            }),
            blocks: RateLimiter::with_config(RateLimiterConfig {
                max_requests_per_second: 10,
                burst_size: 20,
                ..Default::default()
            }),
            transactions: RateLimiter::with_config(RateLimiterConfig {
                max_requests_per_second: 100,
                burst_size: 150,
                ..Default::default()
            }),
        }
    }

    pub async fn run_cleanup_task(self: Arc<Self>) {
        let mut interval = tokio::time::interval(Duration::from_secs(300));
        loop {
            interval.tick().await;
            self.messages.cleanup();
            self.rpc.cleanup();
            self.blocks.cleanup();
            self.transactions.cleanup();
            debug!("rate limiter cleanup completed");
        }
    }
}

impl Default for GlobalRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

/// Caps simultaneous connections from a single IP address, independent of
/// the per-peer request rate above.
pub struct ConnectionLimiter {
    max_per_ip: usize,
    counts: RwLock<HashMap<std::net::IpAddr, usize>>,
}

impl ConnectionLimiter {
    pub fn new(max_per_ip: usize) -> Self {
        Self { max_per_ip, counts: RwLock::new(HashMap::new()) }
    }

    /// Attempts to reserve a connection slot for `ip`, returning `false`
    /// when the per-IP cap is already reached.
    pub fn try_acquire(&self, ip: std::net::IpAddr) -> bool {
        let mut counts = self.counts.write();
        let count = counts.entry(ip).or_insert(0);
        if *count >= self.max_per_ip {
            return false;
        }
        *count += 1;
        true
    }

    pub fn release(&self, ip: std::net::IpAddr) {
        let mut counts = self.counts.write();
        if let Some(count) = counts.get_mut(&ip) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                counts.remove(&ip);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    #[test]
    fn burst_is_allowed_then_denied() {
        let limiter = RateLimiter::with_config(RateLimiterConfig {
            max_requests_per_second: 10,
            burst_size: 15,
            ..Default::default()
        });
        for _ in 0..15 {
            assert!(limiter.check_rate_limit(peer()));
        }
        assert!(!limiter.check_rate_limit(peer()));
    }

    #[test]
    fn repeated_violations_trigger_an_auto_ban() {
        let limiter = RateLimiter::with_config(RateLimiterConfig {
            max_requests_per_second: 1,
            burst_size: 2,
            violations_before_ban: 3,
            ..Default::default()
        });
        assert!(limiter.check_rate_limit(peer()));
        assert!(limiter.check_rate_limit(peer()));
        for _ in 0..3 {
            assert!(!limiter.check_rate_limit(peer()));
        }
        assert!(limiter.is_banned(peer()));
    }

    #[test]
    fn connection_limiter_caps_per_ip() {
        let limiter = ConnectionLimiter::new(2);
        let ip: std::net::IpAddr = "127.0.0.1".parse().unwrap();
        assert!(limiter.try_acquire(ip));
        assert!(limiter.try_acquire(ip));
        assert!(!limiter.try_acquire(ip));
        limiter.release(ip);
        assert!(limiter.try_acquire(ip));
    }
}
