//! Generic validated connection pool (spec §5 concurrency model): keeps at
//! least `min_idle` connections ready, never exceeds `max_total`, validates
//! a connection before handing it out, and a periodic maintenance tick
//! evicts anything that failed validation and tops the idle set back up.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{NetworkError, NetworkResult};

#[async_trait]
pub trait Connector<T>: Send + Sync {
    async fn connect(&self) -> NetworkResult<T>;
    async fn is_valid(&self, conn: &T) -> bool;
}

#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub min_idle: usize,
    pub max_total: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { min_idle: 2, max_total: 10 }
    }
}

/// A pool of interchangeable connections to a single logical target,
/// identified by `label` only for error reporting.
pub struct ConnectionPool<T, C: Connector<T>> {
    label: SocketAddr,
    connector: C,
    config: PoolConfig,
    idle: Mutex<VecDeque<T>>,
    total: AtomicUsize,
}

impl<T: Send + 'static, C: Connector<T>> ConnectionPool<T, C> {
    pub fn new(label: SocketAddr, connector: C, config: PoolConfig) -> Self {
        Self { label, connector, config, idle: Mutex::new(VecDeque::new()), total: AtomicUsize::new(0) }
    }

    pub fn idle_count(&self) -> usize {
        self.idle.lock().len()
    }

    pub fn total_count(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    /// Hands back a validated connection, creating one if the idle set is
    /// empty and the pool has not reached `max_total`.
    pub async fn acquire(&self) -> NetworkResult<T> {
        loop {
            let candidate = self.idle.lock().pop_front();
            match candidate {
                Some(conn) if self.connector.is_valid(&conn).await => return Ok(conn),
                Some(_) => {
                    self.total.fetch_sub(1, Ordering::SeqCst);
                    continue;
                }
                None => return self.create().await,
            }
        }
    }

    async fn create(&self) -> NetworkResult<T> {
        if self.total.load(Ordering::SeqCst) >= self.config.max_total {
            return Err(NetworkError::PoolFull(self.label));
        }
        let conn = self.connector.connect().await?;
        self.total.fetch_add(1, Ordering::SeqCst);
        Ok(conn)
    }

    /// Returns a connection to the idle set for reuse.
    pub fn release(&self, conn: T) {
        self.idle.lock().push_back(conn);
    }

    /// Evicts invalid idle connections, then dials fresh ones until
    /// `min_idle` is met or `max_total` is reached. Intended to run on a
    /// timer alongside the sync engine's own maintenance tasks.
    pub async fn maintain(&self) {
        let stale: Vec<T> = std::mem::take(&mut *self.idle.lock()).into_iter().collect();
        let mut still_idle = VecDeque::with_capacity(stale.len());
        for conn in stale {
            if self.connector.is_valid(&conn).await {
                still_idle.push_back(conn);
            } else {
                self.total.fetch_sub(1, Ordering::SeqCst);
            }
        }
        *self.idle.lock() = still_idle;

        while self.idle.lock().len() < self.config.min_idle {
            if self.total.load(Ordering::SeqCst) >= self.config.max_total {
                break;
            }
            match self.connector.connect().await {
                Ok(conn) => {
                    self.total.fetch_add(1, Ordering::SeqCst);
                    self.idle.lock().push_back(conn);
                }
                Err(_) => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    struct CountingConnector {
        dials: AtomicUsize,
        reject: AtomicBool,
    }

    #[async_trait]
    impl Connector<u32> for CountingConnector {
        async fn connect(&self) -> NetworkResult<u32> {
            Ok(self.dials.fetch_add(1, Ordering::SeqCst) as u32)
        }

        async fn is_valid(&self, _conn: &u32) -> bool {
            !self.reject.load(Ordering::SeqCst)
        }
    }

    fn addr() -> SocketAddr {
        "127.0.0.1:10333".parse().unwrap()
    }

    #[tokio::test]
    async fn acquire_creates_up_to_the_cap_then_fails() {
        let connector = CountingConnector { dials: AtomicUsize::new(0), reject: AtomicBool::new(false) };
        let pool = ConnectionPool::new(addr(), connector, PoolConfig { min_idle: 0, max_total: 2 });
        let a = pool.acquire().await.unwrap();
        let b = pool.acquire().await.unwrap();
        assert_ne!(a, b);
        assert!(matches!(pool.acquire().await, Err(NetworkError::PoolFull(_))));
    }

    #[tokio::test]
    async fn maintain_refills_to_min_idle() {
        let connector = CountingConnector { dials: AtomicUsize::new(0), reject: AtomicBool::new(false) };
        let pool = ConnectionPool::new(addr(), connector, PoolConfig { min_idle: 3, max_total: 5 });
        pool.maintain().await;
        assert_eq!(pool.idle_count(), 3);
        assert_eq!(pool.total_count(), 3);
    }

    #[tokio::test]
    async fn maintain_evicts_invalid_idle_connections() {
        let connector = CountingConnector { dials: AtomicUsize::new(0), reject: AtomicBool::new(false) };
        let pool = ConnectionPool::new(addr(), connector, PoolConfig { min_idle: 2, max_total: 5 });
        pool.maintain().await;
        assert_eq!(pool.idle_count(), 2);

        pool.connector.reject.store(true, Ordering::SeqCst);
        pool.maintain().await;
        assert_eq!(pool.idle_count(), 0);
        assert_eq!(pool.total_count(), 0);
    }
}
