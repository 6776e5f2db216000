//! Neo N3 node daemon: wires storage, the ledger, the mempool, and the P2P
//! sync engine into a running process (spec §1's "core"; RPC, wallets, and
//! consensus voting are external collaborators this binary doesn't host).
//!
//! Usage: `neo-node [config.toml]` — defaults to `neo_node.toml` in the
//! current directory, or an in-memory MainNet node if that file is absent.

mod config;
mod context;
mod peer;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use config::NodeConfig;
use context::NodeContext;
use neo_ledger::{Blockchain, ChainStore};
use neo_persistence::MemoryStore;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from).unwrap_or_else(|| PathBuf::from("neo_node.toml"));
    let node_config = NodeConfig::load(&config_path)?;
    init_tracing(&node_config.logging.level);

    let settings = node_config.protocol_settings();
    if let Some(canonical) =
        node_config.network.network_type.as_deref().and_then(config::infer_magic_from_type)
    {
        if canonical != settings.network {
            warn!(configured = format_args!("{:#010x}", settings.network), canonical = format_args!("{:#010x}", canonical), "network type and magic disagree");
        }
    }

    let store = open_store(&node_config)?;
    let blockchain = Arc::new(Blockchain::open(store, settings.clone()).context("opening blockchain store")?);
    info!(network = format_args!("{:#010x}", settings.network), height = blockchain.height(), hash = %blockchain.current_hash(), "blockchain opened");

    let ctx = Arc::new(NodeContext::new(settings.clone(), blockchain));

    let mut tasks = Vec::new();
    tasks.push(tokio::spawn(reverify_task(ctx.clone())));
    tasks.push(tokio::spawn(listener_task(ctx.clone(), node_config.p2p.listen_port)));
    for seed in &settings.seed_list {
        if let Some(addr) = parse_seed(seed) {
            tasks.push(tokio::spawn(dialer_task(ctx.clone(), addr)));
        }
    }

    info!(listen_port = node_config.p2p.listen_port, peers = settings.seed_list.len(), "neo-node started; press Ctrl+C to stop");
    if let Err(err) = signal::ctrl_c().await {
        error!(error = %err, "failed to wait for shutdown signal");
    } else {
        info!("shutdown signal received");
    }

    for task in tasks {
        task.abort();
    }
    info!(height = ctx.height(), hash = %ctx.best_hash(), "shutdown complete");
    Ok(())
}

fn open_store(config: &NodeConfig) -> Result<ChainStore> {
    match config.storage.backend.as_str() {
        "memory" | "" => {
            let store: ChainStore = Arc::new(MemoryStore::new());
            Ok(store)
        }
        "rocksdb" => {
            let path = config.storage.path.as_deref().context("rocksdb backend requires storage.path")?;
            let store: ChainStore = Arc::new(neo_persistence::RocksDbStore::open(path)?);
            Ok(store)
        }
        other => anyhow::bail!("unsupported storage backend '{other}'"),
    }
}

fn parse_seed(seed: &str) -> Option<std::net::SocketAddr> {
    use std::net::ToSocketAddrs;
    seed.to_socket_addrs().ok()?.next()
}

async fn reverify_task(ctx: Arc<NodeContext>) {
    let mut tick = tokio::time::interval(Duration::from_secs(5));
    loop {
        tick.tick().await;
        let (promoted, dropped) = ctx.mempool.reverify(ctx.verifier());
        if promoted + dropped > 0 {
            info!(promoted, dropped, "mempool reverification tick");
        }
        ctx.mempool.remove_expired(ctx.height());
    }
}

async fn listener_task(ctx: Arc<NodeContext>, port: u16) {
    let listener = match TcpListener::bind(("0.0.0.0", port)).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(port, error = %err, "failed to bind P2P listener");
            return;
        }
    };
    info!(port, "listening for inbound peers");
    loop {
        let (stream, addr) = match listener.accept().await {
            Ok(pair) => pair,
            Err(err) => {
                warn!(error = %err, "failed to accept inbound connection");
                continue;
            }
        };
        if !ctx.connection_limiter.try_acquire(addr.ip()) {
            warn!(peer = %addr, "rejecting inbound connection: per-IP connection cap reached");
            continue;
        }
        let ctx = ctx.clone();
        tokio::spawn(async move {
            if let Err(err) = peer::run(stream, addr, false, ctx.clone()).await {
                warn!(peer = %addr, error = %err, "inbound peer connection ended");
            }
            ctx.connection_limiter.release(addr.ip());
        });
    }
}

async fn dialer_task(ctx: Arc<NodeContext>, addr: std::net::SocketAddr) {
    loop {
        match tokio::net::TcpStream::connect(addr).await {
            Ok(stream) => {
                if let Err(err) = peer::run(stream, addr, true, ctx.clone()).await {
                    warn!(peer = %addr, error = %err, "outbound peer connection ended");
                }
            }
            Err(err) => {
                warn!(peer = %addr, error = %err, "failed to connect to seed");
            }
        }
        tokio::time::sleep(Duration::from_secs(10)).await;
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(format!("{level},neo={level}")));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
