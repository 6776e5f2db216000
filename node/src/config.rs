//! TOML node configuration. Sections mirror the reference client's config
//! layout, trimmed to what the core consumes directly — no RPC, wallet,
//! consensus, or plugin sections, since those are external collaborators
//! per the core's spec.

use std::path::Path;

use neo_config::{ProtocolSettings, MAINNET_ADDRESS_VERSION, MAINNET_MAGIC, TESTNET_MAGIC};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct NodeConfig {
    pub network: NetworkSection,
    pub p2p: P2pSection,
    pub storage: StorageSection,
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NetworkSection {
    /// `"mainnet"`, `"testnet"`, or `"private"`; `magic` overrides it.
    pub network_type: Option<String>,
    pub magic: Option<u32>,
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self { network_type: None, magic: None }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct P2pSection {
    pub listen_port: u16,
    pub seed_nodes: Vec<String>,
    pub max_connections: usize,
    pub min_desired_connections: usize,
}

impl Default for P2pSection {
    fn default() -> Self {
        Self { listen_port: 10333, seed_nodes: Vec::new(), max_connections: 40, min_desired_connections: 10 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// `"memory"` or `"rocksdb"`.
    pub backend: String,
    pub path: Option<String>,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self { backend: "memory".to_string(), path: None }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self { level: "info".to_string() }
    }
}

impl NodeConfig {
    /// Loads `path` if present; returns defaults otherwise (a node should
    /// still start against MainNet with in-memory storage).
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    pub fn protocol_settings(&self) -> ProtocolSettings {
        let mut settings = match self.network.network_type.as_deref() {
            Some("testnet") => ProtocolSettings::testnet(),
            Some("private") => ProtocolSettings::private_net(),
            _ => ProtocolSettings::mainnet(),
        };
        if let Some(magic) = self.network.magic {
            settings.network = magic;
            settings.address_version = MAINNET_ADDRESS_VERSION;
        }
        if !self.p2p.seed_nodes.is_empty() {
            settings.seed_list = self.p2p.seed_nodes.clone();
        }
        settings
    }
}

/// The canonical magic for a named network, used to warn on a mismatched
/// override rather than to silently accept it.
pub fn infer_magic_from_type(network_type: &str) -> Option<u32> {
    match network_type {
        "mainnet" => Some(MAINNET_MAGIC),
        "testnet" => Some(TESTNET_MAGIC),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_start_on_mainnet_with_memory_storage() {
        let config = NodeConfig::default();
        assert_eq!(config.storage.backend, "memory");
        assert_eq!(config.protocol_settings().network, MAINNET_MAGIC);
    }

    #[test]
    fn missing_config_file_falls_back_to_defaults() {
        let config = NodeConfig::load(Path::new("/nonexistent/neo_node.toml")).unwrap();
        assert_eq!(config.p2p.listen_port, 10333);
    }

    #[test]
    fn explicit_magic_overrides_the_named_network() {
        let mut config = NodeConfig::default();
        config.network.magic = Some(0x12345678);
        assert_eq!(config.protocol_settings().network, 0x12345678);
    }
}
