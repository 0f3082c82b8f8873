//! Configuration Management Module
//!
//! This module handles loading and managing configuration for the Nexus relay.
//! Configuration includes the chain registry (one entry per Nexus application),
//! the local application the relayer submits to, and RPC/submission timing.

use ethereum_types::H256;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use crate::error::RelayError;
use crate::types::{Address, AppId};

/// Environment variable overriding the config file location
pub const CONFIG_PATH_ENV: &str = "NEXUS_RELAY_CONFIG_PATH";

/// Config file location used when the environment variable is unset
pub const DEFAULT_CONFIG_PATH: &str = "config/nexus-relay.toml";

// ============================================================================
// CONFIGURATION STRUCTURES
// ============================================================================

/// Main configuration structure.
///
/// - `relay`: relayer identity and timing
/// - `chains`: every chain the relayer may read proofs from or submit to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub relay: RelaySettings,
    #[serde(default)]
    pub chains: Vec<ChainDescriptor>,
}

/// Per-chain descriptor keyed by Nexus application id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainDescriptor {
    /// Human-readable name for the chain
    pub name: String,
    /// Nexus application id (bytes32)
    pub app_id: AppId,
    /// JSON-RPC endpoint
    pub rpc_url: String,
    /// Mailbox contract address on this chain
    pub mailbox_addr: Address,
    /// EVM chain id used for EIP-155 signing
    pub chain_id: u64,
    /// Sibling-path length the destination verifier expects for proofs from this chain.
    /// Unset for chains whose proofs are variable length (zkSync compressed paths).
    #[serde(default)]
    pub proof_depth: Option<usize>,
}

/// Relayer settings.
///
/// The private key is never stored in the file. The config names the
/// environment variable that holds it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelaySettings {
    /// Application id of the chain this relayer submits `sendMessage` and `receiveMessage` to
    pub local_app_id: AppId,
    /// Environment variable name containing the secp256k1 private key (hex)
    /// Default: "NEXUS_RELAYER_PRIVATE_KEY"
    #[serde(default = "default_private_key_env")]
    pub private_key_env: String,
    /// Upper bound on any single JSON-RPC round trip in milliseconds
    #[serde(default = "default_rpc_timeout_ms")]
    pub rpc_timeout_ms: u64,
    /// Gas limit for mailbox transactions
    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,
    /// Delay between transaction receipt polls in milliseconds
    #[serde(default = "default_receipt_poll_interval_ms")]
    pub receipt_poll_interval_ms: u64,
    /// Number of receipt polls before giving up
    #[serde(default = "default_receipt_poll_attempts")]
    pub receipt_poll_attempts: u32,
}

fn default_private_key_env() -> String {
    "NEXUS_RELAYER_PRIVATE_KEY".to_string()
}

fn default_rpc_timeout_ms() -> u64 {
    15_000
}

fn default_gas_limit() -> u64 {
    2_000_000
}

fn default_receipt_poll_interval_ms() -> u64 {
    500
}

fn default_receipt_poll_attempts() -> u32 {
    30
}

impl RelaySettings {
    /// Loads the private key from the environment variable.
    ///
    /// # Returns
    ///
    /// * `Ok(String)` - The private key (hex encoded)
    /// * `Err(anyhow::Error)` - Failed to load from environment
    pub fn get_private_key(&self) -> anyhow::Result<String> {
        std::env::var(&self.private_key_env).map_err(|_| {
            anyhow::anyhow!(
                "Environment variable '{}' not set. Please set it with your secp256k1 private key (hex encoded).",
                self.private_key_env
            )
        })
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }

    pub fn receipt_poll_interval(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_interval_ms)
    }
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            local_app_id: H256::from_low_u64_be(1),
            private_key_env: default_private_key_env(),
            rpc_timeout_ms: default_rpc_timeout_ms(),
            gas_limit: default_gas_limit(),
            receipt_poll_interval_ms: default_receipt_poll_interval_ms(),
            receipt_poll_attempts: default_receipt_poll_attempts(),
        }
    }
}

// ============================================================================
// CHAIN REGISTRY
// ============================================================================

/// Read-only lookup of chain descriptors by application id.
#[derive(Debug, Clone, Default)]
pub struct ChainRegistry {
    chains: HashMap<AppId, ChainDescriptor>,
}

impl ChainRegistry {
    pub fn new(chains: impl IntoIterator<Item = ChainDescriptor>) -> Self {
        Self {
            chains: chains.into_iter().map(|c| (c.app_id, c)).collect(),
        }
    }

    /// Returns the descriptor for `app_id` or `RelayError::UnknownApp`.
    pub fn get(&self, app_id: &AppId) -> Result<&ChainDescriptor, RelayError> {
        self.chains
            .get(app_id)
            .ok_or(RelayError::UnknownApp(*app_id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChainDescriptor> {
        self.chains.values()
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }
}

// ============================================================================
// CONFIGURATION LOADING AND MANAGEMENT
// ============================================================================

impl Config {
    /// Validates the chain registry.
    ///
    /// This function ensures that:
    /// - Application ids and EVM chain ids are unique
    /// - Every RPC URL parses
    /// - The local application has a chain entry
    ///
    /// # Returns
    ///
    /// - `Ok(())` - Configuration is valid
    /// - `Err(anyhow::Error)` - First problem found
    pub fn validate(&self) -> anyhow::Result<()> {
        let mut app_ids = HashSet::new();
        let mut chain_ids = HashSet::new();

        for chain in &self.chains {
            if !app_ids.insert(chain.app_id) {
                return Err(anyhow::anyhow!(
                    "Configuration error: application id {:?} is configured more than once. Each chain must have a unique app_id.",
                    chain.app_id
                ));
            }
            if !chain_ids.insert(chain.chain_id) {
                return Err(anyhow::anyhow!(
                    "Configuration error: chain '{}' reuses chain ID {}. Each chain must have a unique chain ID.",
                    chain.name,
                    chain.chain_id
                ));
            }
            url::Url::parse(&chain.rpc_url).map_err(|e| {
                anyhow::anyhow!(
                    "Configuration error: chain '{}' has invalid rpc_url '{}': {}",
                    chain.name,
                    chain.rpc_url,
                    e
                )
            })?;
        }

        if !app_ids.contains(&self.relay.local_app_id) {
            return Err(anyhow::anyhow!(
                "Configuration error: local_app_id {:?} has no entry in [[chains]]",
                self.relay.local_app_id
            ));
        }

        Ok(())
    }

    /// Loads configuration from the TOML file.
    ///
    /// The path comes from `NEXUS_RELAY_CONFIG_PATH`, falling back to
    /// `config/nexus-relay.toml`. A missing file yields an error asking the user
    /// to copy the template.
    pub fn load() -> anyhow::Result<Self> {
        let config_path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from_path(&config_path)
    }

    /// Loads and validates configuration from an explicit path.
    pub fn load_from_path(config_path: &str) -> anyhow::Result<Self> {
        if std::path::Path::new(config_path).exists() {
            let content = std::fs::read_to_string(config_path)?;
            let config: Config = toml::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            Err(anyhow::anyhow!(
                "Configuration file '{}' not found. Please copy the template:\n\
                cp config/nexus-relay.template.toml config/nexus-relay.toml\n\
                Then edit config/nexus-relay.toml with your actual values.",
                config_path
            ))
        }
    }

    /// Builds the chain registry handed to the relay client.
    pub fn registry(&self) -> ChainRegistry {
        ChainRegistry::new(self.chains.iter().cloned())
    }
}

impl Default for Config {
    /// Single local chain with placeholder values, suitable for local development.
    fn default() -> Self {
        let relay = RelaySettings::default();
        Self {
            chains: vec![ChainDescriptor {
                name: "Local Chain".to_string(),
                app_id: relay.local_app_id,
                rpc_url: "http://127.0.0.1:3050".to_string(),
                mailbox_addr: Address::zero(),
                chain_id: 270,
                proof_depth: None,
            }],
            relay,
        }
    }
}
