//! Configuration management for Spigot.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

use crate::chain::{Coin, Fee};

/// Main configuration for the faucet service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpigotConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Window store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Request verification configuration
    #[serde(default)]
    pub verify: VerifyConfig,

    /// Project presentation settings
    #[serde(default)]
    pub project: ProjectConfig,

    /// Supported chains
    #[serde(default)]
    pub chains: Vec<ChainProfile>,
}

impl Default for SpigotConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            store: StoreConfig::default(),
            verify: VerifyConfig::default(),
            project: ProjectConfig::default(),
            chains: Vec::new(),
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP listen address
    #[serde(default = "default_http_addr")]
    pub http_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
        }
    }
}

fn default_http_addr() -> SocketAddr {
    "127.0.0.1:8088".parse().unwrap()
}

/// Window store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Filesystem path of the durable grant-history database
    #[serde(default = "default_store_path")]
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

fn default_store_path() -> String {
    ".spigot/history.db".to_string()
}

/// Verification collaborator configuration.
///
/// Leaving a secret unset disables the corresponding check, which is the
/// expected mode for local development and tests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyConfig {
    /// reCAPTCHA server-side secret
    pub recaptcha_secret: Option<String>,

    /// Expected reCAPTCHA action name
    #[serde(default = "default_recaptcha_action")]
    pub recaptcha_action: String,

    /// Discord guild the requester must belong to
    pub discord_guild: Option<String>,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            recaptcha_secret: None,
            recaptcha_action: default_recaptcha_action(),
            discord_guild: None,
        }
    }
}

fn default_recaptcha_action() -> String {
    "token".to_string()
}

/// Project presentation settings surfaced on `/config.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Human-readable project name
    #[serde(default = "default_project_name")]
    pub name: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: default_project_name(),
        }
    }
}

fn default_project_name() -> String {
    "Spigot Faucet".to_string()
}

/// Per-chain profile. Immutable for the process lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainProfile {
    /// Chain name, used in routes and rate-limit keys
    pub name: String,

    /// Chain gateway endpoint for balance queries and transfer submission
    pub rpc_endpoint: String,

    /// Address prefix destination addresses must carry
    pub prefix: String,

    /// Hex-encoded signing secret the funding account is derived from
    pub signer_secret: String,

    /// Amount sent per granted request
    pub transfer_amount: Vec<Coin>,

    /// Fee attached to each transfer
    pub fee: Fee,

    /// Grants allowed per key class within the trailing window
    #[serde(default)]
    pub limits: Limits,

    /// Maximum seconds a request may wait for the chain's dispatch gate
    #[serde(default = "default_gate_wait_secs")]
    pub gate_wait_secs: u64,
}

fn default_gate_wait_secs() -> u64 {
    60
}

/// Grants allowed per key class within the trailing 24h window.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Limits {
    /// Per destination address
    #[serde(default = "default_address_limit")]
    pub address: u64,

    /// Per source IP
    #[serde(default = "default_ip_limit")]
    pub ip: u64,

    /// Per external identity
    #[serde(default = "default_identity_limit")]
    pub identity: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            address: default_address_limit(),
            ip: default_ip_limit(),
            identity: default_identity_limit(),
        }
    }
}

fn default_address_limit() -> u64 {
    1
}

fn default_ip_limit() -> u64 {
    5
}

fn default_identity_limit() -> u64 {
    1
}

impl SpigotConfig {
    /// Load configuration from a file path.
    pub fn from_file(path: &str) -> crate::error::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: SpigotConfig = serde_yaml::from_str(&contents)
            .map_err(|e| crate::error::SpigotError::Config(e.to_string()))?;
        Ok(config)
    }

    /// Get the profile for a specific chain.
    pub fn chain(&self, name: &str) -> Option<&ChainProfile> {
        self.chains.iter().find(|c| c.name == name)
    }
}
