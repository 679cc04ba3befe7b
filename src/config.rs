//! Configuration management for bundchain

use crate::error::ChainError;
use crate::mempool::selector;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub state: StateSettings,
    #[serde(default)]
    pub worker: WorkerSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_public_addr")]
    pub public_addr: String,
    #[serde(default = "default_private_addr")]
    pub private_addr: String,
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StateSettings {
    /// Hex secret key file of the account credited for mined blocks.
    #[serde(default = "default_beneficiary_key")]
    pub beneficiary_key: String,
    #[serde(default = "default_db_path")]
    pub db_path: String,
    #[serde(default = "default_genesis_path")]
    pub genesis_path: String,
    #[serde(default = "default_select_strategy")]
    pub select_strategy: String,
    #[serde(default = "default_origin_peers")]
    pub origin_peers: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkerSettings {
    #[serde(default = "default_peer_update_interval")]
    pub peer_update_interval_secs: u64,
    #[serde(default = "default_mining_interval")]
    pub mining_interval_secs: u64,
    #[serde(default = "default_tx_share_capacity")]
    pub tx_share_capacity: usize,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            public_addr: default_public_addr(),
            private_addr: default_private_addr(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

impl Default for StateSettings {
    fn default() -> Self {
        Self {
            beneficiary_key: default_beneficiary_key(),
            db_path: default_db_path(),
            genesis_path: default_genesis_path(),
            select_strategy: default_select_strategy(),
            origin_peers: default_origin_peers(),
        }
    }
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            peer_update_interval_secs: default_peer_update_interval(),
            mining_interval_secs: default_mining_interval(),
            tx_share_capacity: default_tx_share_capacity(),
        }
    }
}

impl WebConfig {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

impl From<&WorkerSettings> for crate::worker::WorkerConfig {
    fn from(settings: &WorkerSettings) -> Self {
        crate::worker::WorkerConfig {
            peer_update_interval: Duration::from_secs(settings.peer_update_interval_secs),
            mining_interval: Duration::from_secs(settings.mining_interval_secs),
            tx_share_capacity: settings.tx_share_capacity,
        }
    }
}

impl Config {
    pub fn from_toml(contents: &str) -> Result<Self, ChainError> {
        let config: Config = toml::from_str(contents)
            .map_err(|e| ChainError::ConfigError(format!("invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ChainError> {
        if self.state.db_path.is_empty() {
            return Err(ChainError::ConfigError("state.db_path must be set".to_string()));
        }

        if self.state.beneficiary_key.is_empty() {
            return Err(ChainError::ConfigError(
                "state.beneficiary_key must be set".to_string(),
            ));
        }

        selector::retrieve(&self.state.select_strategy)?;

        if self.worker.peer_update_interval_secs == 0 || self.worker.mining_interval_secs == 0 {
            return Err(ChainError::ConfigError(
                "worker intervals must be at least one second".to_string(),
            ));
        }

        Ok(())
    }
}

/// Reads `path`, falling back to defaults when the file does not exist.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ChainError> {
    let path = path.as_ref();
    if !path.exists() {
        let config = Config::default();
        config.validate()?;
        return Ok(config);
    }

    let contents = fs::read_to_string(path)
        .map_err(|e| ChainError::ConfigError(format!("unable to read {}: {}", path.display(), e)))?;
    Config::from_toml(&contents)
}

fn default_public_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_private_addr() -> String {
    "0.0.0.0:9080".to_string()
}

fn default_shutdown_timeout() -> u64 {
    20
}

fn default_beneficiary_key() -> String {
    "zblock/accounts/miner1.key".to_string()
}

fn default_db_path() -> String {
    "zblock/miner1.db".to_string()
}

fn default_genesis_path() -> String {
    "zblock/genesis.json".to_string()
}

fn default_select_strategy() -> String {
    selector::STRATEGY_TIP.to_string()
}

fn default_origin_peers() -> Vec<String> {
    vec!["0.0.0.0:9080".to_string()]
}

fn default_peer_update_interval() -> u64 {
    10
}

fn default_mining_interval() -> u64 {
    5
}

fn default_tx_share_capacity() -> usize {
    100
}
