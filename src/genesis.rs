//! Genesis settings: chain parameters and the opening balances

use crate::error::ChainError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genesis {
    pub date: String,
    pub chain_id: u16,
    /// Maximum number of transactions that go into a block.
    pub trans_per_block: usize,
    pub difficulty: u32,
    pub mining_reward: u64,
    pub gas_price: u64,
    /// Account id (as written in the file) to opening balance.
    pub balances: BTreeMap<String, u64>,
}

impl Genesis {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ChainError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ChainError::ConfigError(format!("unable to read genesis {}: {}", path.display(), e))
        })?;
        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<Self, ChainError> {
        let genesis: Genesis = serde_json::from_str(contents)
            .map_err(|e| ChainError::ConfigError(format!("invalid genesis: {}", e)))?;

        if genesis.trans_per_block == 0 {
            return Err(ChainError::ConfigError(
                "genesis trans_per_block must be greater than zero".to_string(),
            ));
        }
        if genesis.difficulty > 256 {
            return Err(ChainError::ConfigError(format!(
                "genesis difficulty {} exceeds 256 bits",
                genesis.difficulty
            )));
        }

        Ok(genesis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GENESIS: &str = r#"{
        "date": "2024-01-01T00:00:00.000000000Z",
        "chain_id": 1,
        "trans_per_block": 10,
        "difficulty": 6,
        "mining_reward": 700,
        "gas_price": 15,
        "balances": {
            "0xf01813e4b85e178a83e29b8e7bf26bd830a25f32": 1000000,
            "0xbee6ace826ec3de1b6349888b9151b92522f7f76": 1000000
        }
    }"#;

    #[test]
    fn test_parse_genesis() {
        let genesis = Genesis::from_json(GENESIS).unwrap();
        assert_eq!(genesis.chain_id, 1);
        assert_eq!(genesis.trans_per_block, 10);
        assert_eq!(genesis.balances.len(), 2);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let bad = GENESIS.replace("\"trans_per_block\": 10", "\"trans_per_block\": 0");
        assert!(matches!(
            Genesis::from_json(&bad),
            Err(ChainError::ConfigError(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("genesis.json");
        std::fs::write(&path, GENESIS).unwrap();
        assert_eq!(Genesis::load(&path).unwrap().mining_reward, 700);
        assert!(Genesis::load(dir.path().join("missing.json")).is_err());
    }
}
