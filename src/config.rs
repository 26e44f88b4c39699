use std::fs;
use std::path::Path;

use alloy_primitives::B256;
use serde::{Deserialize, Serialize};

use crate::errors::{EngineError, EngineResult};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChainConfig {
    pub chain_id: u64,
    #[serde(default = "default_maximum_extra_data_size")]
    pub maximum_extra_data_size: usize,
    #[serde(default = "default_min_gas_limit")]
    pub min_gas_limit: u64,
    #[serde(default = "default_gas_limit_bound_divisor")]
    pub gas_limit_bound_divisor: u64,
    #[serde(default = "default_target_block_gap")]
    pub target_block_gap: u64,
    #[serde(default = "default_target_period_blocks")]
    pub target_period_blocks: u64,
    #[serde(default = "default_allowed_future_gap")]
    pub allowed_future_gap: u64,
    #[serde(default)]
    pub eip158_block: u64,
    #[serde(default)]
    pub fork_hashes: Vec<ForkHash>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ForkHash {
    pub number: u64,
    pub hash: B256,
}

fn default_maximum_extra_data_size() -> usize {
    32
}

fn default_min_gas_limit() -> u64 {
    5_000
}

fn default_gas_limit_bound_divisor() -> u64 {
    1_024
}

fn default_target_block_gap() -> u64 {
    60
}

fn default_target_period_blocks() -> u64 {
    60
}

fn default_allowed_future_gap() -> u64 {
    3
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            chain_id: 39797,
            maximum_extra_data_size: default_maximum_extra_data_size(),
            min_gas_limit: default_min_gas_limit(),
            gas_limit_bound_divisor: default_gas_limit_bound_divisor(),
            target_block_gap: default_target_block_gap(),
            target_period_blocks: default_target_period_blocks(),
            allowed_future_gap: default_allowed_future_gap(),
            eip158_block: 0,
            fork_hashes: Vec::new(),
        }
    }
}

impl ChainConfig {
    pub fn testnet() -> Self {
        Self {
            chain_id: 49797,
            ..Self::default()
        }
    }

    pub fn load(path: &Path) -> EngineResult<Self> {
        let content = fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|err| EngineError::Config(format!("unable to parse chain config: {err}")))
    }

    pub fn save(&self, path: &Path) -> EngineResult<()> {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)?;
        let encoded = toml::to_string_pretty(self)
            .map_err(|err| EngineError::Config(format!("unable to encode chain config: {err}")))?;
        fs::write(path, encoded)?;
        Ok(())
    }

    pub fn is_eip158(&self, number: u64) -> bool {
        number >= self.eip158_block
    }

    pub fn fork_hash(&self, number: u64) -> Option<B256> {
        self.fork_hashes
            .iter()
            .find(|fork| fork.number == number)
            .map(|fork| fork.hash)
    }
}
