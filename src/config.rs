use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

use crate::blockchain::params::DEFAULT_GENESIS_ADDRESS;
use crate::blockchain::{EmptyPoolPolicy, LedgerConfig, RewardRange};

/// Errors raised while reading node configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: String, value: String },
}

/// Everything the node reads from its environment
#[derive(Debug, Clone, PartialEq)]
pub struct NodeConfig {
    pub host: String,
    pub port: u16,
    /// Directory of the sled database
    pub data_dir: PathBuf,
    pub ledger: LedgerConfig,
}

impl NodeConfig {
    /// Loads `.env` if present, then reads the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from `lookup`, falling back to defaults for
    /// missing keys
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = LedgerConfig::default();

        let allow_empty_blocks = parse_bool(&lookup, "ALLOW_EMPTY_BLOCKS", true)?;
        let ledger = LedgerConfig {
            initial_difficulty: parse(&lookup, "INITIAL_DIFFICULTY", defaults.initial_difficulty)?,
            min_difficulty: parse(&lookup, "MIN_DIFFICULTY", defaults.min_difficulty)?,
            max_difficulty: parse(&lookup, "MAX_DIFFICULTY", defaults.max_difficulty)?,
            reward: RewardRange {
                min: parse(&lookup, "BLOCK_REWARD_MIN", defaults.reward.min)?,
                max: parse(&lookup, "BLOCK_REWARD_MAX", defaults.reward.max)?,
            },
            max_reward: parse(&lookup, "MAX_BLOCK_REWARD", defaults.max_reward)?,
            empty_pool: if allow_empty_blocks {
                EmptyPoolPolicy::MintRewardOnly
            } else {
                EmptyPoolPolicy::Reject
            },
            genesis_address: lookup("GENESIS_ADDRESS")
                .unwrap_or_else(|| DEFAULT_GENESIS_ADDRESS.to_string()),
            genesis_amount: parse(&lookup, "GENESIS_AMOUNT", defaults.genesis_amount)?,
        };

        Ok(NodeConfig {
            host: lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parse(&lookup, "PORT", 8080)?,
            data_dir: lookup("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data/blockchain")),
            ledger,
        })
    }
}

fn parse<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            key: key.to_string(),
            value,
        }),
        None => Ok(default),
    }
}

fn parse_bool<F>(lookup: &F, key: &str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid {
                key: key.to_string(),
                value,
            }),
        },
        None => Ok(default),
    }
}
