use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Address credited by the genesis allocation unless configured otherwise
pub const DEFAULT_GENESIS_ADDRESS: &str = "01a31d45447b0ab14da6843208d8967d3c5ea9ae";

/// Errors raised by bounds-checked parameter setters
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParameterError {
    #[error("Difficulty must be between {min} and {max}, got {requested}")]
    DifficultyOutOfRange { requested: u32, min: u32, max: u32 },

    #[error("Min reward must be less than or equal to max reward ({min} > {max})")]
    RewardRangeInverted { min: u64, max: u64 },

    #[error("Max reward cannot exceed {ceiling}, got {max}")]
    RewardAboveCeiling { max: u64, ceiling: u64 },
}

/// What mining does when the pending pool is empty
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptyPoolPolicy {
    /// Produce a block holding only the coinbase reward
    #[default]
    MintRewardOnly,
    /// Refuse to mine until there is something to confirm
    Reject,
}

/// Inclusive range the block reward is drawn from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RewardRange {
    pub min: u64,
    pub max: u64,
}

/// Tunables of a ledger instance
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerConfig {
    pub initial_difficulty: u32,
    pub min_difficulty: u32,
    pub max_difficulty: u32,
    pub reward: RewardRange,
    /// Upper bound accepted for `reward.max`
    pub max_reward: u64,
    pub empty_pool: EmptyPoolPolicy,
    pub genesis_address: String,
    pub genesis_amount: f64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig {
            initial_difficulty: 4,
            min_difficulty: 1,
            max_difficulty: 10,
            reward: RewardRange { min: 1, max: 10 },
            max_reward: 1000,
            empty_pool: EmptyPoolPolicy::default(),
            genesis_address: DEFAULT_GENESIS_ADDRESS.to_string(),
            genesis_amount: 1000.0,
        }
    }
}

impl LedgerConfig {
    pub fn check_difficulty(&self, difficulty: u32) -> Result<(), ParameterError> {
        if difficulty < self.min_difficulty || difficulty > self.max_difficulty {
            return Err(ParameterError::DifficultyOutOfRange {
                requested: difficulty,
                min: self.min_difficulty,
                max: self.max_difficulty,
            });
        }
        Ok(())
    }

    pub fn check_reward(&self, reward: RewardRange) -> Result<(), ParameterError> {
        if reward.min > reward.max {
            return Err(ParameterError::RewardRangeInverted {
                min: reward.min,
                max: reward.max,
            });
        }
        if reward.max > self.max_reward {
            return Err(ParameterError::RewardAboveCeiling {
                max: reward.max,
                ceiling: self.max_reward,
            });
        }
        Ok(())
    }

    /// Checks that the configured starting values respect the configured bounds
    pub fn validate(&self) -> Result<(), ParameterError> {
        self.check_difficulty(self.initial_difficulty)?;
        self.check_reward(self.reward)
    }

    pub fn clamp_difficulty(&self, difficulty: u32) -> u32 {
        difficulty.clamp(self.min_difficulty, self.max_difficulty.max(self.min_difficulty))
    }
}
