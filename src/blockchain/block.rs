use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::crypto::sha256_hex;
use super::transaction::Transaction;

/// `previous_hash` of the genesis block
pub const GENESIS_PREVIOUS_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// Whether `hash` starts with at least `difficulty` zero hex characters
pub fn meets_difficulty(hash: &str, difficulty: u32) -> bool {
    let required = difficulty as usize;
    hash.len() >= required && hash.bytes().take(required).all(|c| c == b'0')
}

/// Represents a block in the blockchain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Block {
    /// Index of the block in the chain
    pub index: u64,

    /// Timestamp when the block was created
    #[schema(value_type = String, example = "2023-01-01T12:00:00Z")]
    pub timestamp: DateTime<Utc>,

    /// List of transactions included in this block, coinbase first
    pub transactions: Vec<Transaction>,

    /// Hash of the previous block
    pub previous_hash: String,

    /// Proof-of-work counter
    pub nonce: u64,

    /// Leading zero hex characters required of `hash` when the block was mined
    pub difficulty: u32,

    /// Hash of the current block (calculated)
    pub hash: String,
}

impl Block {
    /// Creates a new, unmined block.
    ///
    /// The nonce starts at zero and `hash` is computed right away, so the
    /// block carries a consistent hash that does not yet satisfy its
    /// difficulty. Call [`Block::mine`] to search for one that does.
    pub fn new(
        index: u64,
        timestamp: DateTime<Utc>,
        transactions: Vec<Transaction>,
        previous_hash: String,
        difficulty: u32,
    ) -> Self {
        let mut block = Block {
            index,
            timestamp,
            transactions,
            previous_hash,
            nonce: 0,
            difficulty,
            hash: String::new(),
        };
        block.hash = block.calculate_hash();
        block
    }

    /// The exact string that gets hashed: the header fields and transactions
    /// as compact JSON with sorted keys. `hash` itself is excluded.
    pub fn hash_preimage(&self) -> String {
        serde_json::json!({
            "index": self.index,
            "timestamp": self.timestamp,
            "transactions": self.transactions,
            "previous_hash": self.previous_hash,
            "nonce": self.nonce,
            "difficulty": self.difficulty,
        })
        .to_string()
    }

    /// Calculates the SHA-256 hash of the block as a hexadecimal string
    pub fn calculate_hash(&self) -> String {
        sha256_hex(self.hash_preimage().as_bytes())
    }

    /// Searches nonces upwards from the current one until the hash has
    /// `difficulty` leading zeros. Blocks the calling thread until it does.
    pub fn mine(&mut self) {
        loop {
            self.hash = self.calculate_hash();
            if meets_difficulty(&self.hash, self.difficulty) {
                break;
            }
            self.nonce = self.nonce.wrapping_add(1);
        }
    }

    /// Whether the stored hash satisfies the block's own difficulty
    pub fn has_valid_proof(&self) -> bool {
        meets_difficulty(&self.hash, self.difficulty)
    }

    /// Whether the stored hash matches the block's contents
    pub fn has_consistent_hash(&self) -> bool {
        self.hash == self.calculate_hash()
    }
}
