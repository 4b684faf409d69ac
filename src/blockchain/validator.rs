//! Structural checks over blocks.
//!
//! Nothing here touches ledger state, so the same checks apply to the
//! ledger's own chain and to a candidate chain received from outside.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use super::block::Block;

/// Why a block was refused at append time
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppendConflict {
    #[error("previous hash {found} does not match chain tip {expected}")]
    PreviousHashMismatch { expected: String, found: String },

    #[error("stored hash {stored} does not match calculated hash {calculated}")]
    HashMismatch { stored: String, calculated: String },

    #[error("hash {hash} does not meet difficulty {difficulty}")]
    InsufficientWork { hash: String, difficulty: u32 },
}

/// Checks that `block` may extend a chain whose last block is `tip`
pub fn check_append(tip: &Block, block: &Block) -> Result<(), AppendConflict> {
    if block.previous_hash != tip.hash {
        return Err(AppendConflict::PreviousHashMismatch {
            expected: tip.hash.clone(),
            found: block.previous_hash.clone(),
        });
    }

    let calculated = block.calculate_hash();
    if calculated != block.hash {
        return Err(AppendConflict::HashMismatch {
            stored: block.hash.clone(),
            calculated,
        });
    }

    if !block.has_valid_proof() {
        return Err(AppendConflict::InsufficientWork {
            hash: block.hash.clone(),
            difficulty: block.difficulty,
        });
    }

    Ok(())
}

/// Kind of integrity defect found by [`validate_chain`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Error)]
pub enum DefectKind {
    #[serde(rename = "hash-mismatch")]
    #[error("Hash mismatch")]
    HashMismatch,

    #[serde(rename = "invalid-pow")]
    #[error("Invalid proof-of-work")]
    InvalidProofOfWork,

    #[serde(rename = "broken-link")]
    #[error("Previous hash mismatch")]
    ChainLinkageBroken,
}

/// A defect located at a chain position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ChainDefect {
    pub block_index: usize,
    pub kind: DefectKind,
    pub message: String,
}

/// Per-block breakdown of the checks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BlockReport {
    pub index: usize,
    pub stored_hash: String,
    pub calculated_hash: String,
    pub hash_valid: bool,
    pub pow_valid: bool,
    pub previous_hash_valid: bool,
    pub is_valid: bool,
    pub errors: Vec<DefectKind>,
}

/// Result of a full chain sweep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<ChainDefect>,
    /// Positions of blocks with at least one defect, ascending
    pub invalid_blocks: Vec<usize>,
    pub total_blocks: usize,
    pub message: String,
    pub block_details: Vec<BlockReport>,
}

fn short(hash: &str) -> &str {
    hash.get(..16).unwrap_or(hash)
}

/// Checks every block of `chain` and reports every defect found.
///
/// For each position: the stored hash must equal the recomputed one, the
/// stored hash must meet the block's own difficulty, and every block after
/// the first must name its predecessor's stored hash. The sweep never stops
/// early.
pub fn validate_chain(chain: &[Block]) -> ValidationReport {
    let mut errors = Vec::new();
    let mut invalid_blocks = BTreeSet::new();
    let mut block_details = Vec::with_capacity(chain.len());

    for (i, block) in chain.iter().enumerate() {
        let calculated_hash = block.calculate_hash();
        let mut found = Vec::new();

        let hash_valid = calculated_hash == block.hash;
        if !hash_valid {
            errors.push(ChainDefect {
                block_index: i,
                kind: DefectKind::HashMismatch,
                message: format!(
                    "Block #{}: Hash mismatch (stored: {}..., calculated: {}...)",
                    i,
                    short(&block.hash),
                    short(&calculated_hash)
                ),
            });
            found.push(DefectKind::HashMismatch);
        }

        let pow_valid = block.has_valid_proof();
        if !pow_valid {
            errors.push(ChainDefect {
                block_index: i,
                kind: DefectKind::InvalidProofOfWork,
                message: format!(
                    "Block #{}: Invalid proof-of-work (difficulty {})",
                    i, block.difficulty
                ),
            });
            found.push(DefectKind::InvalidProofOfWork);
        }

        let previous_hash_valid = match i.checked_sub(1).map(|p| &chain[p]) {
            Some(previous) if block.previous_hash != previous.hash => {
                errors.push(ChainDefect {
                    block_index: i,
                    kind: DefectKind::ChainLinkageBroken,
                    message: format!(
                        "Block #{}: Previous hash mismatch (expected: {}..., got: {}...)",
                        i,
                        short(&previous.hash),
                        short(&block.previous_hash)
                    ),
                });
                found.push(DefectKind::ChainLinkageBroken);
                false
            }
            _ => true,
        };

        if !found.is_empty() {
            invalid_blocks.insert(i);
        }

        block_details.push(BlockReport {
            index: i,
            stored_hash: block.hash.clone(),
            calculated_hash,
            hash_valid,
            pow_valid,
            previous_hash_valid,
            is_valid: found.is_empty(),
            errors: found,
        });
    }

    let valid = errors.is_empty();
    let message = if valid {
        "Blockchain is valid".to_string()
    } else {
        format!("Blockchain is invalid: {} error(s) found", errors.len())
    };

    ValidationReport {
        valid,
        errors,
        invalid_blocks: invalid_blocks.into_iter().collect(),
        total_blocks: chain.len(),
        message,
        block_details,
    }
}
