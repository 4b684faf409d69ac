// Blockchain module
//
// This module contains the ledger core:
// - Block structure and hashing
// - Transactions, signatures and the admission audit log
// - Proof of work
// - Chain validation
// - Snapshot storage

pub mod audit;
pub mod block;
pub mod chain;
pub mod crypto;
pub mod params;
pub mod pow;
pub mod storage;
pub mod transaction;
pub mod validator;

// Re-export main components for easier access
pub use audit::{AuditEntry, AuditStatus};
pub use block::Block;
pub use chain::{AccountBalance, Blockchain, BlockchainError, ChainStats, CoinbaseReward};
pub use params::{EmptyPoolPolicy, LedgerConfig, ParameterError, RewardRange};
pub use storage::BlockchainStorage;
pub use transaction::{Transaction, TransactionError};
