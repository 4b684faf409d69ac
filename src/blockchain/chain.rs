use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{error, info, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use super::audit::AuditEntry;
use super::block::{Block, GENESIS_PREVIOUS_HASH};
use super::params::{EmptyPoolPolicy, LedgerConfig, ParameterError, RewardRange};
use super::pow::{CpuMiner, ProofOfWork};
use super::storage::{Snapshot, SnapshotStore, StorageError};
use super::transaction::{Transaction, TransactionError};
use super::validator::{self, AppendConflict, ValidationReport};

/// Errors that can occur during blockchain operations
#[derive(Debug, Error)]
pub enum BlockchainError {
    #[error("Transaction rejected: {0}")]
    TransactionError(#[from] TransactionError),

    #[error("Block rejected: {0}")]
    AppendConflict(#[from] AppendConflict),

    #[error("{0}")]
    ParameterError(#[from] ParameterError),

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("No transactions to mine")]
    NothingToMine,
}

/// A block reward as it appears on the chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CoinbaseReward {
    pub block_index: u64,
    pub miner: String,
    pub reward: f64,
    #[schema(value_type = String, example = "2023-01-01T12:00:00Z")]
    pub timestamp: DateTime<Utc>,
}

/// An address seen on the ledger with its current balance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AccountBalance {
    pub address: String,
    pub balance: f64,
}

/// Aggregate counters over the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ChainStats {
    pub total_blocks: usize,
    pub total_transactions: usize,
    pub pending_transactions: usize,
    pub difficulty: u32,
}

/// The ledger: chain, pending pool, audit log and mining parameters
pub struct Blockchain {
    /// The chain of blocks, genesis first
    chain: Vec<Block>,

    /// Transactions admitted but not yet mined
    pending_transactions: Vec<Transaction>,

    /// Every admission attempt, in order
    audit_log: Vec<AuditEntry>,

    /// Leading zeros required of the next mined block
    difficulty: u32,

    /// Range the next block reward is drawn from
    reward: RewardRange,

    config: LedgerConfig,

    miner: Box<dyn ProofOfWork>,

    /// Storage for blockchain data
    storage: Option<Arc<dyn SnapshotStore>>,
}

impl std::fmt::Debug for Blockchain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Blockchain")
            .field("height", &self.chain.len())
            .field("pending", &self.pending_transactions.len())
            .field("difficulty", &self.difficulty)
            .field("reward", &self.reward)
            .finish()
    }
}

impl Blockchain {
    /// Creates an in-memory blockchain with a freshly mined genesis block
    pub fn new(config: LedgerConfig) -> Result<Self, BlockchainError> {
        let mut blockchain = Self::empty(config)?;
        blockchain.create_genesis_block();

        Ok(blockchain)
    }

    /// Creates a blockchain backed by `storage`.
    ///
    /// A saved snapshot is restored as is: its chain is validated and any
    /// defect is logged, never repaired. Without a snapshot a genesis block
    /// is minted and saved.
    pub fn with_storage(
        config: LedgerConfig,
        storage: Arc<dyn SnapshotStore>,
    ) -> Result<Self, BlockchainError> {
        let mut blockchain = Self::empty(config)?;

        match storage.load()? {
            Some(snapshot) if !snapshot.chain.is_empty() => {
                blockchain.restore(snapshot);
                info!("Loaded blockchain from storage: {} blocks", blockchain.chain.len());
                blockchain.storage = Some(storage);
            }
            _ => {
                info!("No existing blockchain found in storage, creating genesis block");
                blockchain.create_genesis_block();
                blockchain.storage = Some(storage);
                blockchain.save_to_storage()?;
            }
        }

        Ok(blockchain)
    }

    fn empty(config: LedgerConfig) -> Result<Self, BlockchainError> {
        config.validate()?;
        Ok(Blockchain {
            chain: Vec::new(),
            pending_transactions: Vec::new(),
            audit_log: Vec::new(),
            difficulty: config.initial_difficulty,
            reward: config.reward,
            config,
            miner: Box::new(CpuMiner),
            storage: None,
        })
    }

    /// Replaces the proof-of-work engine used by [`Blockchain::mine_block`]
    #[cfg(test)]
    pub fn with_miner(mut self, miner: Box<dyn ProofOfWork>) -> Self {
        self.miner = miner;
        self
    }

    fn restore(&mut self, snapshot: Snapshot) {
        let report = validator::validate_chain(&snapshot.chain);
        if !report.valid {
            warn!("Restored chain is not valid: {}", report.message);
            for defect in &report.errors {
                warn!("  {}", defect.message);
            }
        }

        let difficulty = self.config.clamp_difficulty(snapshot.difficulty);
        if difficulty != snapshot.difficulty {
            warn!(
                "Stored difficulty {} is outside the configured range, using {}",
                snapshot.difficulty, difficulty
            );
        }

        self.chain = snapshot.chain;
        self.pending_transactions = snapshot.pending;
        self.audit_log = snapshot.audit_log;
        self.difficulty = difficulty;
    }

    /// Creates the genesis block (first block in the chain)
    fn create_genesis_block(&mut self) {
        let allocation =
            Transaction::genesis(&self.config.genesis_address, self.config.genesis_amount);

        let mut genesis = Block::new(
            0,
            Utc::now(),
            vec![allocation],
            GENESIS_PREVIOUS_HASH.to_string(),
            self.difficulty,
        );
        self.miner.seal(&mut genesis);

        info!("Created genesis block {}", genesis.hash);
        self.chain.push(genesis);
    }

    /// Gets the last block in the chain
    pub fn last_block(&self) -> &Block {
        // The chain is never empty: constructors push or restore at least genesis
        &self.chain[self.chain.len() - 1]
    }

    pub fn chain(&self) -> &[Block] {
        &self.chain
    }

    pub fn pending_transactions(&self) -> &[Transaction] {
        &self.pending_transactions
    }

    pub fn audit_log(&self) -> &[AuditEntry] {
        &self.audit_log
    }

    /// Admits a transaction to the pending pool.
    ///
    /// Each call appends exactly one audit entry, whatever the outcome.
    ///
    /// # Returns
    ///
    /// The size of the pending pool after admission
    pub fn add_transaction(&mut self, transaction: Transaction) -> Result<usize, TransactionError> {
        if let Err(err) = self.check_admission(&transaction) {
            warn!(
                "Rejected transaction {} -> {} ({}): {}",
                transaction.sender, transaction.receiver, transaction.amount, err
            );
            self.audit_log.push(AuditEntry::rejected(transaction, &err));
            return Err(err);
        }

        info!(
            "Accepted transaction {} -> {} ({})",
            transaction.sender, transaction.receiver, transaction.amount
        );
        self.pending_transactions.push(transaction.clone());
        self.audit_log.push(AuditEntry::accepted(transaction));
        self.persist();

        Ok(self.pending_transactions.len())
    }

    fn check_admission(&self, transaction: &Transaction) -> Result<(), TransactionError> {
        if !transaction.verify() {
            return Err(TransactionError::InvalidSignature);
        }

        if !transaction.amount.is_finite() || transaction.amount < 0.0 {
            return Err(TransactionError::InvalidAmount(transaction.amount));
        }

        if let Some(sender) = transaction.sender.address() {
            let available = self.balance(sender);
            if available < transaction.amount {
                return Err(TransactionError::InsufficientBalance {
                    required: transaction.amount,
                    available,
                });
            }
        }

        Ok(())
    }

    /// Credits `address` with freshly minted value through a coinbase
    /// transaction. The credit is pending until the next block is mined.
    pub fn credit(&mut self, address: &str, amount: f64) -> Result<usize, TransactionError> {
        self.add_transaction(Transaction::coinbase(address, amount))
    }

    /// Balance of `address`, replayed over the confirmed chain and then the
    /// pending pool
    pub fn balance(&self, address: &str) -> f64 {
        self.chain
            .iter()
            .flat_map(|block| block.transactions.iter())
            .chain(self.pending_transactions.iter())
            .map(|tx| tx.balance_delta(address))
            .sum()
    }

    /// Mines a new block with the pending transactions
    ///
    /// # Arguments
    ///
    /// * `miner_address` - The address of the miner (to receive mining reward)
    ///
    /// # Returns
    ///
    /// Result with the newly mined block
    pub fn mine_block(&mut self, miner_address: &str) -> Result<Block, BlockchainError> {
        if self.pending_transactions.is_empty() && self.config.empty_pool == EmptyPoolPolicy::Reject
        {
            return Err(BlockchainError::NothingToMine);
        }

        let reward = rand::thread_rng().gen_range(self.reward.min..=self.reward.max) as f64;

        let mut transactions = Vec::with_capacity(1 + self.pending_transactions.len());
        transactions.push(Transaction::coinbase(miner_address, reward));
        transactions.extend(self.pending_transactions.iter().cloned());

        let last_block = self.last_block();
        let mut block = Block::new(
            self.chain.len() as u64,
            Utc::now(),
            transactions,
            last_block.hash.clone(),
            self.difficulty,
        );
        self.miner.seal(&mut block);

        if let Err(conflict) = self.append_block(block.clone()) {
            warn!("Mined block {} could not be appended: {}", block.index, conflict);
            return Err(conflict.into());
        }

        self.pending_transactions.clear();
        self.persist();

        info!(
            "Mined block {} with {} transactions (reward {} to {}, nonce {}, hash {})",
            block.index,
            block.transactions.len(),
            reward,
            miner_address,
            block.nonce,
            block.hash
        );
        Ok(block)
    }

    /// Appends `block` if it extends the tip, its hash matches its contents
    /// and the hash meets its difficulty. On error the chain is unchanged.
    pub fn append_block(&mut self, block: Block) -> Result<(), AppendConflict> {
        validator::check_append(self.last_block(), &block)?;
        self.chain.push(block);
        Ok(())
    }

    /// Validates the blockchain
    pub fn validate(&self) -> ValidationReport {
        validator::validate_chain(&self.chain)
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    /// Changes the difficulty of blocks mined from now on
    pub fn set_difficulty(&mut self, difficulty: u32) -> Result<(), ParameterError> {
        self.config.check_difficulty(difficulty)?;
        info!("Difficulty changed from {} to {}", self.difficulty, difficulty);
        self.difficulty = difficulty;
        self.persist();
        Ok(())
    }

    pub fn reward_range(&self) -> RewardRange {
        self.reward
    }

    pub fn set_reward_range(&mut self, min: u64, max: u64) -> Result<(), ParameterError> {
        let reward = RewardRange { min, max };
        self.config.check_reward(reward)?;
        info!("Reward range changed to [{}, {}]", min, max);
        self.reward = reward;
        Ok(())
    }

    /// Bounds and defaults this ledger was configured with
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Every address that appears on the ledger, with its balance
    pub fn accounts(&self) -> Vec<AccountBalance> {
        let addresses: BTreeSet<&str> = self
            .chain
            .iter()
            .flat_map(|block| block.transactions.iter())
            .chain(self.pending_transactions.iter())
            .flat_map(|tx| tx.sender.address().into_iter().chain([tx.receiver.as_str()]))
            .collect();

        addresses
            .into_iter()
            .map(|address| AccountBalance {
                address: address.to_string(),
                balance: self.balance(address),
            })
            .collect()
    }

    /// Every coinbase transaction on the confirmed chain
    pub fn coinbase_rewards(&self) -> Vec<CoinbaseReward> {
        self.chain
            .iter()
            .flat_map(|block| {
                block
                    .transactions
                    .iter()
                    .filter(|tx| tx.is_coinbase())
                    .map(move |tx| CoinbaseReward {
                        block_index: block.index,
                        miner: tx.receiver.clone(),
                        reward: tx.amount,
                        timestamp: block.timestamp,
                    })
            })
            .collect()
    }

    pub fn stats(&self) -> ChainStats {
        ChainStats {
            total_blocks: self.chain.len(),
            total_transactions: self.chain.iter().map(|b| b.transactions.len()).sum(),
            pending_transactions: self.pending_transactions.len(),
            difficulty: self.difficulty,
        }
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            chain: self.chain.clone(),
            pending: self.pending_transactions.clone(),
            audit_log: self.audit_log.clone(),
            difficulty: self.difficulty,
        }
    }

    /// Saves the blockchain to storage
    fn save_to_storage(&self) -> Result<(), StorageError> {
        match &self.storage {
            Some(storage) => storage.save(&self.snapshot()),
            None => Ok(()),
        }
    }

    /// Saves after a successful operation. A failed write is logged and
    /// does not undo the operation.
    fn persist(&self) {
        if let Err(err) = self.save_to_storage() {
            error!("Failed to save blockchain snapshot: {}", err);
        }
    }
}
