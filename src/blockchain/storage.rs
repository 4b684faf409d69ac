use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};
use sled::{Db, Tree};
use thiserror::Error;

use super::audit::AuditEntry;
use super::block::Block;
use super::transaction::Transaction;

const SNAPSHOT_KEY: &[u8] = b"latest";

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sled::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),
}

/// Everything needed to restore a ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub chain: Vec<Block>,
    pub pending: Vec<Transaction>,
    pub audit_log: Vec<AuditEntry>,
    pub difficulty: u32,
}

/// Durable home of ledger snapshots. Each save replaces the previous one.
pub trait SnapshotStore: Send + Sync {
    /// Returns the most recently saved snapshot, or `None` if nothing was saved yet
    fn load(&self) -> Result<Option<Snapshot>, StorageError>;

    fn save(&self, snapshot: &Snapshot) -> Result<(), StorageError>;
}

/// sled-backed snapshot store
pub struct BlockchainStorage {
    /// The database instance
    db: Db,

    /// Tree holding the encoded snapshot
    snapshots: Tree,

    /// Tree for metadata
    metadata: Tree,
}

impl std::fmt::Debug for BlockchainStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockchainStorage").finish()
    }
}

impl BlockchainStorage {
    /// Opens (or creates) the database in `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        Self::from_db(sled::open(path)?)
    }

    /// Opens a database that is deleted when dropped
    #[cfg(test)]
    pub fn temporary() -> Result<Self, StorageError> {
        Self::from_db(sled::Config::new().temporary(true).open()?)
    }

    fn from_db(db: Db) -> Result<Self, StorageError> {
        let snapshots = db.open_tree("snapshots")?;
        let metadata = db.open_tree("metadata")?;

        Ok(Self {
            db,
            snapshots,
            metadata,
        })
    }

    /// Height of the chain in the last saved snapshot, 0 if none
    pub fn get_block_height(&self) -> Result<u64, StorageError> {
        match self.metadata.get("block_height")? {
            Some(value) => bincode::deserialize(&value)
                .map_err(|e| StorageError::DeserializationError(e.to_string())),
            None => Ok(0),
        }
    }

    /// Hash of the chain tip in the last saved snapshot
    pub fn get_latest_block_hash(&self) -> Result<Option<String>, StorageError> {
        Ok(self
            .metadata
            .get("latest_block_hash")?
            .map(|value| String::from_utf8_lossy(&value).to_string()))
    }
}

impl SnapshotStore for BlockchainStorage {
    fn load(&self) -> Result<Option<Snapshot>, StorageError> {
        match self.snapshots.get(SNAPSHOT_KEY)? {
            Some(value) => bincode::deserialize(&value)
                .map(Some)
                .map_err(|e| StorageError::DeserializationError(e.to_string())),
            None => Ok(None),
        }
    }

    fn save(&self, snapshot: &Snapshot) -> Result<(), StorageError> {
        let value = bincode::serialize(snapshot)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;
        self.snapshots.insert(SNAPSHOT_KEY, value)?;

        let height = bincode::serialize(&(snapshot.chain.len() as u64))
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;
        self.metadata.insert("block_height", height)?;
        if let Some(tip) = snapshot.chain.last() {
            self.metadata.insert("latest_block_hash", tip.hash.as_bytes())?;
        }

        // Flush storage to disk
        self.db.flush()?;

        debug!(
            "Saved snapshot: {} blocks, {} pending, {} audit entries",
            snapshot.chain.len(),
            snapshot.pending.len(),
            snapshot.audit_log.len()
        );
        Ok(())
    }
}
