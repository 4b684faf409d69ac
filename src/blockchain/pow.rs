use std::time::Instant;

use log::debug;

use super::block::Block;

/// Proof-of-work search strategy used by the ledger when sealing a block.
///
/// `seal` must leave the block with a hash that matches its contents and
/// meets its difficulty. It runs to completion; there is no cancellation.
pub trait ProofOfWork: Send + Sync {
    fn seal(&self, block: &mut Block);
}

/// Single-threaded nonce search on the calling thread
#[derive(Debug, Default, Clone, Copy)]
pub struct CpuMiner;

impl ProofOfWork for CpuMiner {
    fn seal(&self, block: &mut Block) {
        let started = Instant::now();
        block.mine();
        debug!(
            "Sealed block {} at difficulty {}: nonce={} in {} ms",
            block.index,
            block.difficulty,
            block.nonce,
            started.elapsed().as_millis()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::transaction::Transaction;
    use chrono::Utc;

    #[test]
    fn test_cpu_miner_seals_block() {
        let mut block = Block::new(
            3,
            Utc::now(),
            vec![Transaction::coinbase("miner", 1.0)],
            "prev".to_string(),
            2,
        );

        CpuMiner.seal(&mut block);

        assert!(block.has_valid_proof());
        assert!(block.has_consistent_hash());
    }
}
