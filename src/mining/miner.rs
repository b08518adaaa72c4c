//! Block miner
//!
//! Assembles candidate blocks on top of a head (coinbase first, then the
//! given transfers), commits to the resulting ledger, and searches nonces
//! until the header meets its target.

use crate::consensus::{compact_to_target, meets_target, transactions_root, Block, BlockHeader, HEADER_VERSION};
use crate::storage::{block_state, merge, state_hash, ChainState, StateError};
use crate::validation::{Address, Transaction};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Mining result
#[derive(Debug)]
pub enum MiningResult {
    /// Header meets its target
    Success(Block),
    /// Stop signal raised before a solution was found
    Interrupted,
}

/// Candidate block plus the ledger it commits to
#[derive(Debug, Clone)]
pub struct BlockTemplate {
    pub block: Block,
    pub state: ChainState,
}

/// Block miner
#[derive(Clone)]
pub struct Miner {
    reward_address: Address,
    reward: u64,
    difficulty: u32,
    stop_signal: Arc<AtomicBool>,
}

impl Miner {
    pub fn new(reward_address: Address, reward: u64, difficulty: u32) -> Self {
        Self {
            reward_address,
            reward,
            difficulty,
            stop_signal: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn stop_signal(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop_signal)
    }

    pub fn stop(&self) {
        self.stop_signal.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.stop_signal.store(false, Ordering::SeqCst);
    }

    /// Assemble an unmined child of `parent`.
    ///
    /// Fails if the transfers cannot be applied to `parent_state`.
    pub fn assemble_block(
        &self,
        parent: &Block,
        parent_state: &ChainState,
        transactions: Vec<Transaction>,
    ) -> Result<BlockTemplate, StateError> {
        let height = parent.height() + 1;

        let mut all_txs = Vec::with_capacity(transactions.len() + 1);
        all_txs.push(Transaction::coinbase(self.reward, self.reward_address, height));
        all_txs.extend(transactions);

        let state = merge(&block_state(&all_txs), parent_state)?;

        let header = BlockHeader {
            version: HEADER_VERSION,
            prev_hash: parent.hash(),
            height,
            txs_hash: transactions_root(&all_txs),
            chain_state_hash: state_hash(&state),
            timestamp: unix_now(),
            difficulty_target: self.difficulty,
            nonce: 0,
        };

        Ok(BlockTemplate {
            block: Block::new(header, all_txs),
            state,
        })
    }

    /// Increment the nonce until the header meets its target
    pub fn mine_block(&self, mut block: Block) -> MiningResult {
        let target = compact_to_target(block.header.difficulty_target);

        loop {
            if self.stop_signal.load(Ordering::SeqCst) {
                return MiningResult::Interrupted;
            }

            if meets_target(&block.header.hash(), &target) {
                return MiningResult::Success(block);
            }

            block.header.nonce = block.header.nonce.wrapping_add(1);

            // Nonce space exhausted, move the timestamp
            if block.header.nonce == 0 {
                block.header.timestamp = unix_now();
            }
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
