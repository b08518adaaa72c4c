//! Chain authority
//!
//! Sole owner of every accepted block and of the ledger snapshot at each
//! chain head. Candidates are checked, applied and recorded one at a time;
//! a rejected candidate leaves no trace. See [`AuthorityHandle`] for the
//! task that serializes access from the rest of the node.
//!
//! [`AuthorityHandle`]: crate::node::AuthorityHandle

use std::collections::HashMap;
use std::sync::Arc;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use crate::consensus::{Block, BlockValidator, ValidationError};
use crate::crypto::Hash;
use crate::p2p::PeerBroadcaster;
use crate::storage::{block_state, issuance, merge, total_tokens, ChainState, Mempool, StateDelta};

#[derive(Debug, Error)]
pub enum AuthorityError {
    #[error("block {hash} at height {height} rejected: {source}")]
    Rejected {
        hash: Hash,
        height: u64,
        #[source]
        source: ValidationError,
    },
    #[error("block {0} not found")]
    BlockNotFound(String),
    #[error("expected exactly one chain head, found {heads}")]
    AmbiguousOrMissingHead { heads: usize },
    #[error("chain authority is not running")]
    Unavailable,
}

impl AuthorityError {
    /// Validation failure behind a rejection
    pub fn rejection(&self) -> Option<&ValidationError> {
        match self {
            AuthorityError::Rejected { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Summary of the current chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainStats {
    pub height: u64,
    pub tip_hash: Hash,
    pub block_count: usize,
    pub frontier_len: usize,
    pub total_tokens: u128,
}

pub struct ChainAuthority {
    blocks: HashMap<Hash, Block>,
    /// Ledger at each block with no accepted child
    frontier_states: HashMap<Hash, ChainState>,
    validator: BlockValidator,
    mempool: Arc<dyn Mempool>,
    broadcaster: Arc<dyn PeerBroadcaster>,
}

impl ChainAuthority {
    /// Start from `genesis`, trusted along with its ledger
    pub fn new(
        genesis: Block,
        genesis_state: ChainState,
        validator: BlockValidator,
        mempool: Arc<dyn Mempool>,
        broadcaster: Arc<dyn PeerBroadcaster>,
    ) -> Self {
        let genesis_hash = genesis.hash();
        info!(
            genesis = %genesis_hash,
            total_tokens = total_tokens(&genesis_state),
            "chain authority initialized"
        );

        Self {
            blocks: HashMap::from([(genesis_hash, genesis)]),
            frontier_states: HashMap::from([(genesis_hash, genesis_state)]),
            validator,
            mempool,
            broadcaster,
        }
    }

    /// The single chain head.
    ///
    /// Zero or several heads means the chain can no longer be extended
    /// unambiguously; the node should stop.
    pub fn latest_block(&self) -> Result<Block, AuthorityError> {
        let mut heads = self.frontier_states.keys();
        match (heads.next(), heads.next()) {
            (Some(head), None) => self.get_block(head),
            _ => {
                let heads = self.frontier_states.len();
                error!(heads, "chain has no unique head");
                Err(AuthorityError::AmbiguousOrMissingHead { heads })
            }
        }
    }

    pub fn get_block(&self, hash: &Hash) -> Result<Block, AuthorityError> {
        debug!(block = %hash, "block lookup");
        self.blocks
            .get(hash)
            .cloned()
            .ok_or_else(|| AuthorityError::BlockNotFound(hash.to_hex()))
    }

    /// Look a block up by its hex hash, ignoring case
    pub fn get_block_by_display_hash(&self, display: &str) -> Result<Block, AuthorityError> {
        let wanted = display.trim();
        debug!(block = wanted, "block lookup by display hash");
        self.blocks
            .iter()
            .find(|(hash, _)| hash.to_hex().eq_ignore_ascii_case(wanted))
            .map(|(_, block)| block.clone())
            .ok_or_else(|| AuthorityError::BlockNotFound(wanted.to_string()))
    }

    /// Ledger at `hash`, if it is a chain head
    pub fn chain_state(&self, hash: &Hash) -> Option<ChainState> {
        self.frontier_states.get(hash).cloned()
    }

    /// Validate `candidate` and, if it passes, make it the head it extends.
    ///
    /// The candidate's ledger is its predecessor's head snapshot with the
    /// block applied. A known predecessor that is no longer a head
    /// contributes an empty snapshot and the candidate opens a new head.
    pub fn add_block(&mut self, candidate: Block) -> Result<(), AuthorityError> {
        let hash = candidate.hash();
        let height = candidate.height();
        let reject = |reason: ValidationError| {
            warn!(block = %hash, height, %reason, "rejected block");
            AuthorityError::Rejected {
                hash,
                height,
                source: reason,
            }
        };

        if self.blocks.contains_key(&hash) {
            return Err(reject(ValidationError::DuplicateBlock));
        }

        let prev_hash = candidate.header.prev_hash;
        let predecessor = self
            .blocks
            .get(&prev_hash)
            .ok_or_else(|| reject(ValidationError::InvalidLineage))?;

        let empty = ChainState::new();
        let prior = self.frontier_states.get(&prev_hash).unwrap_or(&empty);
        let delta = block_state(&candidate.transactions);

        let resulting = match merge(&delta, prior) {
            Ok(state) => state,
            Err(err) => {
                // Structural failures take precedence over ledger ones
                self.validator
                    .check_block(&candidate, predecessor)
                    .map_err(reject)?;
                return Err(reject(err.into()));
            }
        };

        self.validator
            .validate(&candidate, predecessor, &resulting)
            .map_err(reject)?;

        audit_supply(&hash, prior, &delta, &resulting);

        for tx in &candidate.transactions {
            self.mempool.remove(tx);
        }

        let total = total_tokens(&resulting);
        self.frontier_states.remove(&prev_hash);
        self.frontier_states.insert(hash, resulting);

        info!(height, block = %hash, total_tokens = total, "accepted block");

        self.broadcaster.broadcast_new_block(&candidate);
        self.blocks.insert(hash, candidate);

        Ok(())
    }

    /// Up to `count` blocks ending at `start`, oldest first.
    ///
    /// Walks predecessor links and stops early at a hash that is not
    /// known, so the genesis block is the oldest one ever returned.
    pub fn get_blocks(&self, start: &Hash, count: usize) -> Vec<Block> {
        let mut blocks = Vec::with_capacity(count.min(self.blocks.len()));
        let mut cursor = *start;

        while blocks.len() < count {
            let Some(block) = self.blocks.get(&cursor) else {
                break;
            };
            cursor = block.header.prev_hash;
            blocks.push(block.clone());
        }

        blocks.reverse();
        blocks
    }

    /// Every block above genesis on the current chain, oldest first
    pub fn all_blocks(&self) -> Result<Vec<Block>, AuthorityError> {
        let latest = self.latest_block()?;
        let count = usize::try_from(latest.height()).unwrap_or(usize::MAX);
        Ok(self.get_blocks(&latest.hash(), count))
    }

    pub fn stats(&self) -> Result<ChainStats, AuthorityError> {
        let latest = self.latest_block()?;
        let tip_hash = latest.hash();
        let total_tokens = self
            .frontier_states
            .get(&tip_hash)
            .map_or(0, total_tokens);

        Ok(ChainStats {
            height: latest.height(),
            tip_hash,
            block_count: self.blocks.len(),
            frontier_len: self.frontier_states.len(),
            total_tokens,
        })
    }

    /// Hashes of all current heads, sorted
    pub fn frontier(&self) -> Vec<Hash> {
        let mut heads: Vec<Hash> = self.frontier_states.keys().copied().collect();
        heads.sort();
        heads
    }
}

/// Tokens may only appear through coinbase issuance
fn audit_supply(hash: &Hash, prior: &ChainState, delta: &StateDelta, resulting: &ChainState) {
    let expected = total_tokens(prior) + issuance(delta);
    let actual = total_tokens(resulting);
    if actual != expected {
        error!(block = %hash, expected, actual, "token supply mismatch");
    }
}
