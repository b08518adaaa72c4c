//! Block validation
//!
//! Pure checks deciding whether a candidate may extend its predecessor.
//! Checks run in a fixed order and the first failure is reported.

use std::sync::Arc;
use thiserror::Error;
use crate::consensus::{transactions_root, Block, IssuancePolicy, PowVerifier};
use crate::crypto::{Hash, SignatureVerifier};
use crate::storage::{state_hash, ChainState, StateError};
use crate::validation::Transaction;

/// Why a candidate block was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("incorrect previous hash")]
    InvalidLineage,
    #[error("incorrect height")]
    InvalidHeight,
    #[error("difficulty target not met")]
    DifficultyNotMet,
    #[error("transaction root mismatch")]
    TransactionRootMismatch,
    #[error("one or more transactions invalid")]
    InvalidTransactionSignature,
    #[error("chain state mismatch")]
    ChainStateMismatch,
    #[error("invalid block reward")]
    InvalidBlockReward,
    #[error("block already known")]
    DuplicateBlock,
    #[error("invalid state transition: {0}")]
    InvalidStateTransition(#[from] StateError),
}

/// Validates candidates against their predecessor and resulting ledger
#[derive(Clone)]
pub struct BlockValidator {
    genesis_hash: Hash,
    pow: Arc<dyn PowVerifier>,
    signatures: Arc<dyn SignatureVerifier>,
    issuance: Arc<dyn IssuancePolicy>,
}

impl BlockValidator {
    pub fn new(
        genesis_hash: Hash,
        pow: Arc<dyn PowVerifier>,
        signatures: Arc<dyn SignatureVerifier>,
        issuance: Arc<dyn IssuancePolicy>,
    ) -> Self {
        Self {
            genesis_hash,
            pow,
            signatures,
            issuance,
        }
    }

    pub fn genesis_hash(&self) -> Hash {
        self.genesis_hash
    }

    /// Validate `candidate` as the child of `predecessor`.
    ///
    /// `resulting_state` must be the predecessor's snapshot with the
    /// candidate's transactions merged on top.
    pub fn validate(
        &self,
        candidate: &Block,
        predecessor: &Block,
        resulting_state: &ChainState,
    ) -> Result<(), ValidationError> {
        self.check_block(candidate, predecessor)?;

        if state_hash(resulting_state) != candidate.header.chain_state_hash {
            return Err(ValidationError::ChainStateMismatch);
        }

        Ok(())
    }

    /// Every check except the state commitment: lineage, height, proof of
    /// work, transaction root, signatures and the block reward, in that order.
    pub fn check_block(&self, candidate: &Block, predecessor: &Block) -> Result<(), ValidationError> {
        let predecessor_hash = predecessor.hash();

        // Anything may follow genesis
        if predecessor_hash != self.genesis_hash && candidate.header.prev_hash != predecessor_hash {
            return Err(ValidationError::InvalidLineage);
        }

        if predecessor.header.height.checked_add(1) != Some(candidate.header.height) {
            return Err(ValidationError::InvalidHeight);
        }

        if !self.pow.verify(&candidate.header) {
            return Err(ValidationError::DifficultyNotMet);
        }

        if transactions_root(&candidate.transactions) != candidate.header.txs_hash {
            return Err(ValidationError::TransactionRootMismatch);
        }

        if !candidate.transactions.iter().all(|tx| self.is_authentic(tx)) {
            return Err(ValidationError::InvalidTransactionSignature);
        }

        self.check_reward(candidate)
    }

    /// At most one coinbase, first in the block, tagged with the block
    /// height and within the issuance policy
    fn check_reward(&self, candidate: &Block) -> Result<(), ValidationError> {
        let height = candidate.header.height;
        let max_reward = self.issuance.max_reward(height);

        for (index, tx) in candidate.transactions.iter().enumerate() {
            if tx.is_coinbase() && (index != 0 || tx.nonce != height || tx.amount > max_reward) {
                return Err(ValidationError::InvalidBlockReward);
            }
        }

        Ok(())
    }

    /// Transactions whose signature verifies, in their original order
    pub fn filter_valid(&self, transactions: Vec<Transaction>) -> Vec<Transaction> {
        transactions
            .into_iter()
            .filter(|tx| self.is_authentic(tx))
            .collect()
    }

    fn is_authentic(&self, tx: &Transaction) -> bool {
        // Coinbase carries no signature; check_reward bounds it instead
        tx.is_coinbase() || self.signatures.verify(&tx.hash(), &tx.signature, &tx.from)
    }
}
