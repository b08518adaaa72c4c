//! In-memory transaction pool
//!
//! Holds signed transfers waiting for block inclusion, in arrival order.
//! The chain authority only depends on the [`Mempool`] removal contract.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::debug;
use crate::crypto::{Hash, SignatureVerifier};
use crate::validation::Transaction;

/// Default pool capacity
pub const TXPOOL_CAPACITY: usize = 10_000;

/// Removal contract used when a block is accepted
pub trait Mempool: Send + Sync {
    fn remove(&self, tx: &Transaction);
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("transaction {0} already pooled")]
    Duplicate(Hash),
    #[error("pool full ({0} transactions)")]
    Full(usize),
    #[error("transaction {0} has an invalid signature")]
    InvalidSignature(Hash),
    #[error("coinbase transactions are not pooled")]
    Coinbase,
}

#[derive(Default)]
struct PoolInner {
    transactions: HashMap<Hash, Transaction>,
    order: Vec<Hash>,
}

/// Thread-safe pool of pending transfers
pub struct TxPool {
    inner: Mutex<PoolInner>,
    capacity: usize,
    verifier: Arc<dyn SignatureVerifier>,
}

impl TxPool {
    pub fn new(capacity: usize, verifier: Arc<dyn SignatureVerifier>) -> Self {
        Self {
            inner: Mutex::new(PoolInner::default()),
            capacity,
            verifier,
        }
    }

    fn lock(&self) -> MutexGuard<'_, PoolInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Admit a signed transfer
    pub fn insert(&self, tx: Transaction) -> Result<(), PoolError> {
        if tx.is_coinbase() {
            return Err(PoolError::Coinbase);
        }
        let hash = tx.hash();
        if !self.verifier.verify(&hash, &tx.signature, &tx.from) {
            return Err(PoolError::InvalidSignature(hash));
        }

        let mut inner = self.lock();
        if inner.transactions.contains_key(&hash) {
            return Err(PoolError::Duplicate(hash));
        }
        if inner.transactions.len() >= self.capacity {
            return Err(PoolError::Full(self.capacity));
        }

        inner.order.push(hash);
        inner.transactions.insert(hash, tx);
        Ok(())
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.lock().transactions.contains_key(hash)
    }

    pub fn len(&self) -> usize {
        self.lock().transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Up to `limit` transactions in arrival order
    pub fn pending(&self, limit: usize) -> Vec<Transaction> {
        let inner = self.lock();
        inner
            .order
            .iter()
            .filter_map(|hash| inner.transactions.get(hash).cloned())
            .take(limit)
            .collect()
    }
}

impl Mempool for TxPool {
    fn remove(&self, tx: &Transaction) {
        let hash = tx.hash();
        let mut inner = self.lock();
        if inner.transactions.remove(&hash).is_some() {
            inner.order.retain(|h| *h != hash);
            debug!(tx = %hash, "removed confirmed transaction from pool");
        }
    }
}
