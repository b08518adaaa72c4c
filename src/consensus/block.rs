//! Block structure
//!
//! Defines the immutable block and block header structures. A block's
//! identity is the hash of its header.

use serde::{Deserialize, Serialize};
use crate::crypto::{build_merkle_proof, compute_merkle_root, hash_bytes, Hash, MerkleProof};
use crate::validation::Transaction;

/// Version of the header byte encoding
pub const HEADER_VERSION: u32 = 1;

/// Length of the header encoding
pub const HEADER_SIZE: usize = 4 + 32 + 8 + 32 + 32 + 8 + 4 + 8;

/// Block header containing all metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlockHeader {
    /// Encoding version
    pub version: u32,
    /// Hash of the predecessor's header
    pub prev_hash: Hash,
    /// Predecessor height + 1
    pub height: u64,
    /// Merkle root of the transaction payloads
    pub txs_hash: Hash,
    /// Hash of the ledger snapshot after applying this block
    pub chain_state_hash: Hash,
    /// Seconds since Unix epoch
    pub timestamp: u64,
    /// Compact difficulty target
    pub difficulty_target: u32,
    /// PoW nonce
    pub nonce: u64,
}

impl BlockHeader {
    /// Serialize the header for hashing
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_SIZE);
        bytes.extend_from_slice(&self.version.to_le_bytes());
        bytes.extend_from_slice(&self.prev_hash.0);
        bytes.extend_from_slice(&self.height.to_le_bytes());
        bytes.extend_from_slice(&self.txs_hash.0);
        bytes.extend_from_slice(&self.chain_state_hash.0);
        bytes.extend_from_slice(&self.timestamp.to_le_bytes());
        bytes.extend_from_slice(&self.difficulty_target.to_le_bytes());
        bytes.extend_from_slice(&self.nonce.to_le_bytes());
        bytes
    }

    /// Header identity
    pub fn hash(&self) -> Hash {
        hash_bytes(&self.to_bytes())
    }
}

/// A complete block containing header and transactions
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn new(header: BlockHeader, transactions: Vec<Transaction>) -> Self {
        Self { header, transactions }
    }

    /// Get the block hash
    pub fn hash(&self) -> Hash {
        self.header.hash()
    }

    pub fn height(&self) -> u64 {
        self.header.height
    }

    pub fn prev_hash(&self) -> &Hash {
        &self.header.prev_hash
    }

    /// Inclusion proof for the transaction at `index` against `txs_hash`
    pub fn transaction_proof(&self, index: usize) -> Option<MerkleProof> {
        let leaves: Vec<Hash> = self.transactions.iter().map(Transaction::hash).collect();
        build_merkle_proof(&leaves, index)
    }
}

/// Merkle root over the transactions' payload hashes, in block order
pub fn transactions_root(transactions: &[Transaction]) -> Hash {
    let leaves: Vec<Hash> = transactions.iter().map(Transaction::hash).collect();
    compute_merkle_root(&leaves)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> BlockHeader {
        BlockHeader {
            version: HEADER_VERSION,
            prev_hash: hash_bytes(b"prev"),
            height: 7,
            txs_hash: hash_bytes(b"txs"),
            chain_state_hash: hash_bytes(b"state"),
            timestamp: 1234567890,
            difficulty_target: 0x1d00ffff,
            nonce: 42,
        }
    }

    #[test]
    fn test_block_header_serialization() {
        let bytes = sample_header().to_bytes();
        assert_eq!(bytes.len(), HEADER_SIZE);
        assert_eq!(&bytes[0..4], &HEADER_VERSION.to_le_bytes());
        assert_eq!(&bytes[36..44], &7u64.to_le_bytes());
    }

    #[test]
    fn test_header_hash_is_pure() {
        assert_eq!(sample_header().hash(), sample_header().hash());
    }

    #[test]
    fn test_each_field_changes_hash() {
        let base = sample_header();
        let mutations: Vec<fn(&mut BlockHeader)> = vec![
            |h| h.version += 1,
            |h| h.prev_hash = hash_bytes(b"other"),
            |h| h.height += 1,
            |h| h.txs_hash = hash_bytes(b"other"),
            |h| h.chain_state_hash = hash_bytes(b"other"),
            |h| h.timestamp += 1,
            |h| h.difficulty_target += 1,
            |h| h.nonce += 1,
        ];

        for mutate in mutations {
            let mut changed = base.clone();
            mutate(&mut changed);
            assert_ne!(base.hash(), changed.hash());
        }
    }

    #[test]
    fn test_empty_transactions_root_is_zero() {
        assert_eq!(transactions_root(&[]), Hash::zero());
    }

    #[test]
    fn test_transaction_proof() {
        let txs: Vec<Transaction> = (0..3)
            .map(|i| Transaction::coinbase(100, hash_bytes(b"miner"), i))
            .collect();
        let root = transactions_root(&txs);
        let block = Block::new(BlockHeader { txs_hash: root, ..sample_header() }, txs);

        let proof = block.transaction_proof(2).unwrap();
        assert!(proof.verify(&block.transactions[2].hash(), &block.header.txs_hash));
        assert!(block.transaction_proof(3).is_none());
    }
}
