//! Genesis block
//!
//! The genesis block is fixed: a single coinbase allocating the founder
//! supply, no predecessor, height 0. It is never validated, only trusted.

use crate::consensus::{transactions_root, Block, BlockHeader, HEADER_VERSION};
use crate::constants::{FOUNDER_TAG, GENESIS_ALLOCATION, GENESIS_DIFFICULTY, GENESIS_TIMESTAMP};
use crate::crypto::{hash_bytes, Hash};
use crate::storage::{state_hash, AccountState, ChainState};
use crate::validation::{Address, Transaction};

/// Account receiving the genesis allocation
pub fn founder_address() -> Address {
    hash_bytes(FOUNDER_TAG.as_bytes())
}

/// Ledger after the genesis block
pub fn genesis_state() -> ChainState {
    ChainState::from_accounts([(
        founder_address(),
        AccountState {
            balance: GENESIS_ALLOCATION,
            nonce: 0,
        },
    )])
}

/// Build the genesis block; identical on every call
pub fn create_genesis_block() -> Block {
    let transactions = vec![Transaction::coinbase(GENESIS_ALLOCATION, founder_address(), 0)];

    let header = BlockHeader {
        version: HEADER_VERSION,
        prev_hash: Hash::zero(),
        height: 0,
        txs_hash: transactions_root(&transactions),
        chain_state_hash: state_hash(&genesis_state()),
        timestamp: GENESIS_TIMESTAMP,
        difficulty_target: GENESIS_DIFFICULTY,
        nonce: 0,
    };

    Block::new(header, transactions)
}

pub fn genesis_hash() -> Hash {
    create_genesis_block().hash()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{block_state, merge, total_tokens};

    #[test]
    fn test_genesis_is_deterministic() {
        assert_eq!(create_genesis_block(), create_genesis_block());
        assert_eq!(genesis_hash(), create_genesis_block().hash());
    }

    #[test]
    fn test_genesis_state_matches_its_transactions() {
        let genesis = create_genesis_block();
        let derived = merge(&block_state(&genesis.transactions), &ChainState::new()).unwrap();

        assert_eq!(derived, genesis_state());
        assert_eq!(state_hash(&derived), genesis.header.chain_state_hash);
        assert_eq!(total_tokens(&derived), u128::from(GENESIS_ALLOCATION));
    }

    #[test]
    fn test_genesis_header() {
        let genesis = create_genesis_block();
        assert_eq!(genesis.height(), 0);
        assert!(genesis.prev_hash().is_zero());
        assert_eq!(genesis.header.txs_hash, transactions_root(&genesis.transactions));
    }
}
