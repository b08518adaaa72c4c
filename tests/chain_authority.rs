//! End-to-end tests driving the chain authority through its task handle

use std::sync::Arc;
use chaincore::consensus::{
    transactions_root, Block, BlockHeader, BlockValidator, CompactTargetPow, FixedReward,
    PowVerifier, ValidationError, HEADER_VERSION,
};
use chaincore::crypto::{hash_bytes, Hash, PrivateKey, SchnorrSignature, SchnorrVerifier};
use chaincore::node::{
    create_genesis_block, genesis_state, AuthorityError, AuthorityHandle, ChainAuthority,
};
use chaincore::p2p::ChannelBroadcaster;
use chaincore::storage::{
    block_state, merge, state_hash, total_tokens, AccountState, ChainState, TxPool,
};
use chaincore::validation::Transaction;
use tokio::sync::mpsc;

const EASY: u32 = 0x207fffff;
const REWARD: u64 = 50;

struct Node {
    handle: AuthorityHandle,
    pool: Arc<TxPool>,
    announcements: mpsc::Receiver<Block>,
    genesis: Block,
}

fn start(genesis: Block, state: ChainState) -> Node {
    let signatures = Arc::new(SchnorrVerifier);
    let validator = BlockValidator::new(
        genesis.hash(),
        Arc::new(CompactTargetPow::new(EASY)),
        signatures.clone(),
        Arc::new(FixedReward::new(REWARD)),
    );
    let pool = Arc::new(TxPool::new(64, signatures));
    let (broadcaster, announcements) = ChannelBroadcaster::new(16);
    let authority = ChainAuthority::new(
        genesis.clone(),
        state,
        validator,
        pool.clone(),
        Arc::new(broadcaster),
    );
    let (handle, _task) = authority.spawn(8);

    Node {
        handle,
        pool,
        announcements,
        genesis,
    }
}

/// Child of `parent` committing to `txs` merged onto `parent_state`
fn child(parent: &Block, parent_state: &ChainState, txs: Vec<Transaction>) -> Block {
    let state = merge(&block_state(&txs), parent_state).unwrap();
    let mut header = BlockHeader {
        version: HEADER_VERSION,
        prev_hash: parent.hash(),
        height: parent.height() + 1,
        txs_hash: transactions_root(&txs),
        chain_state_hash: state_hash(&state),
        timestamp: 1_750_000_000 + parent.height(),
        difficulty_target: EASY,
        nonce: 0,
    };
    let pow = CompactTargetPow::new(EASY);
    while !pow.verify(&header) {
        header.nonce += 1;
    }
    Block::new(header, txs)
}

fn remine(mut block: Block) -> Block {
    let pow = CompactTargetPow::new(EASY);
    while !pow.verify(&block.header) {
        block.header.nonce += 1;
    }
    block
}

fn funded_start(key: &PrivateKey, balance: u64) -> (Node, ChainState) {
    let state = ChainState::from_accounts([(
        key.public_key().address(),
        AccountState { balance, nonce: 0 },
    )]);
    (start(create_genesis_block(), state.clone()), state)
}

fn rejection(result: Result<(), AuthorityError>) -> ValidationError {
    result
        .unwrap_err()
        .rejection()
        .cloned()
        .expect("expected a validation rejection")
}

#[tokio::test]
async fn test_empty_block_on_genesis_accepted() {
    let node = start(create_genesis_block(), genesis_state());
    let b1 = child(&node.genesis, &genesis_state(), vec![]);

    assert_eq!(b1.header.txs_hash, Hash::zero());
    assert_eq!(b1.header.chain_state_hash, node.genesis.header.chain_state_hash);

    node.handle.add_block(b1.clone()).await.unwrap();

    assert_eq!(node.handle.latest_block().await.unwrap(), b1);
    assert_eq!(node.handle.frontier().await.unwrap(), vec![b1.hash()]);
}

#[tokio::test]
async fn test_bad_lineage_leaves_chain_untouched() {
    let node = start(create_genesis_block(), genesis_state());
    let b1 = child(&node.genesis, &genesis_state(), vec![]);
    node.handle.add_block(b1.clone()).await.unwrap();

    let mut b2 = child(&b1, &genesis_state(), vec![]);
    b2.header.prev_hash = hash_bytes(b"not b1");
    let b2 = remine(b2);

    assert_eq!(
        rejection(node.handle.add_block(b2).await),
        ValidationError::InvalidLineage
    );
    assert_eq!(node.handle.latest_block().await.unwrap(), b1);
    assert_eq!(node.handle.frontier().await.unwrap(), vec![b1.hash()]);
}

#[tokio::test]
async fn test_get_blocks_is_bounded_by_chain_depth() {
    let node = start(create_genesis_block(), genesis_state());
    let b1 = child(&node.genesis, &genesis_state(), vec![]);
    node.handle.add_block(b1.clone()).await.unwrap();

    assert_eq!(node.handle.get_blocks(b1.hash(), 1).await.unwrap(), vec![b1.clone()]);
    assert_eq!(
        node.handle.get_blocks(b1.hash(), 5).await.unwrap(),
        vec![node.genesis.clone(), b1.clone()]
    );
    assert_eq!(node.handle.all_blocks().await.unwrap(), vec![b1]);
}

#[tokio::test]
async fn test_wrong_height_rejected() {
    let node = start(create_genesis_block(), genesis_state());
    let mut b1 = child(&node.genesis, &genesis_state(), vec![]);
    b1.header.height = 2;
    let b1 = remine(b1);

    assert_eq!(
        rejection(node.handle.add_block(b1).await),
        ValidationError::InvalidHeight
    );
}

#[tokio::test]
async fn test_tampered_transaction_rejected() {
    let alice = PrivateKey::generate();
    let (node, state) = funded_start(&alice, 1_000);
    let tx = Transaction::transfer(&alice, hash_bytes(b"bob"), 10, 0).unwrap();
    let mut b1 = child(&node.genesis, &state, vec![tx]);
    b1.transactions[0].amount = 20;

    assert_eq!(
        rejection(node.handle.add_block(b1).await),
        ValidationError::TransactionRootMismatch
    );
}

#[tokio::test]
async fn test_forged_signature_rejected() {
    let alice = PrivateKey::generate();
    let (node, state) = funded_start(&alice, 1_000);
    let mut tx = Transaction::transfer(&alice, hash_bytes(b"bob"), 10, 0).unwrap();
    tx.signature = SchnorrSignature([9u8; 64]);
    let b1 = child(&node.genesis, &state, vec![tx]);

    assert_eq!(
        rejection(node.handle.add_block(b1).await),
        ValidationError::InvalidTransactionSignature
    );
}

#[tokio::test]
async fn test_wrong_state_commitment_rejected() {
    let node = start(create_genesis_block(), genesis_state());
    let mut b1 = child(&node.genesis, &genesis_state(), vec![]);
    b1.header.chain_state_hash = state_hash(&ChainState::new());
    let b1 = remine(b1);

    assert_eq!(
        rejection(node.handle.add_block(b1).await),
        ValidationError::ChainStateMismatch
    );
}

#[tokio::test]
async fn test_accepted_transfer_clears_pool_and_is_announced() {
    let alice = PrivateKey::generate();
    let (mut node, state) = funded_start(&alice, 1_000);
    let tx = Transaction::transfer(&alice, hash_bytes(b"bob"), 250, 0).unwrap();
    node.pool.insert(tx.clone()).unwrap();

    let b1 = child(&node.genesis, &state, vec![tx.clone()]);
    node.handle.add_block(b1.clone()).await.unwrap();

    assert!(!node.pool.contains(&tx.hash()));
    assert_eq!(node.announcements.recv().await.unwrap(), b1);

    let after = node.handle.chain_state(b1.hash()).await.unwrap().unwrap();
    assert_eq!(after.balance(&alice.public_key().address()), 750);
    assert_eq!(after.balance(&hash_bytes(b"bob")), 250);
    assert_eq!(total_tokens(&after), total_tokens(&state));
}

#[tokio::test]
async fn test_rejected_block_not_announced() {
    let mut node = start(create_genesis_block(), genesis_state());
    let mut b1 = child(&node.genesis, &genesis_state(), vec![]);
    b1.header.height = 5;

    assert!(node.handle.add_block(b1).await.is_err());
    assert!(node.announcements.try_recv().is_err());
}

#[tokio::test]
async fn test_two_heads_halt_latest_block() {
    let node = start(create_genesis_block(), genesis_state());
    let b1 = child(&node.genesis, &genesis_state(), vec![]);
    node.handle.add_block(b1).await.unwrap();

    // Genesis no longer heads the chain; a second child starts from an empty ledger
    let coinbase = Transaction::coinbase(5, hash_bytes(b"rival"), 1);
    let rival = child(&node.genesis, &ChainState::new(), vec![coinbase]);
    node.handle.add_block(rival).await.unwrap();

    assert_eq!(node.handle.frontier().await.unwrap().len(), 2);
    assert!(matches!(
        node.handle.latest_block().await,
        Err(AuthorityError::AmbiguousOrMissingHead { heads: 2 })
    ));
    assert!(node.handle.all_blocks().await.is_err());
}

#[tokio::test]
async fn test_display_hash_lookup() {
    let node = start(create_genesis_block(), genesis_state());
    let display = node.genesis.hash().to_hex();

    assert_eq!(
        node.handle.get_block_by_display_hash(&display).await.unwrap(),
        node.genesis
    );
    assert!(matches!(
        node.handle.get_block_by_display_hash("00").await,
        Err(AuthorityError::BlockNotFound(_))
    ));
}

#[tokio::test]
async fn test_unbounded_coinbase_rejected() {
    let node = start(create_genesis_block(), genesis_state());
    let txs = vec![
        Transaction::coinbase(u64::MAX / 2, hash_bytes(b"minter"), 1),
        Transaction::coinbase(u64::MAX / 4, hash_bytes(b"second minter"), 1),
    ];
    let b1 = child(&node.genesis, &genesis_state(), txs);

    assert_eq!(
        rejection(node.handle.add_block(b1).await),
        ValidationError::InvalidBlockReward
    );
    let stats = node.handle.stats().await.unwrap();
    assert_eq!(stats.height, 0);
    assert_eq!(stats.total_tokens, total_tokens(&genesis_state()));
}

#[tokio::test]
async fn test_reward_at_cap_accepted() {
    let node = start(create_genesis_block(), genesis_state());
    let b1 = child(
        &node.genesis,
        &genesis_state(),
        vec![Transaction::coinbase(REWARD, hash_bytes(b"miner"), 1)],
    );

    node.handle.add_block(b1).await.unwrap();
    assert_eq!(
        node.handle.stats().await.unwrap().total_tokens,
        total_tokens(&genesis_state()) + u128::from(REWARD)
    );
}

#[tokio::test]
async fn test_repeated_last_transaction_fails_root() {
    let alice = PrivateKey::generate();
    let (node, state) = funded_start(&alice, 1_000);
    let txs: Vec<Transaction> = (0..3)
        .map(|n| Transaction::transfer(&alice, hash_bytes(b"bob"), 5, n).unwrap())
        .collect();
    let mut b1 = child(&node.genesis, &state, txs);
    let last = b1.transactions[2].clone();
    b1.transactions.push(last);

    assert_eq!(
        rejection(node.handle.add_block(b1).await),
        ValidationError::TransactionRootMismatch
    );
    assert_eq!(node.handle.frontier().await.unwrap(), vec![node.genesis.hash()]);
}
