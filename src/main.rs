//! chaincore node
//!
//! Runs a single chain authority on top of the fixed genesis block and
//! mines a configured number of blocks onto it, relaying one signed
//! transfer through the pool along the way.

use anyhow::{anyhow, Context, Result};
use chaincore::consensus::{Block, BlockValidator, CompactTargetPow, FixedReward};
use chaincore::crypto::{hash_bytes, PrivateKey, SchnorrVerifier};
use chaincore::mining::{Miner, MiningResult};
use chaincore::node::{
    create_genesis_block, genesis_state, AuthorityError, AuthorityHandle, ChainAuthority, NodeConfig,
};
use chaincore::p2p::ChannelBroadcaster;
use chaincore::storage::{total_tokens, TxPool};
use chaincore::validation::Transaction;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Transactions taken from the pool per block
const MAX_BLOCK_TRANSFERS: usize = 1_000;

/// chaincore validation node
#[derive(Parser, Debug)]
#[command(name = "chaincore-node")]
#[command(about = "Block validation and chain state authority", long_about = None)]
struct Args {
    /// JSON config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Required compact difficulty target (hex with 0x prefix, or decimal)
    #[arg(long, value_parser = parse_compact)]
    difficulty: Option<u32>,

    /// Blocks to mine before exiting
    #[arg(long)]
    blocks: Option<u64>,

    /// Log filter (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

fn parse_compact(raw: &str) -> Result<u32, String> {
    match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => raw.parse(),
    }
    .map_err(|e| format!("invalid compact target {raw:?}: {e}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = NodeConfig::load(args.config.as_deref())?;
    if let Some(difficulty) = args.difficulty {
        config.difficulty = difficulty;
    }
    if let Some(blocks) = args.blocks {
        config.blocks_to_mine = blocks;
    }
    if let Some(level) = args.log_level {
        config.log_filter = level;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting chaincore node");
    tracing::info!("  Difficulty: 0x{:08x}", config.difficulty);
    tracing::info!("  Blocks to mine: {}", config.blocks_to_mine);

    let genesis = create_genesis_block();
    tracing::info!(
        genesis = %genesis.hash(),
        total_tokens = total_tokens(&genesis_state()),
        "genesis loaded"
    );

    let signatures = Arc::new(SchnorrVerifier);
    let validator = BlockValidator::new(
        genesis.hash(),
        Arc::new(CompactTargetPow::new(config.difficulty)),
        signatures.clone(),
        Arc::new(FixedReward::new(config.block_reward)),
    );
    let pool = Arc::new(TxPool::new(config.mempool_capacity, signatures));
    let (broadcaster, mut announcements) = ChannelBroadcaster::new(config.broadcast_capacity);

    let authority = ChainAuthority::new(
        genesis,
        genesis_state(),
        validator.clone(),
        pool.clone(),
        Arc::new(broadcaster),
    );
    let (handle, authority_task) = authority.spawn(config.request_capacity);

    // Stand-in for the peer transport
    tokio::spawn(async move {
        while let Some(block) = announcements.recv().await {
            tracing::debug!(block = %block.hash(), height = block.height(), "announced to peers");
        }
    });

    let miner_key = PrivateKey::generate();
    let miner = Miner::new(miner_key.public_key().address(), config.block_reward, config.difficulty);

    tokio::select! {
        result = mine(&config, &handle, &validator, &pool, &miner, &miner_key) => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received, stopping miner");
            miner.stop();
        }
    }

    match handle.stats().await {
        Ok(stats) => tracing::info!(
            height = stats.height,
            tip = %stats.tip_hash,
            blocks = stats.block_count,
            heads = stats.frontier_len,
            total_tokens = stats.total_tokens,
            "chain summary"
        ),
        Err(err @ AuthorityError::AmbiguousOrMissingHead { .. }) => return Err(err.into()),
        Err(err) => tracing::warn!("stats unavailable: {err}"),
    }

    for block in handle.all_blocks().await? {
        tracing::info!(
            height = block.height(),
            hash = %block.hash(),
            transactions = block.transactions.len(),
            "block"
        );
    }

    drop(handle);
    authority_task.await.context("chain authority task failed")?;
    Ok(())
}

/// Mine `config.blocks_to_mine` blocks through the authority
async fn mine(
    config: &NodeConfig,
    handle: &AuthorityHandle,
    validator: &BlockValidator,
    pool: &TxPool,
    miner: &Miner,
    miner_key: &PrivateKey,
) -> Result<()> {
    let num_threads = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    tracing::info!("Parallel mining on {} cores", num_threads);

    for round in 0..config.blocks_to_mine {
        let tip = handle.latest_block().await?;
        let state = handle
            .chain_state(tip.hash())
            .await?
            .ok_or_else(|| anyhow!("no ledger for head {}", tip.hash()))?;

        // Once the miner holds a reward, spend part of it
        if round > 0 {
            let address = miner_key.public_key().address();
            let amount = state.balance(&address) / 10;
            let tx = Transaction::transfer(miner_key, hash_bytes(b"demo recipient"), amount, state.nonce(&address))?;
            if let Err(err) = pool.insert(tx) {
                tracing::warn!("transfer not pooled: {err}");
            }
        }

        let pending = validator.filter_valid(pool.pending(MAX_BLOCK_TRANSFERS));
        let template = match miner.assemble_block(&tip, &state, pending) {
            Ok(template) => template,
            Err(err) => {
                tracing::warn!("pending transfers do not apply, mining empty block: {err}");
                miner.assemble_block(&tip, &state, vec![])?
            }
        };

        let Some(block) = solve(miner, template.block, num_threads).await else {
            tracing::info!("mining interrupted");
            return Ok(());
        };

        match handle.add_block(block).await {
            Ok(()) => {}
            Err(AuthorityError::Rejected { source, .. }) => {
                tracing::warn!("mined block rejected: {source}");
            }
            Err(err) => return Err(err.into()),
        }
    }

    Ok(())
}

/// Search the nonce space on `num_threads` blocking workers
async fn solve(
    miner: &Miner,
    template: Block,
    num_threads: usize,
) -> Option<Block> {
    let (tx, mut rx) = tokio::sync::mpsc::channel(num_threads);
    miner.reset();

    for i in 0..num_threads {
        let worker = miner.clone();
        let tx_worker = tx.clone();
        let mut block = template.clone();

        // Offset start nonces to avoid duplicate work
        block.header.nonce = i as u64 * (u64::MAX / num_threads as u64);

        tokio::task::spawn_blocking(move || {
            let result = worker.mine_block(block);
            let _ = tx_worker.blocking_send(result);
        });
    }

    // rx closes once every worker has reported, so no worker outlives this call
    drop(tx);

    let mut found = None;
    while let Some(result) = rx.recv().await {
        if let MiningResult::Success(block) = result {
            if found.is_none() {
                miner.stop();
                found = Some(block);
            }
        }
    }
    found
}
