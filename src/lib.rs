//! Chain validation and state-transition core
//!
//! Decides whether a candidate block may extend the chain and keeps the
//! account ledger that results from each accepted block. A single
//! [`node::ChainAuthority`] owns every block and head snapshot; all other
//! components are pure functions or external collaborators behind traits.

pub mod consensus;
pub mod crypto;
pub mod mining;
pub mod node;
pub mod p2p;
pub mod storage;
pub mod validation;

/// Protocol constants - hard-coded, not configurable
pub mod constants {
    /// Tokens allocated by the genesis coinbase (8 decimal places)
    pub const GENESIS_ALLOCATION: u64 = 10_000_000 * 100_000_000;

    /// Genesis timestamp (Unix seconds)
    pub const GENESIS_TIMESTAMP: u64 = 1_736_339_922;

    /// Compact target declared by genesis and required of every block by default
    pub const GENESIS_DIFFICULTY: u32 = 0x1f00ffff;

    /// Seed of the founder's address
    pub const FOUNDER_TAG: &str = "chaincore founder allocation";

    /// Coinbase amount the bundled miner pays itself
    pub const DEFAULT_BLOCK_REWARD: u64 = 50 * 100_000_000;
}
