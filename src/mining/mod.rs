//! Mining module - block template assembly and nonce search

mod miner;

pub use miner::*;
