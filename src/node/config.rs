//! Node configuration

use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use crate::constants::{DEFAULT_BLOCK_REWARD, GENESIS_DIFFICULTY};
use crate::p2p::BROADCAST_CAPACITY;
use crate::storage::TXPOOL_CAPACITY;

/// Queue depth of the chain authority's request channel
pub const REQUEST_CAPACITY: usize = 1_024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Node configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Compact target every non-genesis block must declare and meet
    pub difficulty: u32,
    /// Pending requests the chain authority queues before callers wait
    pub request_capacity: usize,
    pub mempool_capacity: usize,
    /// Accepted blocks buffered for peers before announcements are dropped
    pub broadcast_capacity: usize,
    /// Blocks the bundled miner produces before exiting
    pub blocks_to_mine: u64,
    pub block_reward: u64,
    /// `tracing` filter used when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            difficulty: GENESIS_DIFFICULTY,
            request_capacity: REQUEST_CAPACITY,
            mempool_capacity: TXPOOL_CAPACITY,
            broadcast_capacity: BROADCAST_CAPACITY,
            blocks_to_mine: 3,
            block_reward: DEFAULT_BLOCK_REWARD,
            log_filter: "info".to_string(),
        }
    }
}

impl NodeConfig {
    /// Read a JSON config file; missing fields take their defaults.
    /// Without a path the defaults are returned.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&raw).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }
}
