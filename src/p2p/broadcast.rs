//! Outbound block announcements
//!
//! The chain authority hands every accepted block to a [`PeerBroadcaster`]
//! and never waits for delivery. [`ChannelBroadcaster`] queues blocks on a
//! bounded channel drained by the transport layer.

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};
use crate::consensus::Block;

/// Default outbound queue depth
pub const BROADCAST_CAPACITY: usize = 256;

/// Fire-and-forget relay of accepted blocks to peers
pub trait PeerBroadcaster: Send + Sync {
    fn broadcast_new_block(&self, block: &Block);
}

/// Queues accepted blocks for the network task
#[derive(Debug, Clone)]
pub struct ChannelBroadcaster {
    sender: mpsc::Sender<Block>,
}

impl ChannelBroadcaster {
    /// Create the broadcaster and the receiving end for the transport
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Block>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }
}

impl PeerBroadcaster for ChannelBroadcaster {
    fn broadcast_new_block(&self, block: &Block) {
        let hash = block.hash();
        match self.sender.try_send(block.clone()) {
            Ok(()) => debug!(block = %hash, height = block.height(), "queued block for peers"),
            Err(TrySendError::Full(_)) => {
                warn!(block = %hash, "broadcast queue full, dropping announcement")
            }
            Err(TrySendError::Closed(_)) => {
                warn!(block = %hash, "broadcast channel closed, dropping announcement")
            }
        }
    }
}
