//! Chain authority task
//!
//! [`ChainAuthority::spawn`] moves the authority into its own task; every
//! other component talks to it through a cloneable [`AuthorityHandle`].
//! Requests are served strictly in arrival order, so additions never
//! interleave and reads see either all or none of an addition.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use crate::consensus::Block;
use crate::crypto::Hash;
use crate::node::{AuthorityError, ChainAuthority, ChainStats};
use crate::storage::ChainState;

type Reply<T> = oneshot::Sender<T>;

enum Request {
    LatestBlock(Reply<Result<Block, AuthorityError>>),
    GetBlock(Hash, Reply<Result<Block, AuthorityError>>),
    GetBlockByDisplayHash(String, Reply<Result<Block, AuthorityError>>),
    ChainState(Hash, Reply<Option<ChainState>>),
    AddBlock(Box<Block>, Reply<Result<(), AuthorityError>>),
    GetBlocks(Hash, usize, Reply<Vec<Block>>),
    AllBlocks(Reply<Result<Vec<Block>, AuthorityError>>),
    Stats(Reply<Result<ChainStats, AuthorityError>>),
    Frontier(Reply<Vec<Hash>>),
}

impl ChainAuthority {
    /// Run the authority on a dedicated task with a request queue of
    /// `capacity`. The task ends once every handle is dropped.
    pub fn spawn(self, capacity: usize) -> (AuthorityHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let task = tokio::spawn(self.run(receiver));
        (AuthorityHandle { sender }, task)
    }

    async fn run(mut self, mut requests: mpsc::Receiver<Request>) {
        while let Some(request) = requests.recv().await {
            self.serve(request);
        }
        info!("chain authority stopped");
    }

    fn serve(&mut self, request: Request) {
        // A caller that gave up waiting is not an error
        let delivered = match request {
            Request::LatestBlock(reply) => reply.send(self.latest_block()).is_ok(),
            Request::GetBlock(hash, reply) => reply.send(self.get_block(&hash)).is_ok(),
            Request::GetBlockByDisplayHash(display, reply) => {
                reply.send(self.get_block_by_display_hash(&display)).is_ok()
            }
            Request::ChainState(hash, reply) => reply.send(self.chain_state(&hash)).is_ok(),
            Request::AddBlock(block, reply) => reply.send(self.add_block(*block)).is_ok(),
            Request::GetBlocks(start, count, reply) => {
                reply.send(self.get_blocks(&start, count)).is_ok()
            }
            Request::AllBlocks(reply) => reply.send(self.all_blocks()).is_ok(),
            Request::Stats(reply) => reply.send(self.stats()).is_ok(),
            Request::Frontier(reply) => reply.send(self.frontier()).is_ok(),
        };

        if !delivered {
            debug!("requester dropped before reply");
        }
    }
}

/// Client side of the chain authority task
#[derive(Debug, Clone)]
pub struct AuthorityHandle {
    sender: mpsc::Sender<Request>,
}

impl AuthorityHandle {
    async fn call<T>(&self, request: impl FnOnce(Reply<T>) -> Request) -> Result<T, AuthorityError> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(request(reply))
            .await
            .map_err(|_| AuthorityError::Unavailable)?;
        response.await.map_err(|_| AuthorityError::Unavailable)
    }

    pub async fn latest_block(&self) -> Result<Block, AuthorityError> {
        self.call(Request::LatestBlock).await?
    }

    pub async fn get_block(&self, hash: Hash) -> Result<Block, AuthorityError> {
        self.call(|reply| Request::GetBlock(hash, reply)).await?
    }

    pub async fn get_block_by_display_hash(&self, display: &str) -> Result<Block, AuthorityError> {
        let display = display.to_string();
        self.call(|reply| Request::GetBlockByDisplayHash(display, reply))
            .await?
    }

    pub async fn chain_state(&self, hash: Hash) -> Result<Option<ChainState>, AuthorityError> {
        self.call(|reply| Request::ChainState(hash, reply)).await
    }

    /// Submit a candidate; resolves once it is accepted or rejected
    pub async fn add_block(&self, block: Block) -> Result<(), AuthorityError> {
        self.call(|reply| Request::AddBlock(Box::new(block), reply))
            .await?
    }

    pub async fn get_blocks(&self, start: Hash, count: usize) -> Result<Vec<Block>, AuthorityError> {
        self.call(|reply| Request::GetBlocks(start, count, reply)).await
    }

    pub async fn all_blocks(&self) -> Result<Vec<Block>, AuthorityError> {
        self.call(Request::AllBlocks).await?
    }

    pub async fn stats(&self) -> Result<ChainStats, AuthorityError> {
        self.call(Request::Stats).await?
    }

    pub async fn frontier(&self) -> Result<Vec<Hash>, AuthorityError> {
        self.call(Request::Frontier).await
    }
}
