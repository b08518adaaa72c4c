//! Storage module - chain state engine and transaction pool

mod state;
mod txpool;

pub use state::*;
pub use txpool::*;
