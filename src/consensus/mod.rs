//! Consensus module - block structure, proof of work, rewards and block validation

mod block;
mod pow;
mod rewards;
mod validation;

pub use block::*;
pub use pow::*;
pub use rewards::*;
pub use validation::*;
