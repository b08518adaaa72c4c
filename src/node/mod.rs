//! Node module - genesis, the chain authority and its configuration

mod authority;
mod config;
mod genesis;
mod handle;

pub use authority::*;
pub use config::*;
pub use genesis::*;
pub use handle::*;
