//! Transaction types

mod transaction;

pub use transaction::*;
