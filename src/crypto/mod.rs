//! Cryptography module - BLAKE3 hashing, Schnorr signatures, Merkle trees

mod hash;
mod merkle;
mod schnorr;

pub use hash::*;
pub use merkle::*;
pub use schnorr::*;
