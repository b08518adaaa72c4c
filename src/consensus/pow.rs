//! Proof-of-work verification
//!
//! Validation only needs a yes/no verdict per header. The compact target
//! encoding is the Bitcoin one: high byte is the exponent, low three bytes
//! the mantissa, and the target is `mantissa * 256^(exponent - 3)`.

use crate::consensus::BlockHeader;
use crate::crypto::Hash;

/// Verdict on a header's proof of work
pub trait PowVerifier: Send + Sync {
    fn verify(&self, header: &BlockHeader) -> bool;
}

/// Requires a fixed compact target and a header hash at or below it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactTargetPow {
    pub required: u32,
}

impl CompactTargetPow {
    pub fn new(required: u32) -> Self {
        Self { required }
    }
}

impl PowVerifier for CompactTargetPow {
    fn verify(&self, header: &BlockHeader) -> bool {
        header.difficulty_target == self.required
            && meets_target(&header.hash(), &compact_to_target(self.required))
    }
}

/// Expand a compact target to 256 bits, big-endian.
///
/// Negative, zero-exponent and overflowing encodings expand to the zero
/// target, which only the zero hash meets.
pub fn compact_to_target(compact: u32) -> [u8; 32] {
    let exponent = (compact >> 24) as usize;
    let mantissa = compact & 0x007F_FFFF;
    let mut target = [0u8; 32];

    if exponent == 0 || exponent > 32 || compact & 0x0080_0000 != 0 {
        return target;
    }

    if exponent <= 3 {
        let value = mantissa >> (8 * (3 - exponent));
        target[29] = (value >> 16) as u8;
        target[30] = (value >> 8) as u8;
        target[31] = value as u8;
    } else {
        let start = 32 - exponent;
        target[start] = (mantissa >> 16) as u8;
        target[start + 1] = (mantissa >> 8) as u8;
        target[start + 2] = mantissa as u8;
    }

    target
}

/// Hash, read as a big-endian integer, is at most `target`
pub fn meets_target(hash: &Hash, target: &[u8; 32]) -> bool {
    hash.0 <= *target
}
