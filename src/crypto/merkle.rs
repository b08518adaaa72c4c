//! Merkle tree over ordered leaf hashes
//!
//! Leaves are combined pairwise left to right; an odd level carries its last
//! node up unchanged. Pairing it with itself instead would let a list and the
//! same list with its last leaf repeated share a root. Leaf order is part of
//! the commitment.

use super::{hash_pair, Hash};

/// Compute the merkle root of an ordered list of leaf hashes.
///
/// An empty list has the all-zero root.
pub fn compute_merkle_root(leaves: &[Hash]) -> Hash {
    let mut level: Vec<Hash> = leaves.to_vec();

    while level.len() > 1 {
        level = next_level(&level);
    }

    level.first().copied().unwrap_or_else(Hash::zero)
}

fn next_level(level: &[Hash]) -> Vec<Hash> {
    level
        .chunks(2)
        .map(|pair| match pair {
            [left, right] => hash_pair(left, right),
            [single] => *single,
            _ => unreachable!("chunks(2) yields one or two items"),
        })
        .collect()
}

/// Inclusion proof for one leaf
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleProof {
    /// Position of the leaf
    pub index: usize,
    /// Sibling hashes from leaf to root, flagged when the sibling sits on the left.
    /// Levels where the node is carried up unpaired contribute nothing.
    pub siblings: Vec<(Hash, bool)>,
}

impl MerkleProof {
    /// Check the proof against a root
    pub fn verify(&self, leaf: &Hash, root: &Hash) -> bool {
        let computed = self.siblings.iter().fold(*leaf, |current, (sibling, is_left)| {
            if *is_left {
                hash_pair(sibling, &current)
            } else {
                hash_pair(&current, sibling)
            }
        });

        computed == *root
    }
}

/// Build an inclusion proof for the leaf at `index`
pub fn build_merkle_proof(leaves: &[Hash], index: usize) -> Option<MerkleProof> {
    if index >= leaves.len() {
        return None;
    }

    let mut level: Vec<Hash> = leaves.to_vec();
    let mut position = index;
    let mut siblings = Vec::new();

    while level.len() > 1 {
        // An unpaired tail has no sibling at this level
        if let Some(sibling) = level.get(position ^ 1) {
            siblings.push((*sibling, position % 2 == 1));
        }

        level = next_level(&level);
        position /= 2;
    }

    Some(MerkleProof { index, siblings })
}
