//! Account transfer transactions
//!
//! A transaction moves `amount` from the account owned by `from` to the
//! account `to`. The payload is everything except the signature; it is what
//! gets signed and what the block's merkle root commits to.

use serde::{Deserialize, Serialize};
use crate::crypto::{hash_bytes, Hash, PrivateKey, PublicKey, SchnorrSignature, SignatureError};

/// Account identity: BLAKE3 hash of the owner's public key
pub type Address = Hash;

/// Size of the fixed payload encoding
pub const PAYLOAD_SIZE: usize = 32 + 32 + 8 + 8;

/// A signed transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Sender's public key (all-zero for coinbase)
    pub from: PublicKey,
    /// Recipient address
    pub to: Address,
    /// Amount in base units
    pub amount: u64,
    /// Sender's account nonce; block height for coinbase
    pub nonce: u64,
    /// Signature over the payload hash
    pub signature: SchnorrSignature,
}

impl Transaction {
    /// Build and sign a transfer
    pub fn transfer(
        key: &PrivateKey,
        to: Address,
        amount: u64,
        nonce: u64,
    ) -> Result<Self, SignatureError> {
        let mut tx = Self {
            from: key.public_key(),
            to,
            amount,
            nonce,
            signature: SchnorrSignature::empty(),
        };
        tx.signature = key.sign(&tx.hash())?;
        Ok(tx)
    }

    /// Create a coinbase transaction issuing `amount` new tokens
    pub fn coinbase(amount: u64, to: Address, height: u64) -> Self {
        Self {
            from: PublicKey::zero(),
            to,
            amount,
            nonce: height,
            signature: SchnorrSignature::empty(),
        }
    }

    pub fn is_coinbase(&self) -> bool {
        self.from.is_zero()
    }

    /// Sender's account address, `None` for coinbase
    pub fn sender(&self) -> Option<Address> {
        if self.is_coinbase() {
            None
        } else {
            Some(self.from.address())
        }
    }

    /// Fixed-order payload encoding (signature excluded)
    pub fn payload_bytes(&self) -> [u8; PAYLOAD_SIZE] {
        let mut bytes = [0u8; PAYLOAD_SIZE];
        bytes[0..32].copy_from_slice(&self.from.0);
        bytes[32..64].copy_from_slice(&self.to.0);
        bytes[64..72].copy_from_slice(&self.amount.to_le_bytes());
        bytes[72..80].copy_from_slice(&self.nonce.to_le_bytes());
        bytes
    }

    /// Payload hash: the signed message and the merkle leaf
    pub fn hash(&self) -> Hash {
        hash_bytes(&self.payload_bytes())
    }
}
