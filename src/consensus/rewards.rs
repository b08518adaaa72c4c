//! Block reward policy
//!
//! Coinbase transactions carry no signature, so the only thing limiting
//! new supply is the policy the validator consults here.

/// Upper bound on the coinbase amount at a given height
pub trait IssuancePolicy: Send + Sync {
    fn max_reward(&self, height: u64) -> u64;
}

/// The same reward at every height above genesis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedReward {
    pub reward: u64,
}

impl FixedReward {
    pub fn new(reward: u64) -> Self {
        Self { reward }
    }
}

impl IssuancePolicy for FixedReward {
    fn max_reward(&self, height: u64) -> u64 {
        // Genesis allocation is trusted, never mined
        if height == 0 {
            0
        } else {
            self.reward
        }
    }
}
