//! Chain state engine
//!
//! A [`ChainState`] is the account ledger after some block. Applying a block
//! happens in two pure steps: [`block_state`] turns the block's transactions
//! into a [`StateDelta`] without looking at any prior ledger, and [`merge`]
//! reconciles that delta against the predecessor's snapshot.

use std::collections::BTreeMap;
use thiserror::Error;
use crate::crypto::{hash_bytes, Hash};
use crate::validation::{Address, Transaction};

/// Ledger record of one account
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccountState {
    pub balance: u64,
    /// Number of transfers this account has sent
    pub nonce: u64,
}

/// Account ledger at a given block, keyed in address order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainState {
    accounts: BTreeMap<Address, AccountState>,
}

impl ChainState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_accounts(accounts: impl IntoIterator<Item = (Address, AccountState)>) -> Self {
        Self {
            accounts: accounts.into_iter().collect(),
        }
    }

    pub fn get(&self, address: &Address) -> Option<&AccountState> {
        self.accounts.get(address)
    }

    /// Balance of `address`, zero if unknown
    pub fn balance(&self, address: &Address) -> u64 {
        self.accounts.get(address).map_or(0, |a| a.balance)
    }

    /// Next nonce `address` must use
    pub fn nonce(&self, address: &Address) -> u64 {
        self.accounts.get(address).map_or(0, |a| a.nonce)
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Address, &AccountState)> {
        self.accounts.iter()
    }
}

/// Ledger effects of one account within a block
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountDelta {
    pub credit: u128,
    pub debit: u128,
    /// Nonces of transfers sent, in block order
    pub nonces: Vec<u64>,
}

/// Ledger effects of a whole block, independent of prior state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateDelta {
    accounts: BTreeMap<Address, AccountDelta>,
    issued: u128,
}

impl StateDelta {
    pub fn get(&self, address: &Address) -> Option<&AccountDelta> {
        self.accounts.get(address)
    }
}

/// Reasons a delta cannot be applied to a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("account {account} overdrawn: balance {balance}, credits {credit}, debits {debit}")]
    Overdraft {
        account: Address,
        balance: u64,
        credit: u128,
        debit: u128,
    },
    #[error("account {account} balance overflow")]
    BalanceOverflow { account: Address },
    #[error("account {account} nonce mismatch: expected {expected}, got {actual}")]
    InvalidNonce {
        account: Address,
        expected: u64,
        actual: u64,
    },
}

/// Derive the ledger delta of a transaction list.
///
/// Recipients are credited, senders debited and their nonces recorded;
/// coinbase amounts count as issuance.
pub fn block_state(transactions: &[Transaction]) -> StateDelta {
    let mut delta = StateDelta::default();

    for tx in transactions {
        delta.accounts.entry(tx.to).or_default().credit += u128::from(tx.amount);

        match tx.sender() {
            Some(sender) => {
                let entry = delta.accounts.entry(sender).or_default();
                entry.debit += u128::from(tx.amount);
                entry.nonces.push(tx.nonce);
            }
            None => delta.issued += u128::from(tx.amount),
        }
    }

    delta
}

/// Apply `delta` on top of `prior`, producing the descendant snapshot.
pub fn merge(delta: &StateDelta, prior: &ChainState) -> Result<ChainState, StateError> {
    let mut next = prior.clone();

    for (address, change) in &delta.accounts {
        let current = prior.get(address).copied().unwrap_or_default();

        let mut next_nonce = current.nonce;
        for &actual in &change.nonces {
            let invalid = StateError::InvalidNonce {
                account: *address,
                expected: next_nonce,
                actual,
            };
            if actual != next_nonce {
                return Err(invalid);
            }
            // The last nonce of an account can never be spent
            next_nonce = next_nonce.checked_add(1).ok_or(invalid)?;
        }

        let balance = (u128::from(current.balance) + change.credit)
            .checked_sub(change.debit)
            .ok_or(StateError::Overdraft {
                account: *address,
                balance: current.balance,
                credit: change.credit,
                debit: change.debit,
            })?;
        let balance =
            u64::try_from(balance).map_err(|_| StateError::BalanceOverflow { account: *address })?;

        next.accounts.insert(
            *address,
            AccountState {
                balance,
                nonce: next_nonce,
            },
        );
    }

    Ok(next)
}

/// Content hash of a snapshot; depends only on the account set
pub fn state_hash(state: &ChainState) -> Hash {
    let mut bytes = Vec::with_capacity(8 + state.len() * 48);
    bytes.extend_from_slice(&(state.len() as u64).to_le_bytes());
    for (address, account) in state.iter() {
        bytes.extend_from_slice(&address.0);
        bytes.extend_from_slice(&account.balance.to_le_bytes());
        bytes.extend_from_slice(&account.nonce.to_le_bytes());
    }
    hash_bytes(&bytes)
}

/// Sum of all balances
pub fn total_tokens(state: &ChainState) -> u128 {
    state.iter().map(|(_, a)| u128::from(a.balance)).sum()
}

/// New tokens a delta creates (coinbase total)
pub fn issuance(delta: &StateDelta) -> u128 {
    delta.issued
}
