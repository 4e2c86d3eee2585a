//! The in-memory view of an account inside a transaction journal.

use alloy_primitives::{Bytes, B256};
use alloy_trie::KECCAK_EMPTY;
use im::OrdMap;

use eth_state_transition_trie::Account;

/// One journaled storage slot.
///
/// Slots are indexed by hashed key in the journal but retain the raw key,
/// which is what commit diffs carry: the snapshot layer hashes it exactly
/// once when writing the storage trie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageSlot {
    /// The raw storage key.
    pub key: B256,
    /// The pending value; `None` marks the slot cleared.
    pub value: Option<B256>,
}

/// The mutable view of an account for the duration of one transaction.
///
/// All fields are cheap to clone: the storage journal is a persistent
/// map and the code a shared buffer, so snapshotting the enclosing
/// journal is O(1) per object.
#[derive(Debug, Clone, PartialEq)]
pub struct StateObject {
    /// The account record.
    pub account: Account,
    /// Code set during this transaction.
    pub code: Option<Bytes>,
    /// True if `code` must be flushed to the code store on commit.
    pub dirty_code: bool,
    /// True once SELFDESTRUCT hit this account.
    pub suicided: bool,
    /// True once the clean-up sweep marked this account for removal.
    pub deleted: bool,
    /// Pending storage writes, keyed by `Keccak256(raw key)`.
    pub storage: OrdMap<B256, StorageSlot>,
}

impl StateObject {
    /// Wraps an account loaded from the snapshot.
    pub fn new(account: Account) -> Self {
        Self {
            account,
            code: None,
            dirty_code: false,
            suicided: false,
            deleted: false,
            storage: OrdMap::new(),
        }
    }

    /// A fresh zero-value account.
    pub fn fresh() -> Self {
        Self::new(Account::default())
    }

    /// The EIP-161 emptiness rule: zero nonce, zero balance, no code.
    pub fn is_empty(&self) -> bool {
        self.account.nonce == 0
            && self.account.balance.is_zero()
            && self.account.code_hash == KECCAK_EMPTY
    }
}
