//! Commit diff types.
//!
//! An [`Object`] is the serializable diff for one touched account, produced
//! when a transaction journal is committed and consumed by the snapshot
//! layer, which folds the diffs into the state trie.

use alloy_primitives::{Address, Bytes, B256, U256};

/// A single storage slot change carried by an [`Object`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEntry {
    /// The raw (unhashed) storage key. The snapshot layer hashes it once
    /// when folding the entry into the account's storage trie.
    pub key: B256,
    /// The new 32-byte value, or `None` for a tombstone (slot cleared).
    pub value: Option<B256>,
}

impl StorageEntry {
    /// Returns true if this entry clears the slot.
    pub fn is_deleted(&self) -> bool {
        self.value.is_none()
    }
}

/// The serializable diff emitted for one touched account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Object {
    /// The account address.
    pub address: Address,
    /// The post-transaction nonce.
    pub nonce: u64,
    /// The post-transaction balance.
    pub balance: U256,
    /// The storage root the account had *before* this transaction. The
    /// snapshot layer opens the storage trie at this root and applies the
    /// entries below to derive the new root.
    pub storage_root: B256,
    /// Hash of the account's code.
    pub code_hash: B256,
    /// True if the account is to be removed from the state trie.
    pub deleted: bool,
    /// True if `code` was set during this transaction and must be flushed
    /// to the code store on commit.
    pub dirty_code: bool,
    /// The new code, present iff `dirty_code`.
    pub code: Option<Bytes>,
    /// Storage slot changes, in a deterministic per-account order.
    pub storage: Vec<StorageEntry>,
}
