//! Persistent Merkle-Patricia trie and the root-indexed state layer.
//!
//! The trie is immutable in the structural-sharing sense: every mutation
//! goes through a [`TrieTxn`] and committing returns a new [`Trie`] root
//! while old roots remain readable. A [`State`] caches loaded tries by
//! root hash and hands out [`Snapshot`]s, which fold commit diffs back
//! into the trie.

/// Account record stored at state trie leaves.
pub mod account;
/// Hex-nibble and compact (hex-prefix) key codecs.
pub mod encoding;
/// Recursive node hashing and batch collection.
mod hasher;
/// Trie node variants and their RLP codec.
pub mod node;
/// Raw RLP splitting helpers.
pub mod rlp_raw;
/// Root-indexed state layer.
pub mod state;
/// The trie itself.
pub mod trie;

pub use account::Account;
pub use node::Node;
pub use state::{Snapshot, State, StateError};
pub use trie::{Trie, TrieError, TrieTxn};

pub use alloy_trie::{EMPTY_ROOT_HASH, KECCAK_EMPTY};
