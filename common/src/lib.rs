//! Common traits and types for the state transition engine.
//!
//! This crate provides the storage interfaces and the commit diff types
//! that are shared between the trie layer and the transaction layer.

/// Storage traits for trie nodes and code blobs.
mod storage;
pub use storage::{code_key, Storage, StorageBatch, StorageError, CODE_PREFIX};

/// Commit diff types emitted by the transaction layer.
mod object;
pub use object::{Object, StorageEntry};
