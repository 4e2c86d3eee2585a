//! Storage traits for trie nodes and code blobs.

use alloy_primitives::B256;
use auto_impl::auto_impl;
use thiserror::Error;

/// Key namespace for contract code blobs.
///
/// Code entries are stored under `b"code" || code_hash` so that they never
/// collide with trie nodes, which are keyed by their bare 32-byte hash.
pub const CODE_PREFIX: &[u8] = b"code";

/// Builds the storage key for a code blob.
pub fn code_key(code_hash: B256) -> Vec<u8> {
    let mut key = Vec::with_capacity(CODE_PREFIX.len() + 32);
    key.extend_from_slice(CODE_PREFIX);
    key.extend_from_slice(code_hash.as_slice());
    key
}

/// Error type for storage backend operations.
///
/// A lookup that finds nothing is not an error; backends return `Ok(None)`
/// for missing keys and reserve this type for genuine backend faults.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend reported a failure
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// A write batch that is applied atomically.
///
/// Entries staged with `put` become visible all at once when `write` is
/// called; there is no partial visibility.
pub trait StorageBatch {
    /// Stages a key/value write. The value is copied.
    fn put(&mut self, key: &[u8], value: &[u8]);

    /// Applies every staged write atomically.
    fn write(self) -> Result<(), StorageError>;

    /// Returns the number of staged writes.
    fn len(&self) -> usize;

    /// Returns true if no writes are staged.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Byte-keyed key/value storage with batching and a code blob store.
#[auto_impl(&, Arc)]
pub trait Storage {
    /// The batch type produced by this backend.
    type Batch: StorageBatch;

    /// Gets a value by key. Returns `None` if the key is absent.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError>;

    /// Puts a value under a key. The value is copied.
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StorageError>;

    /// Creates an empty write batch.
    fn batch(&self) -> Self::Batch;

    /// Stores a code blob under its hash.
    fn set_code(&self, code_hash: B256, code: &[u8]) -> Result<(), StorageError> {
        self.put(&code_key(code_hash), code)
    }

    /// Gets a code blob by its hash.
    fn get_code(&self, code_hash: B256) -> Result<Option<Vec<u8>>, StorageError> {
        self.get(&code_key(code_hash))
    }
}
