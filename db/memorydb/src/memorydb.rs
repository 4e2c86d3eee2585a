//! In-memory database implementation for trie nodes and code blobs.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use eth_state_transition_common::{Storage, StorageBatch, StorageError};

/// In-memory batch implementation for [`MemoryDB`].
///
/// Writes are staged locally and applied under a single write lock, so a
/// committed batch is never partially visible to readers.
#[derive(Debug)]
pub struct MemoryDBBatch {
    db: Arc<RwLock<HashMap<Vec<u8>, Vec<u8>>>>,
    writes: Vec<(Vec<u8>, Vec<u8>)>,
}

impl StorageBatch for MemoryDBBatch {
    fn put(&mut self, key: &[u8], value: &[u8]) {
        self.writes.push((key.to_vec(), value.to_vec()));
    }

    fn write(self) -> Result<(), StorageError> {
        let mut db = self.db.write();
        for (key, value) in self.writes {
            db.insert(key, value);
        }
        Ok(())
    }

    fn len(&self) -> usize {
        self.writes.len()
    }
}

/// In-memory database implementation.
///
/// Cloning is shallow; all clones share the same underlying map.
#[derive(Debug, Clone, Default)]
pub struct MemoryDB {
    db: Arc<RwLock<HashMap<Vec<u8>, Vec<u8>>>>,
}

impl MemoryDB {
    /// Creates a new empty memory database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored entries.
    pub fn len(&self) -> usize {
        self.db.read().len()
    }

    /// Checks if the database is empty.
    pub fn is_empty(&self) -> bool {
        self.db.read().is_empty()
    }

    /// Clears all entries.
    pub fn clear(&self) {
        self.db.write().clear();
    }
}

impl Storage for MemoryDB {
    type Batch = MemoryDBBatch;

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.db.read().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        self.db.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn batch(&self) -> Self::Batch {
        MemoryDBBatch {
            db: self.db.clone(),
            writes: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::keccak256;

    #[test]
    fn basic_operations() {
        let db = MemoryDB::new();
        assert!(db.is_empty());

        let data = b"test data".to_vec();
        let hash = keccak256(&data);

        db.put(hash.as_slice(), &data).unwrap();
        assert_eq!(db.len(), 1);
        assert_eq!(db.get(hash.as_slice()).unwrap(), Some(data));
        assert_eq!(db.get(b"missing").unwrap(), None);
    }

    #[test]
    fn code_store_is_namespaced() {
        let db = MemoryDB::new();
        let code = b"\x60\x01\x60\x02".to_vec();
        let hash = keccak256(&code);

        db.set_code(hash, &code).unwrap();
        assert_eq!(db.get_code(hash).unwrap(), Some(code));
        // The bare hash key must stay free for trie nodes.
        assert_eq!(db.get(hash.as_slice()).unwrap(), None);
    }

    #[test]
    fn batch_is_atomic() {
        let db = MemoryDB::new();

        let mut batch = db.batch();
        batch.put(b"k1", b"v1");
        batch.put(b"k2", b"v2");
        assert_eq!(batch.len(), 2);

        // Nothing visible before write.
        assert_eq!(db.get(b"k1").unwrap(), None);

        batch.write().unwrap();
        assert_eq!(db.get(b"k1").unwrap(), Some(b"v1".to_vec()));
        assert_eq!(db.get(b"k2").unwrap(), Some(b"v2".to_vec()));
    }

    #[test]
    fn batch_last_write_wins() {
        let db = MemoryDB::new();

        let mut batch = db.batch();
        batch.put(b"k", b"old");
        batch.put(b"k", b"new");
        batch.write().unwrap();

        assert_eq!(db.get(b"k").unwrap(), Some(b"new".to_vec()));
    }
}
