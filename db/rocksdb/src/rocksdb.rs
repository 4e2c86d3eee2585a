//! RocksDB-backed storage implementation.

use std::path::Path;
use std::sync::Arc;

use rocksdb::{Options, WriteBatch, DB};
use tracing::trace;

use eth_state_transition_common::{Storage, StorageBatch, StorageError};

/// Configuration for the RocksDB backend.
#[derive(Debug, Clone)]
pub struct RocksDBConfig {
    /// Maximum number of open files. `-1` means unlimited.
    pub max_open_files: i32,
    /// Size of a single memtable in bytes.
    pub write_buffer_size: usize,
    /// Create the database if it does not exist.
    pub create_if_missing: bool,
}

impl Default for RocksDBConfig {
    fn default() -> Self {
        Self {
            max_open_files: -1,
            write_buffer_size: 64 * 1024 * 1024,
            create_if_missing: true,
        }
    }
}

/// Write batch for [`RocksDB`], applied atomically through RocksDB's
/// native `WriteBatch`.
pub struct RocksDBBatch {
    db: Arc<DB>,
    batch: WriteBatch,
    staged: usize,
}

impl StorageBatch for RocksDBBatch {
    fn put(&mut self, key: &[u8], value: &[u8]) {
        self.batch.put(key, value);
        self.staged += 1;
    }

    fn write(self) -> Result<(), StorageError> {
        trace!(target: "rocksdb", writes = self.staged, "committing write batch");
        self.db
            .write(self.batch)
            .map_err(|e| StorageError::Backend(e.to_string()))
    }

    fn len(&self) -> usize {
        self.staged
    }
}

/// RocksDB storage implementation.
///
/// Cloning is shallow; all clones share the same database handle. The
/// handle and its resources are released when the last clone is dropped.
#[derive(Clone)]
pub struct RocksDB {
    db: Arc<DB>,
}

impl std::fmt::Debug for RocksDB {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RocksDB").field("path", &self.db.path()).finish()
    }
}

impl RocksDB {
    /// Opens (or creates) a database at `path` with the given configuration.
    pub fn open(path: impl AsRef<Path>, config: RocksDBConfig) -> Result<Self, StorageError> {
        let mut opts = Options::default();
        opts.set_max_open_files(config.max_open_files);
        opts.set_write_buffer_size(config.write_buffer_size);
        opts.create_if_missing(config.create_if_missing);

        let db = DB::open(&opts, path).map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(Self { db: Arc::new(db) })
    }

    /// Opens a database at `path` with the default configuration.
    pub fn open_default(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        Self::open(path, RocksDBConfig::default())
    }
}

impl Storage for RocksDB {
    type Batch = RocksDBBatch;

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        self.db
            .get(key)
            .map_err(|e| StorageError::Backend(e.to_string()))
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        self.db
            .put(key, value)
            .map_err(|e| StorageError::Backend(e.to_string()))
    }

    fn batch(&self) -> Self::Batch {
        RocksDBBatch {
            db: self.db.clone(),
            batch: WriteBatch::default(),
            staged: 0,
        }
    }
}
