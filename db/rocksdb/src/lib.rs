//! RocksDB storage backend.
//!
//! Persistent counterpart of the in-memory backend, sharing the same key
//! layout: trie nodes under their bare 32-byte hash, code blobs under
//! `b"code" || code_hash`.

pub mod rocksdb;

pub use crate::rocksdb::{RocksDB, RocksDBBatch, RocksDBConfig};
