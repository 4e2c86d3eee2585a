//! In-memory storage backend.
//!
//! Backs the engine's tests and any host that does not need persistence.

pub mod memorydb;

pub use memorydb::{MemoryDB, MemoryDBBatch};
