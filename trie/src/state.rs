//! Root-indexed state layer.
//!
//! A [`State`] owns a storage backend and a bounded LRU of loaded tries,
//! keyed by root hash, so historical roots stay reachable without
//! re-reading their paths. A [`Snapshot`] is a read handle onto one root
//! plus the commit pipeline that folds [`Object`] diffs into a new root.

use alloy_primitives::{keccak256, Address, B256};
use alloy_rlp::Encodable;
use alloy_trie::EMPTY_ROOT_HASH;
use parking_lot::Mutex;
use schnellru::{ByLength, LruMap};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use eth_state_transition_common::{Object, Storage, StorageBatch, StorageError};

use crate::account::Account;
use crate::node::decode_node;
use crate::rlp_raw;
use crate::trie::{Trie, TrieError};

/// Capacity of the root → trie LRU.
const STATE_CACHE_SIZE: u32 = 128;

/// Error type for the state layer.
#[derive(Debug, Error)]
pub enum StateError {
    /// Trie operation failed
    #[error(transparent)]
    Trie(#[from] TrieError),
    /// The storage backend failed
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    /// No state exists at the requested root
    #[error("state not found at root {0}")]
    StateNotFound(B256),
    /// A state trie leaf did not decode as an account
    #[error("invalid account data")]
    InvalidAccount,
    /// A storage trie leaf did not decode as a value
    #[error("invalid storage data")]
    InvalidStorage,
}

#[derive(Debug)]
struct StateInner<S> {
    storage: S,
    cache: Mutex<LruMap<B256, Trie<S>, ByLength>>,
}

/// A storage backend plus a bounded cache of loaded tries.
///
/// Cloning is shallow; clones share the cache.
#[derive(Debug)]
pub struct State<S> {
    inner: Arc<StateInner<S>>,
}

impl<S> Clone for State<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S> State<S>
where
    S: Storage + Clone,
{
    /// Creates a state layer over `storage`.
    pub fn new(storage: S) -> Self {
        Self {
            inner: Arc::new(StateInner {
                storage,
                cache: Mutex::new(LruMap::new(ByLength::new(STATE_CACHE_SIZE))),
            }),
        }
    }

    /// Stores a code blob under its hash.
    pub fn set_code(&self, code_hash: B256, code: &[u8]) -> Result<(), StateError> {
        Ok(self.inner.storage.set_code(code_hash, code)?)
    }

    /// Gets a code blob by its hash.
    pub fn get_code(&self, code_hash: B256) -> Result<Option<Vec<u8>>, StateError> {
        Ok(self.inner.storage.get_code(code_hash)?)
    }

    /// Opens a snapshot over the empty root.
    pub fn new_snapshot(&self) -> Snapshot<S> {
        Snapshot {
            state: self.clone(),
            trie: Trie::new(self.inner.storage.clone()),
        }
    }

    /// Opens a snapshot at `root`: the empty snapshot for the empty-trie
    /// hash, a cached trie when one is loaded, or the root node decoded
    /// from storage.
    pub fn new_snapshot_at(&self, root: B256) -> Result<Snapshot<S>, StateError> {
        if root == EMPTY_ROOT_HASH {
            return Ok(self.new_snapshot());
        }

        if let Some(trie) = self.inner.cache.lock().get(&root) {
            return Ok(Snapshot {
                state: self.clone(),
                trie: trie.clone(),
            });
        }

        let data = self
            .inner
            .storage
            .get(root.as_slice())?
            .ok_or(StateError::StateNotFound(root))?;
        let node = decode_node(Some(root), &data)
            .map_err(|e| StateError::Trie(TrieError::Rlp(e)))?;
        let trie = Trie::from_root(self.inner.storage.clone(), node);
        self.add_state(root, trie.clone());
        Ok(Snapshot {
            state: self.clone(),
            trie,
        })
    }

    /// Registers a loaded trie under its root, evicting the LRU tail on
    /// overflow.
    pub fn add_state(&self, root: B256, trie: Trie<S>) {
        self.inner.cache.lock().insert(root, trie);
    }
}

/// A read handle onto one state root.
#[derive(Debug)]
pub struct Snapshot<S> {
    state: State<S>,
    trie: Trie<S>,
}

impl<S> Clone for Snapshot<S>
where
    S: Clone,
{
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            trie: self.trie.clone(),
        }
    }
}

impl<S> Snapshot<S>
where
    S: Storage + Clone,
{
    /// Gets a code blob by its hash.
    pub fn get_code(&self, code_hash: B256) -> Result<Option<Vec<u8>>, StateError> {
        self.state.get_code(code_hash)
    }

    /// Gets the account stored under `Keccak256(address)`, if any.
    pub fn get_account(&self, address: Address) -> Result<Option<Account>, StateError> {
        let key = keccak256(address);
        let Some(data) = self.trie.get(key.as_slice())? else {
            return Ok(None);
        };
        Account::from_rlp(&data)
            .map(Some)
            .map_err(|_| StateError::InvalidAccount)
    }

    /// Reads a storage slot from the trie rooted at `storage_root`.
    ///
    /// The slot is keyed by `Keccak256(raw_key)` and stored as an RLP
    /// byte string with leading zeros stripped. Missing keys and missing
    /// roots both read as zero.
    pub fn get_storage(&self, storage_root: B256, raw_key: B256) -> Result<B256, StateError> {
        let snapshot = if storage_root == EMPTY_ROOT_HASH {
            self.state.new_snapshot()
        } else {
            match self.state.new_snapshot_at(storage_root) {
                Ok(snapshot) => snapshot,
                Err(StateError::StateNotFound(_)) => return Ok(B256::ZERO),
                Err(e) => return Err(e),
            }
        };

        let key = keccak256(raw_key);
        let Some(enc) = snapshot.trie.get(key.as_slice())? else {
            return Ok(B256::ZERO);
        };
        if enc.is_empty() {
            return Ok(B256::ZERO);
        }
        let (_, content, _) = rlp_raw::split(&enc).map_err(|_| StateError::InvalidStorage)?;
        if content.len() > 32 {
            return Err(StateError::InvalidStorage);
        }
        Ok(B256::left_padding_from(content))
    }

    /// Folds commit diffs into the trie and returns the successor
    /// snapshot along with the new state root.
    ///
    /// Per-account storage tries are rebuilt from each object's prior
    /// storage root, values are committed as zero-trimmed RLP strings,
    /// dirty code is flushed to the code store, and every touched trie
    /// node lands in a single batch that is written atomically at the
    /// end.
    pub fn commit(&self, objects: &[Object]) -> Result<(Snapshot<S>, B256), StateError> {
        let mut batch = self.state.inner.storage.batch();
        let mut txn = self.trie.txn();

        for obj in objects {
            let hashed_address = keccak256(obj.address);
            if obj.deleted {
                txn.delete(hashed_address.as_slice())?;
                continue;
            }

            let mut account = Account {
                nonce: obj.nonce,
                balance: obj.balance,
                storage_root: obj.storage_root,
                code_hash: obj.code_hash,
            };

            if !obj.storage.is_empty() {
                let local = if obj.storage_root == EMPTY_ROOT_HASH {
                    self.state.new_snapshot()
                } else {
                    self.state.new_snapshot_at(obj.storage_root)?
                };
                let mut local_txn = local.trie.txn();

                for entry in &obj.storage {
                    let key = keccak256(entry.key);
                    match &entry.value {
                        None => {
                            local_txn.delete(key.as_slice())?;
                        }
                        Some(value) => {
                            let trimmed = trim_leading_zeros(value.as_slice());
                            let mut enc = Vec::with_capacity(trimmed.len() + 1);
                            trimmed.encode(&mut enc);
                            local_txn.insert(key.as_slice(), &enc)?;
                        }
                    }
                }

                let storage_root = local_txn.hash_with(&mut batch);
                let storage_trie = local_txn.commit();
                self.state.add_state(storage_root, storage_trie);
                account.storage_root = storage_root;
            }

            if obj.dirty_code {
                if let Some(code) = &obj.code {
                    self.state.set_code(account.code_hash, code)?;
                }
            }

            txn.insert(hashed_address.as_slice(), &account.to_rlp())?;
        }

        let root = txn.hash_with(&mut batch);
        let trie = txn.commit();
        batch.write()?;
        self.state.add_state(root, trie.clone());

        debug!(target: "state", objects = objects.len(), root = %root, "committed state");

        Ok((
            Snapshot {
                state: self.state.clone(),
                trie,
            },
            root,
        ))
    }
}

fn trim_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}
