//! The persistent Merkle-Patricia trie.
//!
//! A [`Trie`] is a frozen root. All mutation happens through a
//! [`TrieTxn`], which carries an epoch one above its parent trie: full
//! nodes stamped with the transaction's own epoch are rewritten in
//! place, everything older is cloned and restamped. Committing freezes
//! the transaction back into a trie that shares every untouched node
//! with its ancestors, so holding old roots costs only the changed path.

use alloy_primitives::B256;
use alloy_trie::EMPTY_ROOT_HASH;
use std::sync::Arc;
use thiserror::Error;

use eth_state_transition_common::{Storage, StorageError};

use crate::encoding::{keybytes_to_hex, prefix_len};
use crate::hasher::Hasher;
use crate::node::{decode_node, FullNode, Node};

/// Error type for trie operations.
#[derive(Debug, Error)]
pub enum TrieError {
    /// The storage backend failed
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    /// A hash reference points at a node that is not in storage
    #[error("trie node {0} is missing from storage")]
    StorageMissing(B256),
    /// A stored node failed to decode
    #[error("invalid node encoding: {0}")]
    Rlp(#[from] alloy_rlp::Error),
}

/// An immutable trie root over a storage backend.
#[derive(Debug)]
pub struct Trie<S> {
    root: Option<Node>,
    epoch: u32,
    storage: S,
}

impl<S: Clone> Clone for Trie<S> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
            epoch: self.epoch,
            storage: self.storage.clone(),
        }
    }
}

impl<S> Trie<S>
where
    S: Storage + Clone,
{
    /// Creates an empty trie.
    pub fn new(storage: S) -> Self {
        Self {
            root: None,
            epoch: 0,
            storage,
        }
    }

    /// Creates a trie over an already-decoded root node.
    pub fn from_root(storage: S, root: Node) -> Self {
        Self {
            root: Some(root),
            epoch: 0,
            storage,
        }
    }

    /// Opens a mutation transaction one epoch above this trie.
    pub fn txn(&self) -> TrieTxn<S> {
        TrieTxn {
            root: self.root.clone(),
            epoch: self.epoch + 1,
            storage: self.storage.clone(),
        }
    }

    /// Looks up a key without opening a mutable transaction.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, TrieError> {
        self.txn().lookup(key)
    }

    /// Computes the root hash without writing anything.
    pub fn hash(&self) -> B256 {
        match &self.root {
            None => EMPTY_ROOT_HASH,
            Some(root) => Hasher::<S::Batch>::new(None).hash_root(root),
        }
    }
}

/// A mutation transaction over a [`Trie`].
pub struct TrieTxn<S> {
    root: Option<Node>,
    epoch: u32,
    storage: S,
}

impl<S> TrieTxn<S>
where
    S: Storage + Clone,
{
    /// Freezes this transaction into a new trie sharing all its nodes.
    pub fn commit(self) -> Trie<S> {
        Trie {
            root: self.root,
            epoch: self.epoch,
            storage: self.storage,
        }
    }

    /// Computes the root hash without writing anything.
    pub fn hash(&mut self) -> B256 {
        match &self.root {
            None => EMPTY_ROOT_HASH,
            Some(root) => Hasher::<S::Batch>::new(None).hash_root(root),
        }
    }

    /// Computes the root hash, staging every hashed node's encoding into
    /// `batch` under its hash.
    pub fn hash_with(&mut self, batch: &mut S::Batch) -> B256 {
        match &self.root {
            None => EMPTY_ROOT_HASH,
            Some(root) => Hasher::new(Some(batch)).hash_root(root),
        }
    }

    /// Looks up `key`. Returns `None` iff no leaf matches the full key.
    pub fn lookup(&self, key: &[u8]) -> Result<Option<Vec<u8>>, TrieError> {
        self.lookup_at(self.root.clone(), &keybytes_to_hex(key))
    }

    /// Inserts `key -> value`, copying the value bytes.
    ///
    /// Node handles are cloned into the descent, so a failed resolution
    /// leaves the transaction untouched.
    pub fn insert(&mut self, key: &[u8], value: &[u8]) -> Result<(), TrieError> {
        let new_root = self.insert_at(self.root.clone(), &keybytes_to_hex(key), value)?;
        self.root = Some(new_root);
        Ok(())
    }

    /// Deletes `key`. Returns false if the key was absent and the trie
    /// was left untouched.
    pub fn delete(&mut self, key: &[u8]) -> Result<bool, TrieError> {
        let (new_root, modified) = self.delete_at(self.root.clone(), &keybytes_to_hex(key))?;
        if modified {
            self.root = new_root;
        }
        Ok(modified)
    }

    fn resolve(&self, hash: &[u8]) -> Result<Node, TrieError> {
        let h = B256::from_slice(hash);
        let data = self
            .storage
            .get(hash)?
            .ok_or(TrieError::StorageMissing(h))?;
        Ok(decode_node(Some(h), &data)?)
    }

    /// Clones a full node onto this transaction's epoch, or reuses it
    /// when it was already created here.
    fn write_node(&self, n: &Arc<FullNode>) -> Arc<FullNode> {
        if n.epoch == self.epoch {
            n.clone()
        } else {
            let mut copy = FullNode::clone(n);
            copy.epoch = self.epoch;
            Arc::new(copy)
        }
    }

    fn lookup_at(&self, node: Option<Node>, key: &[u8]) -> Result<Option<Vec<u8>>, TrieError> {
        let Some(node) = node else {
            return Ok(None);
        };
        match node {
            Node::Value(v) => {
                if v.is_hash {
                    let resolved = self.resolve(&v.buf)?;
                    return self.lookup_at(Some(resolved), key);
                }
                if key.is_empty() {
                    Ok(Some(v.buf.clone()))
                } else {
                    Ok(None)
                }
            }
            Node::Short(n) => {
                let plen = n.key.len();
                if plen > key.len() || key[..plen] != n.key[..] {
                    return Ok(None);
                }
                self.lookup_at(Some(n.child.clone()), &key[plen..])
            }
            Node::Full(n) => {
                if key.is_empty() {
                    return self.lookup_at(n.children[16].clone(), key);
                }
                self.lookup_at(n.children[key[0] as usize].clone(), &key[1..])
            }
        }
    }

    fn insert_at(
        &mut self,
        node: Option<Node>,
        search: &[u8],
        value: &[u8],
    ) -> Result<Node, TrieError> {
        let Some(node) = node else {
            if search.is_empty() {
                return Ok(Node::value(value));
            }
            return Ok(Node::short(search.to_vec(), Node::value(value)));
        };

        match node {
            Node::Value(v) => {
                if v.is_hash {
                    let resolved = self.resolve(&v.buf)?;
                    return self.insert_at(Some(resolved), search, value);
                }
                if search.is_empty() {
                    return Ok(Node::value(value));
                }
                // A value sits where the key continues; push it down into
                // a branch's value slot and keep inserting.
                let mut branch = FullNode::new(self.epoch);
                branch.children[16] = Some(Node::Value(v));
                self.insert_at(Some(Node::Full(Arc::new(branch))), search, value)
            }
            Node::Short(n) => {
                let plen = prefix_len(search, &n.key);
                if plen == n.key.len() {
                    // Full key match; extend into the child.
                    let child = self.insert_at(Some(n.child.clone()), &search[plen..], value)?;
                    return Ok(Node::short(n.key.clone(), child));
                }

                // Prefixes diverge: promote a branch at the fork nibble.
                let mut branch = FullNode::new(self.epoch);
                if n.key.len() > plen + 1 {
                    branch.set_child(
                        n.key[plen],
                        Node::short(n.key[plen + 1..].to_vec(), n.child.clone()),
                    );
                } else {
                    branch.set_child(n.key[plen], n.child.clone());
                }

                let child =
                    self.insert_at(Some(Node::Full(Arc::new(branch))), &search[plen..], value)?;
                if plen == 0 {
                    Ok(child)
                } else {
                    Ok(Node::short(search[..plen].to_vec(), child))
                }
            }
            Node::Full(n) => {
                let mut arc = self.write_node(&n);
                let full = Arc::make_mut(&mut arc);
                full.cached = std::sync::OnceLock::new();
                let idx = if search.is_empty() { 16 } else { search[0] as usize };
                let rest = if search.is_empty() { search } else { &search[1..] };
                let prev = full.children[idx].take();
                full.children[idx] = Some(self.insert_at(prev, rest, value)?);
                Ok(Node::Full(arc))
            }
        }
    }

    fn delete_at(
        &mut self,
        node: Option<Node>,
        search: &[u8],
    ) -> Result<(Option<Node>, bool), TrieError> {
        let Some(node) = node else {
            return Ok((None, false));
        };

        match node {
            Node::Value(v) => {
                if v.is_hash {
                    let resolved = self.resolve(&v.buf)?;
                    return self.delete_at(Some(resolved), search);
                }
                if search.is_empty() {
                    Ok((None, true))
                } else {
                    Ok((Some(Node::Value(v)), false))
                }
            }
            Node::Short(n) => {
                let plen = prefix_len(search, &n.key);
                if plen != n.key.len() {
                    // The short's key diverges from the search: absent.
                    return Ok((Some(Node::Short(n)), false));
                }
                if plen == search.len() {
                    // Exact match; the whole short goes away.
                    return Ok((None, true));
                }

                let (child, modified) =
                    self.delete_at(Some(n.child.clone()), &search[plen..])?;
                if !modified {
                    return Ok((Some(Node::Short(n)), false));
                }
                match child {
                    None => Ok((None, true)),
                    Some(Node::Short(c)) => {
                        // Merge consecutive shorts into one.
                        let mut key = n.key.clone();
                        key.extend_from_slice(&c.key);
                        Ok((Some(Node::short(key, c.child.clone())), true))
                    }
                    Some(other) => Ok((Some(Node::short(n.key.clone(), other)), true)),
                }
            }
            Node::Full(n) => {
                let idx = if search.is_empty() { 16 } else { search[0] as usize };
                let rest = if search.is_empty() { search } else { &search[1..] };

                let (new_child, modified) =
                    self.delete_at(n.children[idx].clone(), rest)?;
                if !modified {
                    return Ok((Some(Node::Full(n)), false));
                }

                let mut arc = self.write_node(&n);
                let full = Arc::make_mut(&mut arc);
                full.cached = std::sync::OnceLock::new();
                full.children[idx] = new_child;

                // Collapse rules: a branch with a single remaining edge
                // and no value folds into a short node.
                let mut remaining = None;
                let mut several = false;
                for (i, child) in full.children[..16].iter().enumerate() {
                    if child.is_some() {
                        if remaining.is_some() {
                            several = true;
                            break;
                        }
                        remaining = Some(i);
                    }
                }
                if remaining.is_some() && full.children[16].is_some() {
                    several = true;
                }
                if several {
                    return Ok((Some(Node::Full(arc)), true));
                }

                let Some(nibble) = remaining else {
                    // No edges left; only the value slot may survive.
                    return match full.children[16].take() {
                        None => Ok((None, true)),
                        Some(value) => Ok((Some(Node::short(vec![0x10], value)), true)),
                    };
                };

                let mut only = full.children[nibble].take().expect("checked above");
                if let Node::Value(v) = &only {
                    if v.is_hash {
                        only = self.resolve(&v.buf)?;
                    }
                }
                match only {
                    Node::Short(c) => {
                        let mut key = vec![nibble as u8];
                        key.extend_from_slice(&c.key);
                        Ok((Some(Node::short(key, c.child.clone())), true))
                    }
                    other => Ok((Some(Node::short(vec![nibble as u8], other)), true)),
                }
            }
        }
    }
}
