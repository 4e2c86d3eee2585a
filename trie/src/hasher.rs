//! Recursive node hashing.
//!
//! A node's reference is its RLP encoding when that is shorter than 32
//! bytes, and the keccak hash of the encoding otherwise. The root is
//! always hashed. When a batch is attached, every hashed node's encoding
//! is staged under its hash; references are then also installed in the
//! node caches, so unchanged subtrees terminate the next walk early.
//! Without a batch the walk is a pure computation and caches are only
//! read, never written: a node may only cache a reference whose encoding
//! is already in (or staged for) storage.

use alloy_primitives::{keccak256, B256};
use alloy_rlp::{Encodable, Header, EMPTY_STRING_CODE};

use eth_state_transition_common::StorageBatch;

use crate::encoding::hex_to_compact;
use crate::node::{FullNode, Node, NodeRef, ShortNode};

pub(crate) struct Hasher<'a, B: StorageBatch> {
    batch: Option<&'a mut B>,
}

impl<'a, B: StorageBatch> Hasher<'a, B> {
    pub(crate) fn new(batch: Option<&'a mut B>) -> Self {
        Self { batch }
    }

    /// Computes the root hash of `node`.
    pub(crate) fn hash_root(&mut self, node: &Node) -> B256 {
        let r = self.node_ref(node, true);
        B256::from_slice(&r)
    }

    /// Returns the reference of `node`, staging its encoding if a batch
    /// is attached. `force` hashes (and stores) the node even when its
    /// encoding is inline-sized; it is set for the root only.
    fn node_ref(&mut self, node: &Node, force: bool) -> NodeRef {
        match node {
            // Hash pointers are their own reference and are already stored.
            Node::Value(v) => v.buf.clone(),
            Node::Short(n) => {
                if let Some(cached) = n.cached.get() {
                    return self.cached_ref(cached, force);
                }
                let enc = self.encode_short(n);
                self.store(&n.cached, enc, force)
            }
            Node::Full(n) => {
                if let Some(cached) = n.cached.get() {
                    return self.cached_ref(cached, force);
                }
                let enc = self.encode_full(n);
                self.store(&n.cached, enc, force)
            }
        }
    }

    /// Re-derives a reference from a cached one. A cached inline encoding
    /// still has to be lifted to a stored hash when the node is the root.
    fn cached_ref(&mut self, cached: &[u8], force: bool) -> NodeRef {
        if cached.len() == 32 || !force {
            return cached.to_vec();
        }
        let hash = keccak256(cached);
        if let Some(batch) = self.batch.as_mut() {
            batch.put(hash.as_slice(), cached);
        }
        hash.as_slice().to_vec()
    }

    fn store(
        &mut self,
        cache: &std::sync::OnceLock<NodeRef>,
        enc: Vec<u8>,
        force: bool,
    ) -> NodeRef {
        if enc.len() < 32 && !force {
            if self.batch.is_some() {
                let _ = cache.set(enc.clone());
            }
            return enc;
        }
        let hash = keccak256(&enc);
        if let Some(batch) = self.batch.as_mut() {
            batch.put(hash.as_slice(), &enc);
            let _ = cache.set(hash.as_slice().to_vec());
        }
        hash.as_slice().to_vec()
    }

    fn encode_short(&mut self, n: &ShortNode) -> Vec<u8> {
        let compact = hex_to_compact(&n.key);

        let mut payload = Vec::new();
        compact.as_slice().encode(&mut payload);
        match &n.child {
            Node::Value(v) if !v.is_hash => v.buf.as_slice().encode(&mut payload),
            child => {
                let r = self.node_ref(child, false);
                append_ref(&mut payload, &r);
            }
        }

        wrap_list(payload)
    }

    fn encode_full(&mut self, n: &FullNode) -> Vec<u8> {
        let mut payload = Vec::new();
        for child in &n.children[..16] {
            match child {
                None => payload.push(EMPTY_STRING_CODE),
                Some(node) => {
                    let r = self.node_ref(node, false);
                    append_ref(&mut payload, &r);
                }
            }
        }
        match &n.children[16] {
            Some(Node::Value(v)) if !v.is_hash => v.buf.as_slice().encode(&mut payload),
            _ => payload.push(EMPTY_STRING_CODE),
        }

        wrap_list(payload)
    }
}

/// Embeds a node reference: hashes as RLP strings, inline encodings raw.
fn append_ref(out: &mut Vec<u8>, r: &[u8]) {
    if r.len() == 32 {
        r.encode(out);
    } else {
        out.extend_from_slice(r);
    }
}

fn wrap_list(payload: Vec<u8>) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 9);
    Header {
        list: true,
        payload_length: payload.len(),
    }
    .encode(&mut out);
    out.extend_from_slice(&payload);
    out
}
