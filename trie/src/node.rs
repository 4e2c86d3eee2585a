//! Trie node variants and their decoder.
//!
//! Nodes are shared through `Arc` so that tries obtained from different
//! roots can alias unchanged subtrees. A node's cached reference (its
//! keccak hash, or its inline RLP when shorter than 32 bytes) lives in a
//! `OnceLock`: mutation always rebuilds the nodes along the touched path,
//! so rebuilt nodes start with an empty cache and stale references can
//! never survive a write.

use std::sync::{Arc, OnceLock};

use alloy_primitives::B256;
use alloy_rlp::Error as RlpError;

use crate::encoding::{compact_to_hex, has_term};
use crate::rlp_raw::{self, Kind};

/// A node reference as embedded in a parent encoding: either the 32-byte
/// keccak hash of the node's RLP, or the RLP itself when shorter than 32
/// bytes.
pub type NodeRef = Vec<u8>;

/// A value node: either the leaf payload itself, or (when `is_hash`) a
/// 32-byte pointer to a node stored under that hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueNode {
    /// True if `buf` is a 32-byte hash pointing at a stored node.
    pub is_hash: bool,
    /// The payload or hash bytes.
    pub buf: Vec<u8>,
}

/// A short node: extension or leaf, disambiguated by the terminator
/// nibble at the end of `key`.
#[derive(Debug)]
pub struct ShortNode {
    /// Key in hex nibbles; includes the terminator for leaves.
    pub key: Vec<u8>,
    /// The child: a value node for leaves, any node for extensions.
    pub child: Node,
    pub(crate) cached: OnceLock<NodeRef>,
}

impl ShortNode {
    /// Creates a short node with an empty reference cache.
    pub fn new(key: Vec<u8>, child: Node) -> Self {
        Self {
            key,
            child,
            cached: OnceLock::new(),
        }
    }
}

impl Clone for ShortNode {
    fn clone(&self) -> Self {
        // Struct-level clones happen only on the mutation path, so the
        // copy must start with an empty cache.
        Self::new(self.key.clone(), self.child.clone())
    }
}

/// A full (branch) node. Slots 0..16 are keyed by nibble; slot 16 holds
/// the value reached when a key ends at this node (the terminator nibble
/// `0x10` indexes it naturally).
#[derive(Debug)]
pub struct FullNode {
    /// The transaction epoch that created this node. A `TrieTxn` rewrites
    /// a full node in place only when the epochs match; otherwise it
    /// clones and restamps.
    pub epoch: u32,
    /// The 16 nibble edges plus the value slot.
    pub children: [Option<Node>; 17],
    pub(crate) cached: OnceLock<NodeRef>,
}

impl FullNode {
    /// Creates an empty full node stamped with `epoch`.
    pub fn new(epoch: u32) -> Self {
        Self {
            epoch,
            children: std::array::from_fn(|_| None),
            cached: OnceLock::new(),
        }
    }

    /// Sets the edge for `nibble` (16 = the value slot).
    pub fn set_child(&mut self, nibble: u8, node: Node) {
        self.children[nibble as usize] = Some(node);
    }

    /// Gets the edge for `nibble` (16 = the value slot).
    pub fn child(&self, nibble: u8) -> Option<&Node> {
        self.children[nibble as usize].as_ref()
    }
}

impl Clone for FullNode {
    fn clone(&self) -> Self {
        Self {
            epoch: self.epoch,
            children: self.children.clone(),
            cached: OnceLock::new(),
        }
    }
}

/// A trie node. Absent children are modeled as `Option<Node>` in their
/// parents rather than as a dedicated empty variant.
#[derive(Debug, Clone)]
pub enum Node {
    /// Leaf payload or hash pointer.
    Value(Arc<ValueNode>),
    /// Extension or leaf.
    Short(Arc<ShortNode>),
    /// Branch.
    Full(Arc<FullNode>),
}

impl Node {
    /// Builds a value node, copying the payload.
    pub fn value(bytes: &[u8]) -> Self {
        Node::Value(Arc::new(ValueNode {
            is_hash: false,
            buf: bytes.to_vec(),
        }))
    }

    /// Builds a 32-byte hash pointer to a stored node.
    pub fn hash_ref(hash: &[u8]) -> Self {
        Node::Value(Arc::new(ValueNode {
            is_hash: true,
            buf: hash.to_vec(),
        }))
    }

    /// Builds a short node.
    pub fn short(key: Vec<u8>, child: Node) -> Self {
        Node::Short(Arc::new(ShortNode::new(key, child)))
    }
}

/// Decodes an RLP-encoded trie node.
///
/// When `hash` is given (the node was loaded from storage under that
/// hash), it is installed as the node's cached reference so re-hashing an
/// unchanged subtree stops here.
pub fn decode_node(hash: Option<B256>, buf: &[u8]) -> Result<Node, RlpError> {
    if buf.is_empty() {
        return Err(RlpError::InputTooShort);
    }
    let (content, _) = rlp_raw::split_list(buf)?;
    match rlp_raw::count_values(content)? {
        2 => decode_short(hash, content),
        17 => decode_full(hash, content),
        _ => Err(RlpError::Custom("invalid number of list elements")),
    }
}

fn decode_short(hash: Option<B256>, elems: &[u8]) -> Result<Node, RlpError> {
    let (compact, rest) = rlp_raw::split_string(elems)?;
    let key = compact_to_hex(compact);
    let child = if has_term(&key) {
        // Leaf: the second element is the payload bytes.
        let (value, _) = rlp_raw::split_string(rest)?;
        Node::value(value)
    } else {
        let (child, _) = decode_ref(rest)?;
        child.ok_or(RlpError::Custom("extension node with empty child"))?
    };
    let node = ShortNode::new(key, child);
    if let Some(h) = hash {
        let _ = node.cached.set(h.as_slice().to_vec());
    }
    Ok(Node::Short(Arc::new(node)))
}

fn decode_full(hash: Option<B256>, elems: &[u8]) -> Result<Node, RlpError> {
    let mut node = FullNode::new(0);
    let mut rest = elems;
    for i in 0..16 {
        let (child, r) = decode_ref(rest)?;
        node.children[i] = child;
        rest = r;
    }
    let (value, _) = rlp_raw::split_string(rest)?;
    if !value.is_empty() {
        node.children[16] = Some(Node::value(value));
    }
    if let Some(h) = hash {
        let _ = node.cached.set(h.as_slice().to_vec());
    }
    Ok(Node::Full(Arc::new(node)))
}

/// Decodes a node reference: an embedded node (a list shorter than a
/// hash), an empty string (no child), or a 32-byte hash pointer.
pub fn decode_ref(buf: &[u8]) -> Result<(Option<Node>, &[u8]), RlpError> {
    let (kind, content, rest) = rlp_raw::split(buf)?;
    match kind {
        Kind::List => {
            let consumed = buf.len() - rest.len();
            if consumed > 32 {
                return Err(RlpError::Custom("oversized embedded node"));
            }
            let node = decode_node(None, &buf[..consumed])?;
            Ok((Some(node), rest))
        }
        Kind::String if content.is_empty() => Ok((None, rest)),
        Kind::String if content.len() == 32 => Ok((Some(Node::hash_ref(content)), rest)),
        Kind::String => Err(RlpError::Custom("invalid node reference size")),
    }
}
