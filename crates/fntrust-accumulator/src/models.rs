//! # Core Data Models for the Accumulator
//!
//! This module defines the types shared by the Merkle accumulator and its
//! persistence layer. Hashes are strongly typed fixed-size arrays, tree nodes
//! live in an index-addressed arena, and the persisted form carries only
//! real leaf hashes.
//!
//! ## Threat Model
//!
//! The types in this module help defend against:
//!
//! - **Type Confusion**: `Hash` is a fixed 32-byte array, never a loose `Vec<u8>`.
//! - **Padding Forgery**: `Node::is_padding` marks synthetic leaves so they are
//!   never matched as registered content.
//! - **Silent State Divergence**: `AccumulatorState` records the root it was
//!   saved with, so a reload that rebuilds a different tree is rejected.
//!
//! ## References
//!
//! - NIST FIPS 180-4 for hash size (SHA-256 = 32 bytes)

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// SHA-256 hash output size in bytes.
pub const HASH_SIZE: usize = 32;

/// A 32-byte SHA-256 hash value.
///
/// # Security Notes
///
/// - Display implementations should use hex encoding for readability.
/// - Leaf hashes are computed over raw artifact bytes with no domain
///   separation, so a leaf hash and an internal hash share one space.
pub type Hash = [u8; HASH_SIZE];

/// An empty hash (all zeros).
pub const EMPTY_HASH: Hash = [0u8; HASH_SIZE];

/// Index of a node inside the accumulator arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// A node of the accumulator tree.
///
/// Children and parent are arena indices. A node's hash is fixed when the
/// level containing it is built; appends rebuild the internal levels rather
/// than editing existing parents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// Hash of the content (leaves) or of the two children (internal nodes).
    pub hash: Hash,

    /// Left child, `None` for leaves.
    pub left: Option<NodeId>,

    /// Right child, `None` for leaves.
    pub right: Option<NodeId>,

    /// Parent node, `None` for the root.
    pub parent: Option<NodeId>,

    /// Whether the node is a leaf.
    pub is_leaf: bool,

    /// Whether the node is the synthetic duplicate that evens the leaf count.
    ///
    /// A padding leaf carries no content of its own and must never be
    /// reported as a registered artifact.
    pub is_padding: bool,
}

impl Node {
    /// Creates a real content leaf.
    pub fn leaf(hash: Hash) -> Self {
        Node {
            hash,
            left: None,
            right: None,
            parent: None,
            is_leaf: true,
            is_padding: false,
        }
    }

    /// Creates the padding duplicate of a leaf hash.
    pub fn padding(hash: Hash) -> Self {
        Node {
            is_padding: true,
            ..Node::leaf(hash)
        }
    }

    /// Creates an internal node over two children.
    pub fn internal(hash: Hash, left: NodeId, right: NodeId) -> Self {
        Node {
            hash,
            left: Some(left),
            right: Some(right),
            parent: None,
            is_leaf: false,
            is_padding: false,
        }
    }
}

/// Durable form of an accumulator.
///
/// Only real leaf hashes are stored, in registration order. Padding and
/// internal levels are derived data and are rebuilt on load.
///
/// # Example
///
/// ```rust
/// use fntrust_accumulator::{AccumulatorState, MerkleAccumulator};
///
/// let mut acc = MerkleAccumulator::new();
/// acc.append_content(b"fn-a");
///
/// let state = acc.to_state();
/// let restored = MerkleAccumulator::from_state(&state).unwrap();
/// assert_eq!(restored.root_hash(), acc.root_hash());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccumulatorState {
    /// Real leaf hashes in registration order.
    pub leaves: Vec<Hash>,

    /// Root the state was saved with, if any leaves exist.
    pub root: Option<Hash>,
}

/// Errors that can occur during accumulator persistence.
#[derive(Debug, Error)]
pub enum AccumulatorError {
    /// Failed to open, read or write the database.
    #[error("Database error: {0}")]
    Database(#[from] sled::Error),

    /// A stored record has the wrong shape.
    #[error("Corrupt record: {0}")]
    CorruptRecord(String),

    /// Rebuilding the stored leaves produced a different root.
    #[error("State mismatch: stored root {expected}, rebuilt root {actual}")]
    StateMismatch {
        /// Root recorded alongside the leaves (hex).
        expected: String,
        /// Root obtained by rebuilding the tree (hex).
        actual: String,
    },
}

/// Result type for accumulator operations.
pub type Result<T> = std::result::Result<T, AccumulatorError>;

/// Formats a hash as lowercase hex.
pub fn to_hex(hash: &Hash) -> String {
    hex::encode(hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padding_is_leaf() {
        let node = Node::padding([7u8; 32]);
        assert!(node.is_leaf);
        assert!(node.is_padding);
        assert_eq!(node.hash, [7u8; 32]);
    }

    #[test]
    fn test_state_serialization() {
        let state = AccumulatorState {
            leaves: vec![[1u8; 32], [2u8; 32]],
            root: Some([3u8; 32]),
        };

        let json = serde_json::to_string(&state).unwrap();
        let parsed: AccumulatorState = serde_json::from_str(&json).unwrap();

        assert_eq!(state, parsed);
    }

    #[test]
    fn test_to_hex() {
        let mut hash = EMPTY_HASH;
        hash[0] = 0xab;
        hash[31] = 0x01;
        let hex = to_hex(&hash);
        assert_eq!(hex.len(), 64);
        assert!(hex.starts_with("ab00"));
        assert!(hex.ends_with("01"));
    }
}
