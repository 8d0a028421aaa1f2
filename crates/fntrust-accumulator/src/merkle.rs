//! # Merkle Accumulator Implementation
//!
//! This module implements the append-only hash tree that binds every
//! registered function artifact into a single root hash. The root is what
//! gets sealed into the trust anchor; membership of an artifact is checked by
//! walking from its leaf to the root and recomputing every parent on the way.
//!
//! ## Threat Model
//!
//! The accumulator provides:
//!
//! - **Tamper Evidence**: Any modification to a stored node is caught on the
//!   next path walk that crosses it.
//! - **Append-Only History**: Leaves are never removed or reordered; only the
//!   trailing padding duplicate is dropped when real content replaces it.
//! - **Collision Resistance**: SHA-256 prevents crafted leaf collisions.
//!
//! ## Tree Shape
//!
//! ```text
//!   register A, B, C
//!
//!                 root = H(H_AB || H_CC)
//!                /                     \
//!        H_AB = H(A||B)          H_CC = H(C||C')
//!         /        \               /        \
//!       H(A)      H(B)           H(C)      H(C)'   <- padding duplicate
//! ```
//!
//! An odd leaf count gets one persisted padding leaf copying the last real
//! leaf. An odd count at a higher level pairs its last node with itself for
//! that level only. Every internal node therefore has exactly two children
//! and every parent hash is `H(left || right)`.
//!
//! ## Arena Layout
//!
//! Nodes live in a `Vec<Node>` and refer to each other by [`NodeId`]. Slots
//! `0..padded_len()` hold the leaves in registration order; internal levels
//! follow bottom-up and the root is the last slot. Parent links give O(1)
//! upward steps without reference cycles.
//!
//! ## References
//!
//! - **Merkle, R. C. (1987)** - "A Digital Signature Based on a Conventional
//!   Encryption Function" - Practical construction and applications.
//!   CRYPTO '87. <https://doi.org/10.1007/3-540-48184-2_32>
//!
//! - **RFC 6962** - Certificate Transparency (modern Merkle tree usage)
//!   <https://www.rfc-editor.org/rfc/rfc6962>

use crate::models::{to_hex, AccumulatorError, AccumulatorState, Hash, Node, NodeId, Result};
use sha2::{Digest, Sha256};
use tracing::debug;

/// Outcome of walking a leaf's path up to the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathAudit {
    /// No real leaf carries the requested hash.
    NotFound,

    /// A parent's stored hash disagrees with its recomputed hash.
    Tampered {
        /// The first inconsistent ancestor met on the way up.
        node: NodeId,
        /// Number of upward steps taken when the mismatch was found (1 = parent of the leaf).
        level: usize,
    },

    /// Every ancestor was consistent; carries the hash of the node reached.
    Consistent {
        /// Leaf index where the walk started.
        leaf_index: usize,
        /// Hash of the top node of the walk.
        root: Hash,
    },
}

/// Append-only Merkle accumulator over artifact contents.
///
/// Each call to [`append_content`](Self::append_content) hashes the content
/// into a new leaf and rebuilds every internal level. The structure is
/// `Clone`, so callers that want lock-free readers can build the next
/// version on a copy and publish it as a fresh snapshot.
///
/// # Thread Safety
///
/// This structure is not internally synchronized. Share immutable snapshots
/// (e.g. behind `Arc`) and serialize writers externally.
///
/// # Example
///
/// ```rust
/// use fntrust_accumulator::MerkleAccumulator;
///
/// let mut acc = MerkleAccumulator::new();
/// acc.append_content(b"A");
/// acc.append_content(b"B");
/// let root = acc.append_content(b"C");
///
/// assert!(acc.verify_content(b"B", &root));
/// assert!(!acc.verify_content(b"D", &root));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MerkleAccumulator {
    /// Arena of all nodes: leaves first, then internal levels.
    nodes: Vec<Node>,

    /// Number of leaf slots, including a trailing padding duplicate.
    leaf_count: usize,

    /// Root slot, `None` while empty.
    root: Option<NodeId>,
}

impl MerkleAccumulator {
    /// Creates an empty accumulator.
    ///
    /// An empty accumulator has no root; verification against it always fails.
    pub fn new() -> Self {
        MerkleAccumulator {
            nodes: Vec::new(),
            leaf_count: 0,
            root: None,
        }
    }

    /// Rebuilds an accumulator from its persisted leaves.
    ///
    /// # Errors
    ///
    /// Returns `AccumulatorError::StateMismatch` if the state records a root
    /// that differs from the one obtained by rebuilding its leaves, or if the
    /// state claims a root for an empty leaf list.
    pub fn from_state(state: &AccumulatorState) -> Result<Self> {
        let mut acc = MerkleAccumulator::new();
        acc.rebuild(state.leaves.clone());

        if let Some(expected) = state.root {
            match acc.root_hash() {
                Some(actual) if actual == expected => {}
                Some(actual) => {
                    return Err(AccumulatorError::StateMismatch {
                        expected: to_hex(&expected),
                        actual: to_hex(&actual),
                    })
                }
                None => {
                    return Err(AccumulatorError::StateMismatch {
                        expected: to_hex(&expected),
                        actual: "<empty>".to_string(),
                    })
                }
            }
        }

        Ok(acc)
    }

    /// Captures the persisted form: real leaves plus the current root.
    pub fn to_state(&self) -> AccumulatorState {
        AccumulatorState {
            leaves: self.leaf_hashes(),
            root: self.root_hash(),
        }
    }

    /// Hashes `content` into a new leaf and rebuilds the tree.
    ///
    /// # Returns
    ///
    /// The new root hash.
    pub fn append_content(&mut self, content: &[u8]) -> Hash {
        self.append_leaf_hash(hash_content(content))
    }

    /// Appends a precomputed leaf hash and rebuilds the tree.
    ///
    /// A trailing padding duplicate left by the previous append is dropped
    /// first, so the new leaf takes its place.
    ///
    /// # Returns
    ///
    /// The new root hash.
    pub fn append_leaf_hash(&mut self, leaf_hash: Hash) -> Hash {
        let mut leaves = self.leaf_hashes();
        leaves.push(leaf_hash);
        self.rebuild(leaves);

        let root = self.root_hash().unwrap_or(leaf_hash);
        debug!(
            leaves = self.len(),
            padded = self.leaf_count,
            root = %to_hex(&root),
            "accumulator rebuilt"
        );
        root
    }

    /// Checks that `content` is a registered leaf whose path leads to `expected_root`.
    ///
    /// Read-only. Returns `false` when the content was never registered,
    /// when any ancestor on its path is inconsistent, when the walk ends at a
    /// different root, and always on an empty accumulator.
    pub fn verify_content(&self, content: &[u8], expected_root: &Hash) -> bool {
        self.verify_leaf_hash(&hash_content(content), expected_root)
    }

    /// Same as [`verify_content`](Self::verify_content) for an already-hashed artifact.
    pub fn verify_leaf_hash(&self, leaf_hash: &Hash, expected_root: &Hash) -> bool {
        match self.audit_leaf_hash(leaf_hash) {
            PathAudit::Consistent { root, .. } => root == *expected_root,
            PathAudit::NotFound | PathAudit::Tampered { .. } => false,
        }
    }

    /// Walks the path of `content` and reports where, if anywhere, it breaks.
    pub fn audit_content(&self, content: &[u8]) -> PathAudit {
        self.audit_leaf_hash(&hash_content(content))
    }

    /// Walks the path of a leaf hash and reports where, if anywhere, it breaks.
    ///
    /// The first real leaf with a matching hash is used.
    pub fn audit_leaf_hash(&self, leaf_hash: &Hash) -> PathAudit {
        let leaf_index = match self.locate_hash(leaf_hash) {
            Some(index) => index,
            None => return PathAudit::NotFound,
        };

        let mut current = NodeId(leaf_index);
        let mut level = 0;

        while let Some(parent_id) = self.nodes[current.0].parent {
            level += 1;
            let parent = &self.nodes[parent_id.0];

            let consistent = match (parent.left, parent.right) {
                (Some(left), Some(right)) => {
                    hash_pair(&self.nodes[left.0].hash, &self.nodes[right.0].hash) == parent.hash
                }
                _ => false,
            };

            if !consistent {
                return PathAudit::Tampered {
                    node: parent_id,
                    level,
                };
            }

            current = parent_id;
        }

        PathAudit::Consistent {
            leaf_index,
            root: self.nodes[current.0].hash,
        }
    }

    /// Index of the first real leaf holding `H(content)`.
    pub fn locate(&self, content: &[u8]) -> Option<usize> {
        self.locate_hash(&hash_content(content))
    }

    /// Index of the first real leaf holding `leaf_hash`.
    pub fn locate_hash(&self, leaf_hash: &Hash) -> Option<usize> {
        self.nodes[..self.leaf_count]
            .iter()
            .position(|node| !node.is_padding && node.hash == *leaf_hash)
    }

    /// Returns the root hash, or `None` while empty.
    pub fn root_hash(&self) -> Option<Hash> {
        self.root.map(|id| self.nodes[id.0].hash)
    }

    /// Returns the root node id, or `None` while empty.
    pub fn root_id(&self) -> Option<NodeId> {
        self.root
    }

    /// Number of real (non-padding) leaves.
    pub fn len(&self) -> usize {
        self.nodes[..self.leaf_count]
            .iter()
            .filter(|node| !node.is_padding)
            .count()
    }

    /// Returns true if nothing has been registered.
    pub fn is_empty(&self) -> bool {
        self.leaf_count == 0
    }

    /// Number of leaf slots including the padding duplicate.
    pub fn padded_len(&self) -> usize {
        self.leaf_count
    }

    /// Total number of arena nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Real leaf hashes in registration order.
    pub fn leaf_hashes(&self) -> Vec<Hash> {
        self.nodes[..self.leaf_count]
            .iter()
            .filter(|node| !node.is_padding)
            .map(|node| node.hash)
            .collect()
    }

    /// Looks up a node by id.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    /// Parent of a node, `None` for the root or an unknown id.
    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0).and_then(|node| node.parent)
    }

    /// Number of upward steps from a leaf to the root (0 while empty).
    pub fn depth(&self) -> usize {
        if self.is_empty() {
            return 0;
        }
        let mut steps = 0;
        let mut current = NodeId(0);
        while let Some(parent) = self.parent_of(current) {
            steps += 1;
            current = parent;
        }
        steps
    }

    /// Overwrites a stored node hash without recomputing anything.
    ///
    /// Only for exercising tamper detection.
    #[cfg(any(test, feature = "test-hooks"))]
    pub fn corrupt_node(&mut self, id: NodeId, hash: Hash) {
        if let Some(node) = self.nodes.get_mut(id.0) {
            node.hash = hash;
        }
    }

    /// Replaces the arena with a tree built over `leaves`.
    fn rebuild(&mut self, leaves: Vec<Hash>) {
        self.nodes.clear();
        self.root = None;
        self.leaf_count = 0;

        let last = match leaves.last() {
            Some(last) => *last,
            None => return,
        };

        let needs_padding = leaves.len() % 2 == 1;
        self.nodes.extend(leaves.into_iter().map(Node::leaf));
        if needs_padding {
            self.nodes.push(Node::padding(last));
        }
        self.leaf_count = self.nodes.len();

        let mut level: Vec<NodeId> = (0..self.leaf_count).map(NodeId).collect();

        while level.len() > 1 {
            let mut next_level = Vec::with_capacity(level.len().div_ceil(2));

            for chunk in level.chunks(2) {
                let left = chunk[0];
                // Odd level: the last node pairs with itself for this level only.
                let right = if chunk.len() == 2 { chunk[1] } else { chunk[0] };

                let hash = hash_pair(&self.nodes[left.0].hash, &self.nodes[right.0].hash);
                let parent_id = NodeId(self.nodes.len());
                self.nodes.push(Node::internal(hash, left, right));
                self.nodes[left.0].parent = Some(parent_id);
                self.nodes[right.0].parent = Some(parent_id);

                next_level.push(parent_id);
            }

            level = next_level;
        }

        self.root = level.first().copied();
    }
}

/// Hashes artifact content into a leaf hash.
///
/// This and [`hash_pair`] are the only places the hash function is named.
pub fn hash_content(content: &[u8]) -> Hash {
    Sha256::digest(content).into()
}

/// Hashes two child hashes together to form a parent hash.
pub fn hash_pair(left: &Hash, right: &Hash) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(contents: &[&[u8]]) -> MerkleAccumulator {
        let mut acc = MerkleAccumulator::new();
        for content in contents {
            acc.append_content(content);
        }
        acc
    }

    #[test]
    fn test_empty_accumulator() {
        let acc = MerkleAccumulator::new();
        assert!(acc.is_empty());
        assert_eq!(acc.len(), 0);
        assert_eq!(acc.root_hash(), None);
        assert_eq!(acc.depth(), 0);
        assert!(!acc.verify_content(b"", &[0u8; 32]));
    }

    #[test]
    fn test_single_leaf_is_padded() {
        let acc = build(&[b"only"]);
        let leaf = hash_content(b"only");

        assert_eq!(acc.len(), 1);
        assert_eq!(acc.padded_len(), 2);
        assert!(acc.node(NodeId(1)).unwrap().is_padding);
        assert_eq!(acc.root_hash(), Some(hash_pair(&leaf, &leaf)));
    }

    #[test]
    fn test_padding_dropped_on_next_append() {
        let mut acc = build(&[b"a"]);
        assert_eq!(acc.padded_len(), 2);

        acc.append_content(b"b");
        assert_eq!(acc.len(), 2);
        assert_eq!(acc.padded_len(), 2);
        assert!(!acc.node(NodeId(1)).unwrap().is_padding);
        assert_eq!(acc.node(NodeId(1)).unwrap().hash, hash_content(b"b"));
    }

    #[test]
    fn test_three_leaf_scenario() {
        let acc = build(&[b"A", b"B", b"C"]);
        let (a, b, c) = (hash_content(b"A"), hash_content(b"B"), hash_content(b"C"));

        // 4 leaves + 2 parents + 1 root
        assert_eq!(acc.padded_len(), 4);
        assert_eq!(acc.node_count(), 7);
        assert_eq!(acc.node(NodeId(3)).unwrap().hash, c);
        assert!(acc.node(NodeId(3)).unwrap().is_padding);

        let expected = hash_pair(&hash_pair(&a, &b), &hash_pair(&c, &c));
        assert_eq!(acc.root_hash(), Some(expected));

        assert!(acc.verify_content(b"B", &expected));
        assert!(!acc.verify_content(b"D", &expected));
    }

    #[test]
    fn test_odd_internal_level_pairs_with_itself() {
        // 6 leaves -> 3 parents -> the third pairs with itself
        let acc = build(&[b"1", b"2", b"3", b"4", b"5", b"6"]);
        let h: Vec<Hash> = ["1", "2", "3", "4", "5", "6"]
            .iter()
            .map(|s| hash_content(s.as_bytes()))
            .collect();

        let p0 = hash_pair(&h[0], &h[1]);
        let p1 = hash_pair(&h[2], &h[3]);
        let p2 = hash_pair(&h[4], &h[5]);
        let q0 = hash_pair(&p0, &p1);
        let q1 = hash_pair(&p2, &p2);

        assert_eq!(acc.root_hash(), Some(hash_pair(&q0, &q1)));
        assert_eq!(acc.depth(), 3);
    }

    #[test]
    fn test_first_match_wins() {
        let acc = build(&[b"dup", b"other", b"dup"]);
        assert_eq!(acc.locate(b"dup"), Some(0));
        assert_eq!(acc.len(), 3);
    }

    #[test]
    fn test_wrong_root_fails() {
        let acc = build(&[b"a", b"b"]);
        assert!(!acc.verify_content(b"a", &[9u8; 32]));
    }

    #[test]
    fn test_tampered_parent_detected() {
        let mut acc = build(&[b"a", b"b", b"c", b"d"]);
        let root = acc.root_hash().unwrap();
        let parent = acc.parent_of(NodeId(0)).unwrap();

        acc.corrupt_node(parent, [0xEE; 32]);

        assert!(!acc.verify_content(b"a", &root));
        assert_eq!(
            acc.audit_content(b"a"),
            PathAudit::Tampered {
                node: parent,
                level: 1
            }
        );
    }

    #[test]
    fn test_state_round_trip_rejects_wrong_root() {
        let acc = build(&[b"a", b"b", b"c"]);
        let mut state = acc.to_state();
        assert_eq!(state.leaves.len(), 3);

        state.root = Some([1u8; 32]);
        assert!(matches!(
            MerkleAccumulator::from_state(&state),
            Err(AccumulatorError::StateMismatch { .. })
        ));
    }
}
