//! # Function Trust Accumulator
//!
//! Append-only Merkle accumulator binding every registered function artifact
//! into one root hash, plus the durable store that lets the accumulator
//! survive restarts.
//!
//! ## Purpose
//!
//! 1. **Accumulation** - each registered artifact becomes a leaf
//!    `H(content)`; the tree is rebuilt on every append and its root
//!    summarizes the whole registration history.
//!
//! 2. **Path Verification** - an artifact is trusted only if its leaf exists
//!    and every parent on the walk to the root recomputes to its stored hash,
//!    ending at the expected root.
//!
//! 3. **Persistence** - real leaf hashes are written to Sled; padding and
//!    internal levels are rebuilt on load and checked against the saved root.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        ACCUMULATOR                           │
//! ├──────────────────────────────────────────────────────────────┤
//! │                                                              │
//! │  content ──▶ H(content) ──▶ leaf ──▶ rebuild levels ──▶ root │
//! │                                                              │
//! │  ┌───────────────────────┐      ┌─────────────────────────┐  │
//! │  │   MerkleAccumulator   │      │       SledStore         │  │
//! │  │  • arena of nodes     │◀────▶│  • leaf log (u64 → H)   │  │
//! │  │  • parent links       │ state│  • leaf count, root     │  │
//! │  │  • padding duplicate  │      │  • one transaction/save │  │
//! │  └───────────────────────┘      └─────────────────────────┘  │
//! │                                                              │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use fntrust_accumulator::{MerkleAccumulator, SledStore, StateStore};
//!
//! let store = SledStore::temporary().unwrap();
//! let mut acc = match store.load().unwrap() {
//!     Some(state) => MerkleAccumulator::from_state(&state).unwrap(),
//!     None => MerkleAccumulator::new(),
//! };
//!
//! let root = acc.append_content(b"function source v1");
//! store.save(&acc.to_state()).unwrap();
//!
//! assert!(acc.verify_content(b"function source v1", &root));
//! ```
//!
//! ## Security Considerations
//!
//! - **Empty Tree**: an empty accumulator has no root. Verification against
//!   it is a failure, never a vacuous success.
//! - **Collisions**: the first leaf matching a hash is used. Distinct
//!   artifacts colliding under SHA-256 are not handled specially.
//! - **Storage Security**: the Sled database is not encrypted. Tampering with
//!   it is detected on load through the saved root, not prevented.

pub mod merkle;
pub mod models;
pub mod storage;

pub use merkle::{hash_content, hash_pair, MerkleAccumulator, PathAudit};
pub use models::{
    to_hex, AccumulatorError, AccumulatorState, Hash, Node, NodeId, Result, EMPTY_HASH,
    HASH_SIZE,
};
pub use storage::{SledStore, StateStore};
