//! # Persistent Storage Layer
//!
//! This module provides a persistence layer for the accumulator using Sled,
//! an embedded database. Only real leaf hashes are written; the tree shape
//! is derived data and is rebuilt on load.
//!
//! ## Threat Model
//!
//! The storage layer defends against:
//!
//! - **Torn Writes**: leaves and metadata are committed in one transaction.
//! - **Silent Divergence**: the stored root is compared against the rebuilt
//!   tree when the state is loaded (see [`MerkleAccumulator::from_state`]).
//! - **Truncation**: a missing or wrong-sized leaf record is a hard error,
//!   never an implicitly shorter log.
//!
//! ## Storage Structure
//!
//! | Tree | Key | Value | Purpose |
//! |------|-----|-------|---------|
//! | `leaves` | leaf index (u64, big-endian) | 32-byte hash | Append-only leaf log |
//! | `meta` | `leaf_count` | u64, big-endian | Number of real leaves |
//! | `meta` | `root` | 32-byte hash | Root at save time |
//!
//! ## References
//!
//! - Sled documentation: <https://sled.rs/>
//!
//! [`MerkleAccumulator::from_state`]: crate::MerkleAccumulator::from_state

use crate::models::{AccumulatorError, AccumulatorState, Hash, Result, HASH_SIZE};
use sled::transaction::{TransactionError, TransactionResult, Transactional};
use std::path::Path;
use tracing::debug;

/// Tree name for the leaf log.
const LEAF_TREE: &str = "leaves";

/// Tree name for metadata records.
const META_TREE: &str = "meta";

const LEAF_COUNT_KEY: &[u8] = b"leaf_count";
const ROOT_KEY: &[u8] = b"root";

/// Durable home of an accumulator's state.
///
/// `load` returns `Ok(None)` when nothing was ever saved; callers treat that
/// as a fresh, empty accumulator. Every other failure is an error.
pub trait StateStore: Send + Sync {
    /// Loads the last saved state, if any.
    fn load(&self) -> Result<Option<AccumulatorState>>;

    /// Replaces the saved state. Must be durable when it returns `Ok`.
    fn save(&self, state: &AccumulatorState) -> Result<()>;

    /// Deletes all saved state.
    fn clear(&self) -> Result<()>;
}

/// Sled-backed [`StateStore`].
///
/// # Thread Safety
///
/// The underlying Sled database is thread-safe; callers still serialize
/// saves so that the saved state always matches a published snapshot.
///
/// # Example
///
/// ```rust
/// use fntrust_accumulator::{MerkleAccumulator, SledStore, StateStore};
///
/// let store = SledStore::temporary().unwrap();
/// assert!(store.load().unwrap().is_none());
///
/// let mut acc = MerkleAccumulator::new();
/// acc.append_content(b"fn-a");
/// store.save(&acc.to_state()).unwrap();
///
/// let loaded = store.load().unwrap().unwrap();
/// assert_eq!(loaded.leaves.len(), 1);
/// ```
#[derive(Clone)]
pub struct SledStore {
    /// The underlying Sled database.
    db: sled::Db,

    /// Leaf log keyed by index.
    leaves: sled::Tree,

    /// Leaf count and root.
    meta: sled::Tree,
}

impl SledStore {
    /// Opens or creates a store at the given path.
    ///
    /// # Errors
    ///
    /// Returns `AccumulatorError::Database` if the path is invalid, if
    /// permissions are insufficient or the database is corrupted.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Creates a temporary store that is discarded when dropped.
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> Result<Self> {
        let leaves = db.open_tree(LEAF_TREE)?;
        let meta = db.open_tree(META_TREE)?;
        Ok(SledStore { db, leaves, meta })
    }

    /// Number of leaves recorded in metadata.
    pub fn stored_leaf_count(&self) -> Result<u64> {
        match self.meta.get(LEAF_COUNT_KEY)? {
            Some(bytes) => decode_u64(&bytes),
            None => Ok(0),
        }
    }

    /// Flushes all pending writes to disk.
    pub fn flush(&self) -> Result<usize> {
        Ok(self.db.flush()?)
    }

    /// Number of stored leaves that `state` keeps as they are.
    ///
    /// The log is append-only, so stored leaves are a prefix of any state
    /// saved after them. Only the last shared leaf is compared; if it
    /// differs the whole log is rewritten.
    fn unchanged_prefix(&self, state: &AccumulatorState, previous: u64) -> Result<u64> {
        let shared = previous.min(state.leaves.len() as u64);
        if shared == 0 {
            return Ok(0);
        }

        let boundary = shared - 1;
        match self.leaves.get(boundary.to_be_bytes())? {
            Some(bytes) if bytes.as_ref() == state.leaves[boundary as usize].as_slice() => {
                Ok(shared)
            }
            _ => Ok(0),
        }
    }
}

impl StateStore for SledStore {
    fn load(&self) -> Result<Option<AccumulatorState>> {
        let count = match self.meta.get(LEAF_COUNT_KEY)? {
            Some(bytes) => decode_u64(&bytes)?,
            None if self.leaves.is_empty() => return Ok(None),
            None => {
                return Err(AccumulatorError::CorruptRecord(
                    "leaf records present without a leaf count".to_string(),
                ))
            }
        };

        let mut leaves = Vec::with_capacity(count as usize);
        for index in 0..count {
            let bytes = self.leaves.get(index.to_be_bytes())?.ok_or_else(|| {
                AccumulatorError::CorruptRecord(format!("missing leaf {}", index))
            })?;
            leaves.push(decode_hash(&bytes, "leaf")?);
        }

        let root = match self.meta.get(ROOT_KEY)? {
            Some(bytes) => Some(decode_hash(&bytes, "root")?),
            None => None,
        };

        debug!(leaves = leaves.len(), "accumulator state loaded");
        Ok(Some(AccumulatorState { leaves, root }))
    }

    fn save(&self, state: &AccumulatorState) -> Result<()> {
        let previous = self.stored_leaf_count()?;
        let count = state.leaves.len() as u64;
        let unchanged = self.unchanged_prefix(state, previous)?;

        let mut leaf_batch = sled::Batch::default();
        for index in unchanged..count {
            leaf_batch.insert(
                &index.to_be_bytes()[..],
                state.leaves[index as usize].as_slice(),
            );
        }
        for stale in count..previous {
            leaf_batch.remove(&stale.to_be_bytes()[..]);
        }

        let mut meta_batch = sled::Batch::default();
        meta_batch.insert(LEAF_COUNT_KEY, &count.to_be_bytes()[..]);
        match &state.root {
            Some(root) => meta_batch.insert(ROOT_KEY, root.as_slice()),
            None => meta_batch.remove(ROOT_KEY),
        }

        let result: TransactionResult<(), ()> =
            (&self.leaves, &self.meta).transaction(|(leaves, meta)| {
                leaves.apply_batch(&leaf_batch)?;
                meta.apply_batch(&meta_batch)?;
                Ok(())
            });

        result.map_err(|e| match e {
            TransactionError::Abort(()) => {
                AccumulatorError::CorruptRecord("state transaction aborted".to_string())
            }
            TransactionError::Storage(err) => AccumulatorError::Database(err),
        })?;

        self.db.flush()?;
        debug!(
            leaves = count,
            written = count - unchanged,
            "accumulator state saved"
        );
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.leaves.clear()?;
        self.meta.clear()?;
        self.db.flush()?;
        Ok(())
    }
}

impl std::fmt::Debug for SledStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledStore")
            .field("leaf_records", &self.leaves.len())
            .finish()
    }
}

fn decode_u64(bytes: &[u8]) -> Result<u64> {
    let raw: [u8; 8] = bytes
        .try_into()
        .map_err(|_| AccumulatorError::CorruptRecord("leaf count is not 8 bytes".to_string()))?;
    Ok(u64::from_be_bytes(raw))
}

fn decode_hash(bytes: &[u8], what: &str) -> Result<Hash> {
    if bytes.len() != HASH_SIZE {
        return Err(AccumulatorError::CorruptRecord(format!(
            "{} record is {} bytes, expected {}",
            what,
            bytes.len(),
            HASH_SIZE
        )));
    }
    let mut hash = [0u8; HASH_SIZE];
    hash.copy_from_slice(bytes);
    Ok(hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MerkleAccumulator;
    use tempfile::TempDir;

    fn state_of(contents: &[&[u8]]) -> AccumulatorState {
        let mut acc = MerkleAccumulator::new();
        for content in contents {
            acc.append_content(content);
        }
        acc.to_state()
    }

    #[test]
    fn test_fresh_store_has_no_state() {
        let store = SledStore::temporary().unwrap();
        assert!(store.load().unwrap().is_none());
        assert_eq!(store.stored_leaf_count().unwrap(), 0);
    }

    #[test]
    fn test_save_and_load() {
        let store = SledStore::temporary().unwrap();
        let state = state_of(&[b"a", b"b", b"c"]);

        store.save(&state).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded, state);
        assert_eq!(store.stored_leaf_count().unwrap(), 3);
    }

    #[test]
    fn test_save_overwrites_and_trims() {
        let store = SledStore::temporary().unwrap();
        store.save(&state_of(&[b"a", b"b", b"c"])).unwrap();

        let shorter = state_of(&[b"x"]);
        store.save(&shorter).unwrap();

        assert_eq!(store.load().unwrap().unwrap(), shorter);
        assert_eq!(store.leaves.len(), 1);
    }

    #[test]
    fn test_append_writes_only_new_leaves() {
        let store = SledStore::temporary().unwrap();
        store.save(&state_of(&[b"a", b"b"])).unwrap();

        // Marker in a leaf the next save must not touch
        store.leaves.insert(0u64.to_be_bytes(), &[9u8; 32][..]).unwrap();
        store.save(&state_of(&[b"a", b"b", b"c"])).unwrap();

        assert_eq!(
            store.leaves.get(0u64.to_be_bytes()).unwrap().unwrap().as_ref(),
            &[9u8; 32][..]
        );
        assert_eq!(store.leaves.len(), 3);
        assert_eq!(store.stored_leaf_count().unwrap(), 3);
    }

    #[test]
    fn test_rollback_to_prefix_trims_tail() {
        let store = SledStore::temporary().unwrap();
        store.save(&state_of(&[b"a", b"b", b"c"])).unwrap();

        let rolled_back = state_of(&[b"a", b"b"]);
        store.save(&rolled_back).unwrap();

        assert_eq!(store.load().unwrap().unwrap(), rolled_back);
        assert_eq!(store.leaves.len(), 2);
    }

    #[test]
    fn test_clear() {
        let store = SledStore::temporary().unwrap();
        store.save(&state_of(&[b"a"])).unwrap();

        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_truncated_leaf_is_corrupt() {
        let store = SledStore::temporary().unwrap();
        store.save(&state_of(&[b"a", b"b"])).unwrap();

        store.leaves.insert(1u64.to_be_bytes(), &[1u8; 5][..]).unwrap();

        assert!(matches!(
            store.load(),
            Err(AccumulatorError::CorruptRecord(_))
        ));
    }

    #[test]
    fn test_missing_leaf_is_corrupt() {
        let store = SledStore::temporary().unwrap();
        store.save(&state_of(&[b"a", b"b"])).unwrap();

        store.leaves.remove(0u64.to_be_bytes()).unwrap();

        assert!(matches!(
            store.load(),
            Err(AccumulatorError::CorruptRecord(_))
        ));
    }

    #[test]
    fn test_state_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("acc.db");
        let state = state_of(&[b"a", b"b", b"c", b"d", b"e"]);

        {
            let store = SledStore::open(&path).unwrap();
            store.save(&state).unwrap();
        }

        let store = SledStore::open(&path).unwrap();
        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded, state);
        assert!(MerkleAccumulator::from_state(&loaded).is_ok());
    }
}
