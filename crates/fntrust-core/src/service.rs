//! The integrity service facade.
//!
//! [`IntegrityService`] owns the accumulator snapshot, the durable store and
//! the trust anchor, and is the only thing request handlers talk to.

use crate::{
    config::{AnchorBackend, ServiceConfig},
    error::IntegrityError,
    outcome::{RegisterOutcome, VerifyOutcome, VerifyRequest},
    Result,
};

use fntrust_accumulator::{to_hex, Hash, MerkleAccumulator, SledStore, StateStore};
use fntrust_anchor::{RegisterBank, SimulatedBank, TpmBank, TrustAnchor, RESET_VALUE};
use fntrust_protocol::{authenticate, authenticate_with_freshness, parse_public_key, VerdictString};

use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Registers function artifacts and verifies them against an anchored root.
///
/// # Concurrency Model
///
/// - Registrations are serialized by a writer mutex. Each one builds a new
///   accumulator from the current snapshot, saves it, then seals its root
///   and publishes it while holding the snapshot write lock.
/// - Verifications take the snapshot read lock only long enough to clone
///   the `Arc` and read the anchor, then walk the path lock-free.
///
/// A verifier therefore always sees a snapshot whose root is the one sealed
/// in the anchor. Verification is "latest root only": content registered
/// before the call started verifies, nothing older than the current root
/// is consulted.
///
/// # Example
///
/// ```rust
/// use fntrust_accumulator::SledStore;
/// use fntrust_anchor::{SimulatedBank, TrustAnchor};
/// use fntrust_core::{IntegrityService, VerifyRequest};
/// use std::sync::Arc;
///
/// let anchor = TrustAnchor::new(Arc::new(SimulatedBank::new()), 16);
/// let service = IntegrityService::new(Box::new(SledStore::temporary()?), anchor)?;
///
/// service.register(b"fn a() {}")?;
/// let outcome = service.verify(&VerifyRequest::new(b"fn a() {}".to_vec()))?;
/// assert!(outcome.trusted);
/// # Ok::<(), fntrust_core::IntegrityError>(())
/// ```
pub struct IntegrityService {
    /// Durable home of the accumulator.
    store: Box<dyn StateStore>,

    /// Register holding the sealed root.
    anchor: TrustAnchor,

    /// Serializes register and reset.
    writer: Mutex<()>,

    /// Published snapshot.
    snapshot: RwLock<Arc<MerkleAccumulator>>,
}

impl IntegrityService {
    /// Loads durable state and binds it to `anchor`.
    ///
    /// Nothing is ever sealed here. If the register already attests to the
    /// loaded root the service is trusted straight away. Otherwise (register
    /// at its reset value after a reboot, or attesting to another root) the
    /// loaded state stays unsealed and every verification reports untrusted
    /// until the next registration or an explicit [`reseal`](Self::reseal).
    ///
    /// # Errors
    ///
    /// Returns `Persistence` if the state cannot be loaded or fails its
    /// integrity check, and `AnchorUnavailable` if the register cannot be
    /// read.
    pub fn new(store: Box<dyn StateStore>, anchor: TrustAnchor) -> Result<Self> {
        let accumulator = match store.load()? {
            Some(state) => MerkleAccumulator::from_state(&state)?,
            None => MerkleAccumulator::new(),
        };

        if let Some(root) = accumulator.root_hash() {
            let current = anchor.current_value()?;
            if current == TrustAnchor::expected_value(&root) {
                debug!(root = %to_hex(&root), "trust anchor already attests to loaded root");
            } else if current == RESET_VALUE {
                warn!(
                    root = %to_hex(&root),
                    "trust anchor is at its reset value; loaded state left unsealed"
                );
            } else {
                warn!(
                    root = %to_hex(&root),
                    "trust anchor attests to a different root; loaded state left unsealed"
                );
            }
        }

        info!(
            leaves = accumulator.len(),
            register = anchor.index(),
            "integrity service initialized"
        );

        Ok(Self {
            store,
            anchor,
            writer: Mutex::new(()),
            snapshot: RwLock::new(Arc::new(accumulator)),
        })
    }

    /// Opens the configured store and register bank.
    pub fn from_config(config: &ServiceConfig) -> Result<Self> {
        config.validate()?;

        let store = SledStore::open(&config.storage.path)?;
        let bank: Arc<dyn RegisterBank> = match config.anchor.backend {
            AnchorBackend::Simulator => {
                warn!("using simulated trust anchor; sealed roots do not survive the process");
                Arc::new(SimulatedBank::new())
            }
            AnchorBackend::Device => Arc::new(TpmBank::open_device(&config.anchor.device_path)?),
        };

        Self::new(
            Box::new(store),
            TrustAnchor::new(bank, config.anchor.register_index),
        )
    }

    /// Appends `content` and seals the new root.
    ///
    /// Either every step succeeds and the new snapshot is published, or the
    /// published snapshot is unchanged.
    ///
    /// # Errors
    ///
    /// - `Persistence` if the new state cannot be saved, or if sealing
    ///   failed and the saved state could not be rolled back
    /// - `AnchorUnavailable` if the root cannot be sealed. The saved state
    ///   is rolled back; the register may be left at its reset value, in
    ///   which case verifications report untrusted.
    pub fn register(&self, content: &[u8]) -> Result<RegisterOutcome> {
        let _writer = self.writer.lock();

        let previous = self.current();
        let mut next = MerkleAccumulator::clone(&previous);
        let root_hash = next.append_content(content);
        let state = next.to_state();

        self.store.save(&state)?;

        let mut published = self.snapshot.write();
        if let Err(e) = self.anchor.seal_root(&root_hash) {
            warn!(error = %e, "sealing failed; rolling back saved state");
            if let Err(rollback) = self.store.save(&previous.to_state()) {
                error!(
                    seal_error = %e,
                    error = %rollback,
                    "rollback of saved state failed; store holds an unsealed registration"
                );
                return Err(rollback.into());
            }
            return Err(e.into());
        }
        *published = Arc::new(next);
        drop(published);

        let outcome = RegisterOutcome {
            root_hash,
            leaf_index: state.leaves.len() - 1,
            leaf_count: state.leaves.len(),
        };
        info!(
            leaf_index = outcome.leaf_index,
            root = %to_hex(&root_hash),
            "artifact registered"
        );
        Ok(outcome)
    }

    /// Checks `request.content` against the current root and the anchor.
    ///
    /// An empty accumulator is never trusted and the anchor is not read.
    ///
    /// # Errors
    ///
    /// - `Validation` for a malformed client key, or freshness without a key
    /// - `AnchorUnavailable` if the register cannot be read
    /// - `Protocol` if the verdict cannot be authenticated
    pub fn verify(&self, request: &VerifyRequest) -> Result<VerifyOutcome> {
        let client_key = match &request.client_public_key {
            Some(key) => {
                parse_public_key(key).map_err(|e| IntegrityError::Validation(e.to_string()))?;
                Some(key.as_slice())
            }
            None if request.freshness.is_some() => {
                return Err(IntegrityError::Validation(
                    "freshness requires a client public key".to_string(),
                ))
            }
            None => None,
        };

        let (snapshot, anchor_confirmed) = {
            let guard = self.snapshot.read();
            let snapshot = Arc::clone(&guard);
            let confirmed = match snapshot.root_hash() {
                Some(root) => self.anchor.verify_root(&root)?,
                None => false,
            };
            (snapshot, confirmed)
        };

        let path_ok = match snapshot.root_hash() {
            Some(root) => snapshot.verify_content(&request.content, &root),
            None => false,
        };

        let trusted = anchor_confirmed && path_ok;
        let verdict = VerdictString::from(trusted);
        if trusted {
            debug!("artifact verified");
        } else {
            debug!(anchor_confirmed, path_ok, "artifact not trusted");
        }

        let authentication = match (client_key, &request.freshness) {
            (Some(key), Some(freshness)) => {
                Some(authenticate_with_freshness(verdict, key, freshness)?)
            }
            (Some(key), None) => Some(authenticate(verdict, key)?),
            (None, _) => None,
        };

        Ok(VerifyOutcome {
            trusted,
            verdict,
            anchor_confirmed,
            authentication,
        })
    }

    /// Seals the published root into the register.
    ///
    /// Operator action for bringing loaded state back into trust after the
    /// register was reset, for example by a reboot. Whoever calls this
    /// vouches that the stored state was not tampered with while the service
    /// was down. Returns the sealed root, or `None` if nothing is registered.
    ///
    /// # Errors
    ///
    /// Returns `AnchorUnavailable` if the root cannot be sealed.
    pub fn reseal(&self) -> Result<Option<Hash>> {
        let _writer = self.writer.lock();
        let published = self.snapshot.write();

        let root = match published.root_hash() {
            Some(root) => root,
            None => return Ok(None),
        };
        self.anchor.seal_root(&root)?;
        warn!(
            root = %to_hex(&root),
            leaves = published.len(),
            "stored root re-sealed by operator"
        );
        Ok(Some(root))
    }

    /// Clears durable state, empties the accumulator and resets the register.
    ///
    /// The register is reset first, so a failure afterwards leaves every
    /// verification untrusted rather than trusting stale state.
    pub fn reset(&self) -> Result<()> {
        let _writer = self.writer.lock();
        let mut published = self.snapshot.write();

        self.anchor.reset()?;
        self.store.clear()?;
        *published = Arc::new(MerkleAccumulator::new());

        info!("integrity service reset");
        Ok(())
    }

    /// Root of the published snapshot.
    pub fn root_hash(&self) -> Option<Hash> {
        self.current().root_hash()
    }

    /// Real leaves in the published snapshot.
    pub fn len(&self) -> usize {
        self.current().len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.current().is_empty()
    }

    /// The trust anchor this service seals into.
    pub fn anchor(&self) -> &TrustAnchor {
        &self.anchor
    }

    /// The published snapshot.
    pub fn snapshot(&self) -> Arc<MerkleAccumulator> {
        self.current()
    }

    fn current(&self) -> Arc<MerkleAccumulator> {
        Arc::clone(&self.snapshot.read())
    }
}

impl std::fmt::Debug for IntegrityService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntegrityService")
            .field("leaves", &self.len())
            .field("anchor", &self.anchor)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fntrust_accumulator::NodeId;
    use fntrust_protocol::ClientKeyPair;

    fn test_service() -> (Arc<SimulatedBank>, IntegrityService) {
        let bank = Arc::new(SimulatedBank::new());
        let anchor = TrustAnchor::new(bank.clone(), 16);
        let store = SledStore::temporary().unwrap();
        (bank, IntegrityService::new(Box::new(store), anchor).unwrap())
    }

    #[test]
    fn test_register_seals_root() {
        let (_, service) = test_service();
        let outcome = service.register(b"A").unwrap();

        assert_eq!(outcome.leaf_index, 0);
        assert_eq!(outcome.leaf_count, 1);
        assert_eq!(service.root_hash(), Some(outcome.root_hash));
        assert!(service.anchor().verify_root(&outcome.root_hash).unwrap());
    }

    #[test]
    fn test_empty_content_is_registrable() {
        let (_, service) = test_service();
        service.register(b"").unwrap();

        assert_eq!(service.len(), 1);
        assert!(service.verify(&VerifyRequest::new(Vec::new())).unwrap().trusted);
        assert!(!service.verify(&VerifyRequest::new(b"A".to_vec())).unwrap().trusted);
    }

    #[test]
    fn test_reseal_on_empty_service_is_noop() {
        let (bank, service) = test_service();
        assert_eq!(service.reseal().unwrap(), None);
        assert_eq!(bank.read(16).unwrap(), RESET_VALUE);
    }

    #[test]
    fn test_empty_accumulator_skips_anchor() {
        let (bank, service) = test_service();
        bank.set_available(false);

        let outcome = service.verify(&VerifyRequest::new(b"A".to_vec())).unwrap();
        assert!(!outcome.trusted);
        assert!(!outcome.anchor_confirmed);
        assert_eq!(outcome.verdict, VerdictString::False);
    }

    #[test]
    fn test_tampered_snapshot_not_trusted() {
        let (_, service) = test_service();
        for content in [b"A", b"B", b"C"] {
            service.register(content).unwrap();
        }

        {
            let mut guard = service.snapshot.write();
            let mut tampered = MerkleAccumulator::clone(&guard);
            let parent = tampered.parent_of(NodeId(1)).unwrap();
            tampered.corrupt_node(parent, [0xEE; 32]);
            *guard = Arc::new(tampered);
        }

        let outcome = service.verify(&VerifyRequest::new(b"B".to_vec())).unwrap();
        assert!(outcome.anchor_confirmed);
        assert!(!outcome.trusted);
    }

    #[test]
    fn test_freshness_without_key_rejected() {
        let (_, service) = test_service();
        service.register(b"A").unwrap();

        let mut request = VerifyRequest::new(b"A".to_vec());
        request.freshness = Some(b"n".to_vec());
        assert!(matches!(
            service.verify(&request),
            Err(IntegrityError::Validation(_))
        ));
    }

    #[test]
    fn test_freshness_bound_into_tag() {
        let (_, service) = test_service();
        service.register(b"A").unwrap();
        let client = ClientKeyPair::generate();

        let request = VerifyRequest::new(b"A".to_vec())
            .with_client_key(client.public_key_bytes().to_vec())
            .with_freshness(b"req-1".to_vec());
        let outcome = service.verify(&request).unwrap();
        let auth = outcome.authentication.unwrap();

        assert!(client.check(&auth, Some(b"req-1")).unwrap());
        assert!(!client.check(&auth, None).unwrap());
    }

    #[test]
    fn test_reset_empties_everything() {
        let (bank, service) = test_service();
        service.register(b"A").unwrap();

        service.reset().unwrap();

        assert!(service.is_empty());
        assert_eq!(service.root_hash(), None);
        assert_eq!(bank.read(16).unwrap(), RESET_VALUE);
        assert!(!service.verify(&VerifyRequest::new(b"A".to_vec())).unwrap().trusted);
    }
}
