//! The trust anchor: one designated register holding a sealed root.

use crate::bank::{extend_value, RegisterBank, RegisterValue, RESET_VALUE};
use crate::error::Result;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Register conventionally reserved for debug and application use.
pub const DEFAULT_REGISTER_INDEX: u32 = 16;

/// Seals roots into, and checks roots against, a single register.
///
/// Sealing always resets first, so after `seal_root(R)` the register equals
/// exactly `H(RESET_VALUE || R)` no matter what was sealed before. The anchor
/// holds no other state; it reads the device on every check.
///
/// # Example
///
/// ```rust
/// use fntrust_anchor::{SimulatedBank, TrustAnchor, DEFAULT_REGISTER_INDEX};
/// use std::sync::Arc;
///
/// let anchor = TrustAnchor::new(Arc::new(SimulatedBank::new()), DEFAULT_REGISTER_INDEX);
/// let root = [0x42u8; 32];
///
/// anchor.seal_root(&root)?;
/// assert!(anchor.verify_root(&root)?);
/// assert!(!anchor.verify_root(&[0x43u8; 32])?);
/// # Ok::<(), fntrust_anchor::AnchorError>(())
/// ```
#[derive(Clone)]
pub struct TrustAnchor {
    bank: Arc<dyn RegisterBank>,
    index: u32,
}

impl TrustAnchor {
    /// Binds an anchor to register `index` of `bank`.
    pub fn new(bank: Arc<dyn RegisterBank>, index: u32) -> Self {
        TrustAnchor { bank, index }
    }

    /// The register this anchor seals into.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Register value that attests to `root`.
    pub fn expected_value(root: &RegisterValue) -> RegisterValue {
        extend_value(&RESET_VALUE, root)
    }

    /// Makes `root` the sealed root.
    ///
    /// # Errors
    ///
    /// Returns `AnchorError::Unavailable` if either primitive fails. The
    /// register may then hold the reset value, which attests to nothing.
    pub fn seal_root(&self, root: &RegisterValue) -> Result<()> {
        self.bank.reset(self.index)?;
        self.bank.extend(self.index, root)?;
        info!(index = self.index, "root sealed into trust anchor");
        Ok(())
    }

    /// True iff the register currently attests to `root`.
    pub fn verify_root(&self, root: &RegisterValue) -> Result<bool> {
        let current = self.bank.read(self.index)?;
        let confirmed = current == Self::expected_value(root);
        if !confirmed {
            warn!(index = self.index, "trust anchor does not attest to root");
        }
        Ok(confirmed)
    }

    /// Returns the register to the reset value.
    pub fn reset(&self) -> Result<()> {
        self.bank.reset(self.index)?;
        debug!(index = self.index, "trust anchor reset");
        Ok(())
    }

    /// Raw register value.
    pub fn current_value(&self) -> Result<RegisterValue> {
        self.bank.read(self.index)
    }
}

impl std::fmt::Debug for TrustAnchor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrustAnchor")
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}
