//! # Trust Anchor
//!
//! Hardware-rooted attestation of the accumulator root. A root is trusted
//! only while a designated extend-only register equals `H(ZERO || root)`.
//!
//! ## Threat Model
//!
//! The anchor defends against:
//! - **Storage rollback**: an attacker restoring an older database cannot
//!   make its root match the register.
//! - **Root substitution**: a forged tree with a different root fails the
//!   register comparison even if its internal hashes are self-consistent.
//! - **Silent device loss**: an unreachable device is an error, never a pass.
//!
//! It does not defend against an attacker who can issue register commands
//! at the same locality as the service.
//!
//! ## Components
//!
//! | Component | Purpose |
//! |-----------|---------|
//! | [`RegisterBank`] | Reset/extend/read primitives |
//! | [`SimulatedBank`] | In-memory bank for tests and device-less hosts |
//! | [`TpmBank`] | TPM 2.0 bank over a command transport |
//! | [`TrustAnchor`] | Seals and checks roots against one register |
//!
//! ## Register Model
//!
//! ```text
//! reset:   R ← 0^256
//! extend:  R ← SHA-256(R ‖ data)
//! seal:    reset, then extend(root)      ⇒  R = SHA-256(0^256 ‖ root)
//! verify:  read() == SHA-256(0^256 ‖ root)
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use fntrust_anchor::{SimulatedBank, TrustAnchor};
//! use std::sync::Arc;
//!
//! let bank = Arc::new(SimulatedBank::new());
//! let anchor = TrustAnchor::new(bank.clone(), 16);
//!
//! anchor.seal_root(&[0xAA; 32])?;
//! assert!(anchor.verify_root(&[0xAA; 32])?);
//!
//! bank.set_available(false);
//! assert!(anchor.verify_root(&[0xAA; 32]).is_err());
//! # Ok::<(), fntrust_anchor::AnchorError>(())
//! ```
//!
//! ## References
//!
//! - TCG, "Trusted Platform Module Library, Part 1: Architecture", rev 1.59,
//!   section 17 (PCR operations).

mod anchor;
mod bank;
mod error;
mod tpm;

pub use anchor::{TrustAnchor, DEFAULT_REGISTER_INDEX};
pub use bank::{
    extend_value, RegisterBank, RegisterValue, SimulatedBank, REGISTER_COUNT, REGISTER_SIZE,
    RESET_VALUE,
};
pub use error::{AnchorError, Result};
pub use tpm::{
    decode_pcr_read, encode_pcr_extend, encode_pcr_read, encode_pcr_reset, DeviceTransport,
    TpmBank, TpmTransport, DEFAULT_TPM_DEVICE,
};
