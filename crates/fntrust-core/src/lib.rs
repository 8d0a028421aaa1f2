//! # fntrust Core
//!
//! Integrity service for serverless function artifacts. Every registered
//! artifact is accumulated into a Merkle root, the root is sealed into an
//! extend-only hardware register, and every verification checks both.
//!
//! ## Trust Chain
//!
//! | Layer | Component | Detects |
//! |-------|-----------|---------|
//! | Membership | Merkle accumulator | Unregistered or altered artifacts |
//! | Binding | Trust anchor | Rolled-back or substituted state |
//! | Delivery | Verdict protocol | Verdicts altered in transit |
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      INTEGRITY SERVICE                          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │   register(content)                verify(request)              │
//! │        │                                 │                      │
//! │        ▼                                 ▼                      │
//! │  ┌─────────────┐  save   ┌─────────┐  ┌─────────────────┐       │
//! │  │ clone+append├────────►│  Sled   │  │ snapshot (Arc)  │       │
//! │  └──────┬──────┘         └─────────┘  └────────┬────────┘       │
//! │         │ seal + publish                       │ verify_root    │
//! │         ▼                                      ▼                │
//! │  ┌────────────────────────────────────────────────────┐         │
//! │  │           Trust anchor (register 16)               │         │
//! │  └────────────────────────────────────────────────────┘         │
//! │                                                │                │
//! │                                   authenticate ▼ (client key)   │
//! │                                 verdict + MAC tag + server key  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use fntrust_core::{IntegrityService, ServiceConfig, VerifyRequest};
//! use fntrust_protocol::ClientKeyPair;
//!
//! let temp = tempfile::TempDir::new().unwrap();
//! let mut config = ServiceConfig::default();
//! config.storage.path = temp.path().join("fntrust.db");
//!
//! let service = IntegrityService::from_config(&config)?;
//! service.register(b"exports.handler = () => 42")?;
//!
//! let client = ClientKeyPair::generate();
//! let request = VerifyRequest::new(b"exports.handler = () => 42".to_vec())
//!     .with_client_key(client.public_key_bytes().to_vec());
//! let outcome = service.verify(&request)?;
//!
//! assert!(outcome.trusted);
//! assert!(client.check(outcome.authentication.as_ref().unwrap(), None)?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Security Notes
//!
//! - Verification is fail-closed: anchor failures are errors, never passes
//! - An empty accumulator never verifies anything
//! - A failed verification is a successful call with `trusted: false`
//! - Each authenticated verdict uses a fresh ephemeral server key
//! - Startup never seals: stored state is trusted only if the register
//!   already attests to it, otherwise after the next registration or an
//!   explicit `reseal`
//!
//! ## Error Mapping
//!
//! | Kind | Meaning |
//! |------|---------|
//! | `Validation` | the caller's input was bad |
//! | `AnchorUnavailable` | the register could not be reached |
//! | `Persistence` | durable state could not be loaded or saved |
//! | `Protocol` | the verdict could not be authenticated |

mod config;
mod error;
mod outcome;
mod service;

pub use config::{
    AnchorBackend, AnchorConfig, LoggingConfig, ServiceConfig, StorageConfig, ENV_ANCHOR_BACKEND,
    ENV_DB_PATH, ENV_LOG, ENV_PCR_INDEX, ENV_TPM_DEVICE,
};
pub use error::{ErrorKind, IntegrityError, Result};
pub use outcome::{RegisterOutcome, VerifyOutcome, VerifyRequest};
pub use service::IntegrityService;

// Re-export component types for convenience
pub use fntrust_accumulator::{Hash, SledStore, StateStore};
pub use fntrust_anchor::{TrustAnchor, DEFAULT_REGISTER_INDEX};
pub use fntrust_protocol::{AuthenticatedVerdict, VerdictString, WireHeaders};

#[cfg(test)]
mod tests;
