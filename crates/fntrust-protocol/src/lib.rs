//! # Verdict Protocol
//!
//! Lets an invoking client confirm that a verification verdict was produced
//! by the integrity service for *this* request and was not altered in
//! transit.
//!
//! ## Threat Model
//!
//! Defends against:
//! - **Verdict flipping**: an on-path attacker rewriting `false` to `true`
//!   cannot produce a matching tag without the ECDH shared secret.
//! - **Cross-client reuse**: a verdict authenticated for one client key
//!   does not check under another.
//! - **Replay** (opt-in): when the client supplies a freshness value, it is
//!   bound into the tag and an old response no longer checks.
//!
//! Without a freshness value, a recorded `true` response for the same client
//! key can be replayed. Clients that care must send one.
//!
//! ## Exchange
//!
//! ```text
//!  Client                                   Service
//!    │  request + X-Invoker-Public-Key (C)     │
//!    │────────────────────────────────────────►│  (e, E) ← fresh P-256 pair
//!    │                                         │  k ← x(e·C)
//!    │                                         │  t ← HMAC-SHA256(k, verdict)
//!    │  verdict, t, E                          │  drop e
//!    │◄────────────────────────────────────────│
//!    │  k ← x(c·E); verify t                   │
//! ```
//!
//! `k` is the X coordinate as a minimal-length big-endian integer: leading
//! zero bytes are stripped before keying the HMAC.
//!
//! ## Quick Start
//!
//! ```rust
//! use fntrust_protocol::{authenticate, ClientKeyPair, VerdictString, WireHeaders};
//!
//! let client = ClientKeyPair::generate();
//! let sealed = authenticate(VerdictString::from(true), &client.public_key_bytes())?;
//!
//! let headers = WireHeaders::from_verdict(&sealed);
//! let received = headers.parse()?;
//! assert!(client.check(&received, None)?);
//! # Ok::<(), fntrust_protocol::ProtocolError>(())
//! ```
//!
//! ## References
//!
//! - NIST SP 800-56A Rev. 3, "Pair-Wise Key-Establishment Schemes Using
//!   Discrete Logarithm Cryptography"
//! - RFC 2104, "HMAC: Keyed-Hashing for Message Authentication"

mod client;
mod error;
mod keys;
mod verdict;
mod wire;

pub use client::ClientKeyPair;
pub use error::{ProtocolError, Result};
pub use keys::{encode_public_key, parse_public_key, PublicKeyBytes, PUBLIC_KEY_SIZE};
pub use verdict::{
    authenticate, authenticate_with_freshness, mac_key, AuthenticatedVerdict, VerdictString,
    FRESHNESS_SEPARATOR, MAC_TAG_SIZE,
};
pub use wire::{
    decode_invoker_key, WireHeaders, INVOKER_KEY_HEADER, MAC_TAG_HEADER, SERVER_KEY_HEADER,
    VERIFICATION_HEADER,
};
