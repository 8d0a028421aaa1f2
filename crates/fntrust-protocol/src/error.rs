//! Error types for the verdict protocol.

use thiserror::Error;

/// Result type alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised while authenticating or checking a verdict.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The key is the wrong length or not a point on P-256.
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    /// A wire field could not be decoded.
    #[error("invalid encoding: {0}")]
    InvalidEncoding(String),

    /// HMAC rejected the derived key. Not reachable: HMAC accepts keys of any length.
    #[error("failed to initialise HMAC key")]
    MacKey,
}
