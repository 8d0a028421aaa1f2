//! Error types for the integrity service.

use fntrust_accumulator::AccumulatorError;
use fntrust_anchor::AnchorError;
use fntrust_protocol::ProtocolError;
use thiserror::Error;

/// Result type alias for service operations.
pub type Result<T> = std::result::Result<T, IntegrityError>;

/// Typed failures of the integrity service.
///
/// A verification that legitimately fails is not an error. It is an `Ok`
/// outcome with `trusted: false`.
#[derive(Debug, Error)]
pub enum IntegrityError {
    /// Bad caller input: malformed client key, freshness without a key.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The trust anchor could not be read or written.
    #[error("trust anchor unavailable: {0}")]
    AnchorUnavailable(#[from] AnchorError),

    /// Durable state could not be loaded or saved.
    #[error("persistence failure: {0}")]
    Persistence(#[from] AccumulatorError),

    /// A verdict could not be authenticated.
    #[error("protocol failure: {0}")]
    Protocol(#[from] ProtocolError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Coarse classification for mapping errors onto transport responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad caller input.
    Validation,
    /// Trust anchor could not be reached.
    AnchorUnavailable,
    /// Durable state could not be read or written.
    Persistence,
    /// Verdict could not be authenticated.
    Protocol,
    /// Configuration rejected.
    Config,
}

impl IntegrityError {
    /// Coarse category for mapping to a response.
    pub fn kind(&self) -> ErrorKind {
        match self {
            IntegrityError::Validation(_) => ErrorKind::Validation,
            IntegrityError::AnchorUnavailable(_) => ErrorKind::AnchorUnavailable,
            IntegrityError::Persistence(_) => ErrorKind::Persistence,
            IntegrityError::Protocol(_) => ErrorKind::Protocol,
            IntegrityError::Config(_) => ErrorKind::Config,
        }
    }
}
