//! Error types for the trust anchor.
//!
//! None of these may be read as "verification passed". Callers either
//! propagate them or turn them into a failed call.

use thiserror::Error;

/// Result type alias for anchor operations.
pub type Result<T> = std::result::Result<T, AnchorError>;

/// Errors raised by register banks and the trust anchor.
#[derive(Debug, Error)]
pub enum AnchorError {
    /// The underlying device could not be reached.
    ///
    /// Fatal for the current call. The anchor never retries.
    #[error("trust anchor unavailable: {0}")]
    Unavailable(String),

    /// The register index is outside the bank.
    #[error("register index {0} is out of range")]
    InvalidIndex(u32),

    /// The device answered with a non-success response code.
    #[error("device rejected command {command:#x} with response code {code:#x}")]
    Device {
        /// Command code that was rejected
        command: u32,
        /// Raw response code returned by the device
        code: u32,
    },

    /// The device answered with bytes that do not parse.
    #[error("malformed device response: {0}")]
    Malformed(String),
}
