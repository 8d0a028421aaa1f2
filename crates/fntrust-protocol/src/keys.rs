//! P-256 public key encodings.
//!
//! On the wire a public key is the raw 64-byte concatenation `X || Y` of its
//! big-endian affine coordinates. SEC1 encodings are also accepted on input
//! so that clients built on common crypto libraries can pass keys unchanged.

use crate::error::{ProtocolError, Result};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::PublicKey;

/// Length of the raw `X || Y` form.
pub const PUBLIC_KEY_SIZE: usize = 64;

/// Raw `X || Y` public key.
pub type PublicKeyBytes = [u8; PUBLIC_KEY_SIZE];

const SEC1_UNCOMPRESSED_TAG: u8 = 0x04;
const SEC1_UNCOMPRESSED_SIZE: usize = 65;
const SEC1_COMPRESSED_SIZE: usize = 33;

/// Decodes a public key and checks that it lies on P-256.
///
/// Accepts raw `X || Y` (64 bytes), SEC1 uncompressed (65 bytes) and SEC1
/// compressed (33 bytes). The point at infinity is never accepted.
///
/// # Errors
///
/// Returns `ProtocolError::InvalidPublicKey` for any other length or for
/// coordinates that are not a curve point.
pub fn parse_public_key(bytes: &[u8]) -> Result<PublicKey> {
    let parsed = match bytes.len() {
        PUBLIC_KEY_SIZE => {
            let mut sec1 = [0u8; SEC1_UNCOMPRESSED_SIZE];
            sec1[0] = SEC1_UNCOMPRESSED_TAG;
            sec1[1..].copy_from_slice(bytes);
            PublicKey::from_sec1_bytes(&sec1)
        }
        SEC1_UNCOMPRESSED_SIZE | SEC1_COMPRESSED_SIZE => PublicKey::from_sec1_bytes(bytes),
        other => {
            return Err(ProtocolError::InvalidPublicKey(format!(
                "{} bytes, expected {}",
                other, PUBLIC_KEY_SIZE
            )))
        }
    };

    parsed.map_err(|_| ProtocolError::InvalidPublicKey("not a point on P-256".to_string()))
}

/// Encodes a public key in the raw `X || Y` wire form.
pub fn encode_public_key(key: &PublicKey) -> PublicKeyBytes {
    let point = key.to_encoded_point(false);
    let mut raw = [0u8; PUBLIC_KEY_SIZE];
    // Uncompressed SEC1 is the tag byte followed by X || Y
    raw.copy_from_slice(&point.as_bytes()[1..]);
    raw
}
