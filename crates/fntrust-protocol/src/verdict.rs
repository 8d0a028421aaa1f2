//! Verdict authentication (server half).

use crate::error::{ProtocolError, Result};
use crate::keys::{encode_public_key, parse_public_key, PublicKeyBytes};
use crate::wire::WireHeaders;
use hmac::{Hmac, Mac};
use p256::ecdh::EphemeralSecret;
use rand_core::OsRng;
use serde::{Deserialize, Serialize, Serializer};
use sha2::Sha256;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

pub(crate) type HmacSha256 = Hmac<Sha256>;

/// Length of an HMAC-SHA256 tag.
pub const MAC_TAG_SIZE: usize = 32;

/// Separates the verdict from a caller-supplied freshness value in the MAC input.
pub const FRESHNESS_SEPARATOR: u8 = 0x00;

/// Boolean verdict in its canonical string form.
///
/// The MAC is computed over exactly these bytes, so they must never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerdictString {
    /// `"true"`
    True,
    /// `"false"`
    False,
}

impl VerdictString {
    /// Canonical string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            VerdictString::True => "true",
            VerdictString::False => "false",
        }
    }

    /// Whether this is the `"true"` verdict.
    pub fn is_true(&self) -> bool {
        matches!(self, VerdictString::True)
    }
}

impl From<bool> for VerdictString {
    fn from(value: bool) -> Self {
        if value {
            VerdictString::True
        } else {
            VerdictString::False
        }
    }
}

impl fmt::Display for VerdictString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VerdictString {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "true" => Ok(VerdictString::True),
            "false" => Ok(VerdictString::False),
            other => Err(ProtocolError::InvalidEncoding(format!(
                "verdict must be \"true\" or \"false\", got {:?}",
                other
            ))),
        }
    }
}

/// A verdict together with the evidence that lets one client check it.
///
/// The three fields travel together. The tag alone means nothing without
/// the matching ephemeral server key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedVerdict {
    /// The verdict that was MACed.
    pub verdict: VerdictString,

    /// `HMAC-SHA256(shared_x, verdict [|| 0x00 || freshness])`.
    pub mac_tag: [u8; MAC_TAG_SIZE],

    /// Ephemeral server public key, raw `X || Y`.
    pub server_public_key: PublicKeyBytes,
}

impl Serialize for AuthenticatedVerdict {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        WireHeaders::from_verdict(self).serialize(serializer)
    }
}

/// Authenticates `verdict` for the holder of `client_key`.
///
/// A fresh ephemeral key pair is generated for every call and its secret
/// is dropped before returning. The MAC key is the big-endian X coordinate
/// of the ECDH shared point in its minimal form (see [`mac_key`]).
///
/// # Example
///
/// ```rust
/// use fntrust_protocol::{authenticate, ClientKeyPair, VerdictString};
///
/// let client = ClientKeyPair::generate();
/// let sealed = authenticate(VerdictString::True, &client.public_key_bytes())?;
///
/// assert!(client.check(&sealed, None)?);
/// # Ok::<(), fntrust_protocol::ProtocolError>(())
/// ```
///
/// # Errors
///
/// Returns `ProtocolError::InvalidPublicKey` if `client_key` does not decode
/// to a point on P-256.
pub fn authenticate(verdict: VerdictString, client_key: &[u8]) -> Result<AuthenticatedVerdict> {
    seal(verdict, client_key, None)
}

/// Like [`authenticate`], binding a caller-supplied freshness value into the tag.
///
/// The client must present the same value to [`crate::ClientKeyPair::check`].
pub fn authenticate_with_freshness(
    verdict: VerdictString,
    client_key: &[u8],
    freshness: &[u8],
) -> Result<AuthenticatedVerdict> {
    seal(verdict, client_key, Some(freshness))
}

fn seal(
    verdict: VerdictString,
    client_key: &[u8],
    freshness: Option<&[u8]>,
) -> Result<AuthenticatedVerdict> {
    let client = parse_public_key(client_key)?;

    let ephemeral = EphemeralSecret::random(&mut OsRng);
    let server_public_key = encode_public_key(&ephemeral.public_key());
    let shared = ephemeral.diffie_hellman(&client);
    drop(ephemeral);

    let mac = keyed_mac(shared.raw_secret_bytes().as_slice(), verdict, freshness)?;
    let mut mac_tag = [0u8; MAC_TAG_SIZE];
    mac_tag.copy_from_slice(&mac.finalize().into_bytes());

    debug!(
        verdict = verdict.as_str(),
        fresh = freshness.is_some(),
        "verdict authenticated"
    );
    Ok(AuthenticatedVerdict {
        verdict,
        mac_tag,
        server_public_key,
    })
}

/// HMAC key derived from the shared X coordinate.
///
/// Leading zero bytes are stripped, so the key is the coordinate as an
/// unsigned big-endian integer of minimal length. HMAC pads short keys with
/// trailing zeros, which makes the stripped and fixed-width keys differ
/// whenever the coordinate starts with `0x00`.
pub fn mac_key(shared_x: &[u8]) -> &[u8] {
    let start = shared_x
        .iter()
        .position(|byte| *byte != 0)
        .unwrap_or(shared_x.len());
    &shared_x[start..]
}

/// HMAC keyed from `shared_x` that has already absorbed the verdict message.
pub(crate) fn keyed_mac(
    shared_x: &[u8],
    verdict: VerdictString,
    freshness: Option<&[u8]>,
) -> Result<HmacSha256> {
    let mut mac =
        HmacSha256::new_from_slice(mac_key(shared_x)).map_err(|_| ProtocolError::MacKey)?;
    mac.update(verdict.as_str().as_bytes());
    if let Some(freshness) = freshness {
        mac.update(&[FRESHNESS_SEPARATOR]);
        mac.update(freshness);
    }
    Ok(mac)
}
