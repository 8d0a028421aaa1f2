//! Client half of the verdict protocol.

use crate::error::{ProtocolError, Result};
use crate::keys::{encode_public_key, parse_public_key, PublicKeyBytes};
use crate::verdict::{keyed_mac, AuthenticatedVerdict};
use hmac::Mac;
use p256::ecdh::diffie_hellman;
use p256::SecretKey;
use rand_core::OsRng;
use tracing::debug;

/// Long-lived key pair held by an invoking client.
///
/// The client sends [`public_key_bytes`](Self::public_key_bytes) with its
/// request and uses [`check`](Self::check) to confirm that the verdict it
/// got back was produced for it.
#[derive(Clone)]
pub struct ClientKeyPair {
    secret: SecretKey,
}

impl ClientKeyPair {
    /// Generates a new key pair from the OS RNG.
    pub fn generate() -> Self {
        ClientKeyPair {
            secret: SecretKey::random(&mut OsRng),
        }
    }

    /// Restores a key pair from a 32-byte big-endian scalar.
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self> {
        let secret = SecretKey::from_slice(bytes)
            .map_err(|_| ProtocolError::InvalidEncoding("secret scalar out of range".to_string()))?;
        Ok(ClientKeyPair { secret })
    }

    /// Big-endian secret scalar.
    pub fn secret_bytes(&self) -> [u8; 32] {
        self.secret.to_bytes().into()
    }

    pub(crate) fn secret(&self) -> &SecretKey {
        &self.secret
    }

    /// Public key in the raw `X || Y` wire form.
    pub fn public_key_bytes(&self) -> PublicKeyBytes {
        encode_public_key(&self.secret.public_key())
    }

    /// Checks the tag on `verdict` in constant time.
    ///
    /// `freshness` must be the value the request carried, if any.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::InvalidPublicKey` if the server key is not a
    /// point on P-256. A tag that simply does not match is `Ok(false)`.
    pub fn check(&self, verdict: &AuthenticatedVerdict, freshness: Option<&[u8]>) -> Result<bool> {
        let server = parse_public_key(&verdict.server_public_key)?;
        let shared = diffie_hellman(self.secret.to_nonzero_scalar(), server.as_affine());

        let mac = keyed_mac(
            shared.raw_secret_bytes().as_slice(),
            verdict.verdict,
            freshness,
        )?;
        let valid = mac.verify_slice(&verdict.mac_tag).is_ok();
        debug!(valid, "verdict tag checked");
        Ok(valid)
    }
}

impl std::fmt::Debug for ClientKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientKeyPair")
            .field("public_key", &hex::encode(self.public_key_bytes()))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verdict::{authenticate, VerdictString};

    #[test]
    fn test_honest_verdict_checks() {
        let client = ClientKeyPair::generate();
        for verdict in [VerdictString::True, VerdictString::False] {
            let sealed = authenticate(verdict, &client.public_key_bytes()).unwrap();
            assert!(client.check(&sealed, None).unwrap());
        }
    }

    #[test]
    fn test_flipped_verdict_fails() {
        let client = ClientKeyPair::generate();
        let mut sealed = authenticate(VerdictString::False, &client.public_key_bytes()).unwrap();

        sealed.verdict = VerdictString::True;
        assert!(!client.check(&sealed, None).unwrap());
    }

    #[test]
    fn test_other_client_cannot_check() {
        let alice = ClientKeyPair::generate();
        let mallory = ClientKeyPair::generate();
        let sealed = authenticate(VerdictString::True, &alice.public_key_bytes()).unwrap();

        assert!(!mallory.check(&sealed, None).unwrap());
    }

    #[test]
    fn test_tampered_tag_fails() {
        let client = ClientKeyPair::generate();
        let mut sealed = authenticate(VerdictString::True, &client.public_key_bytes()).unwrap();

        sealed.mac_tag[0] ^= 0x01;
        assert!(!client.check(&sealed, None).unwrap());
    }

    #[test]
    fn test_secret_bytes_restore_same_key() {
        let client = ClientKeyPair::generate();
        let restored = ClientKeyPair::from_secret_bytes(&client.secret_bytes()).unwrap();

        assert_eq!(restored.public_key_bytes(), client.public_key_bytes());
        assert!(ClientKeyPair::from_secret_bytes(&[0u8; 32]).is_err());
        assert!(ClientKeyPair::from_secret_bytes(&[1u8; 7]).is_err());
    }
}
