//! Header encoding of an authenticated verdict.
//!
//! | Header | Value |
//! |--------|-------|
//! | `X-Trust-Verification` | `true` or `false` |
//! | `X-MAC-Tag` | hex, 32 bytes |
//! | `X-Server-Public-Key` | hex, 64 bytes (`X || Y`) |
//!
//! The request carries the client key in `X-Invoker-Public-Key`, also hex.

use crate::error::{ProtocolError, Result};
use crate::keys::PUBLIC_KEY_SIZE;
use crate::verdict::{AuthenticatedVerdict, VerdictString, MAC_TAG_SIZE};
use serde::{Deserialize, Serialize};

/// Response header carrying the verdict string.
pub const VERIFICATION_HEADER: &str = "X-Trust-Verification";
/// Response header carrying the hex MAC tag.
pub const MAC_TAG_HEADER: &str = "X-MAC-Tag";
/// Response header carrying the hex ephemeral server key.
pub const SERVER_KEY_HEADER: &str = "X-Server-Public-Key";
/// Request header carrying the hex client key.
pub const INVOKER_KEY_HEADER: &str = "X-Invoker-Public-Key";

/// The three response fields, hex-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireHeaders {
    /// `true` or `false`.
    pub verification: String,
    /// Hex-encoded HMAC-SHA256 tag.
    pub mac_tag: String,
    /// Hex-encoded raw `X || Y` server key.
    pub server_public_key: String,
}

impl WireHeaders {
    /// Encodes an authenticated verdict.
    pub fn from_verdict(verdict: &AuthenticatedVerdict) -> Self {
        WireHeaders {
            verification: verdict.verdict.as_str().to_string(),
            mac_tag: hex::encode(verdict.mac_tag),
            server_public_key: hex::encode(verdict.server_public_key),
        }
    }

    /// Decodes all three fields; any bad field fails the whole set.
    pub fn parse(&self) -> Result<AuthenticatedVerdict> {
        let verdict: VerdictString = self.verification.parse()?;
        let mac_tag = decode_fixed::<MAC_TAG_SIZE>(&self.mac_tag, MAC_TAG_HEADER)?;
        let server_public_key =
            decode_fixed::<PUBLIC_KEY_SIZE>(&self.server_public_key, SERVER_KEY_HEADER)?;

        Ok(AuthenticatedVerdict {
            verdict,
            mac_tag,
            server_public_key,
        })
    }

    /// `(name, value)` pairs in a stable order.
    pub fn pairs(&self) -> [(&'static str, &str); 3] {
        [
            (VERIFICATION_HEADER, self.verification.as_str()),
            (MAC_TAG_HEADER, self.mac_tag.as_str()),
            (SERVER_KEY_HEADER, self.server_public_key.as_str()),
        ]
    }
}

/// Decodes a hex-encoded invoker public key header value.
pub fn decode_invoker_key(value: &str) -> Result<Vec<u8>> {
    hex::decode(value.trim()).map_err(|e| {
        ProtocolError::InvalidEncoding(format!("{}: {}", INVOKER_KEY_HEADER, e))
    })
}

fn decode_fixed<const N: usize>(value: &str, header: &str) -> Result<[u8; N]> {
    let bytes = hex::decode(value.trim())
        .map_err(|e| ProtocolError::InvalidEncoding(format!("{}: {}", header, e)))?;
    bytes.try_into().map_err(|bytes: Vec<u8>| {
        ProtocolError::InvalidEncoding(format!(
            "{}: {} bytes, expected {}",
            header,
            bytes.len(),
            N
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientKeyPair;
    use crate::verdict::authenticate;

    fn sealed() -> (ClientKeyPair, AuthenticatedVerdict) {
        let client = ClientKeyPair::generate();
        let verdict = authenticate(VerdictString::True, &client.public_key_bytes()).unwrap();
        (client, verdict)
    }

    #[test]
    fn test_headers_carry_verdict_to_client() {
        let (client, verdict) = sealed();
        let headers = WireHeaders::from_verdict(&verdict);

        assert_eq!(headers.verification, "true");
        assert_eq!(headers.mac_tag.len(), 64);
        assert_eq!(headers.server_public_key.len(), 128);

        let received = headers.parse().unwrap();
        assert_eq!(received, verdict);
        assert!(client.check(&received, None).unwrap());
    }

    #[test]
    fn test_bad_field_fails_whole_set() {
        let (_, verdict) = sealed();
        let good = WireHeaders::from_verdict(&verdict);

        let mut bad_verdict = good.clone();
        bad_verdict.verification = "yes".to_string();
        assert!(bad_verdict.parse().is_err());

        let mut short_tag = good.clone();
        short_tag.mac_tag.truncate(62);
        assert!(matches!(
            short_tag.parse(),
            Err(ProtocolError::InvalidEncoding(_))
        ));

        let mut not_hex = good;
        not_hex.server_public_key.replace_range(0..2, "zz");
        assert!(not_hex.parse().is_err());
    }

    #[test]
    fn test_pairs_order_and_names() {
        let (_, verdict) = sealed();
        let headers = WireHeaders::from_verdict(&verdict);
        let names: Vec<_> = headers.pairs().iter().map(|(name, _)| *name).collect();

        assert_eq!(
            names,
            vec!["X-Trust-Verification", "X-MAC-Tag", "X-Server-Public-Key"]
        );
    }

    #[test]
    fn test_serialized_verdict_uses_wire_form() {
        let (_, verdict) = sealed();
        let json = serde_json::to_value(&verdict).unwrap();

        assert_eq!(json["verification"], "true");
        assert_eq!(json["mac_tag"], hex::encode(verdict.mac_tag));
    }

    #[test]
    fn test_invoker_key_decoding() {
        let client = ClientKeyPair::generate();
        let encoded = hex::encode(client.public_key_bytes());

        assert_eq!(
            decode_invoker_key(&encoded).unwrap(),
            client.public_key_bytes().to_vec()
        );
        assert!(decode_invoker_key("0x1234").is_err());
    }
}
