//! Request and outcome types exchanged with the orchestrating layer.

use fntrust_accumulator::Hash;
use fntrust_protocol::{AuthenticatedVerdict, VerdictString, WireHeaders};
use serde::{Serialize, Serializer};

fn hash_as_hex<S: Serializer>(hash: &Hash, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&hex::encode(hash))
}

/// Result of a successful registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegisterOutcome {
    /// Root after the append, now sealed into the anchor.
    #[serde(serialize_with = "hash_as_hex")]
    pub root_hash: Hash,

    /// Position of the new leaf.
    pub leaf_index: usize,

    /// Real leaves in the accumulator.
    pub leaf_count: usize,
}

/// A verification request.
///
/// ```rust
/// use fntrust_core::VerifyRequest;
///
/// let request = VerifyRequest::new(b"fn handler() {}".to_vec())
///     .with_client_key(vec![0u8; 64])
///     .with_freshness(b"request-42".to_vec());
/// assert!(request.client_public_key.is_some());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyRequest {
    /// Artifact to check.
    pub content: Vec<u8>,

    /// Invoker's public key. When present the verdict is authenticated.
    pub client_public_key: Option<Vec<u8>>,

    /// Value bound into the MAC. Requires `client_public_key`.
    pub freshness: Option<Vec<u8>>,
}

impl VerifyRequest {
    /// Unauthenticated request for `content`.
    pub fn new(content: impl Into<Vec<u8>>) -> Self {
        VerifyRequest {
            content: content.into(),
            ..Default::default()
        }
    }

    /// Requests an authenticated verdict for `key`.
    pub fn with_client_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.client_public_key = Some(key.into());
        self
    }

    /// Binds `freshness` into the verdict tag.
    pub fn with_freshness(mut self, freshness: impl Into<Vec<u8>>) -> Self {
        self.freshness = Some(freshness.into());
        self
    }
}

/// Result of a verification call that ran to completion.
///
/// `trusted: false` is a legitimate answer, not a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifyOutcome {
    /// Path and anchor both agree.
    pub trusted: bool,

    /// `trusted` in its canonical string form.
    pub verdict: VerdictString,

    /// The anchor attested to the root the path was checked against.
    pub anchor_confirmed: bool,

    /// Present exactly when the request carried a client key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authentication: Option<AuthenticatedVerdict>,
}

impl VerifyOutcome {
    /// Hex wire fields; all three or none.
    pub fn to_headers(&self) -> Option<WireHeaders> {
        self.authentication.as_ref().map(WireHeaders::from_verdict)
    }
}
