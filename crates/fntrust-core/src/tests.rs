//! Unit tests for fntrust-core.

use crate::{ErrorKind, IntegrityError, RegisterOutcome, VerdictString, VerifyOutcome};
use fntrust_anchor::AnchorError;
use fntrust_protocol::{authenticate, ClientKeyPair, ProtocolError};

#[test]
fn test_error_kinds_are_distinct() {
    let errors = [
        IntegrityError::Validation("bad".to_string()),
        IntegrityError::from(AnchorError::Unavailable("gone".to_string())),
        IntegrityError::from(fntrust_accumulator::AccumulatorError::CorruptRecord(
            "x".to_string(),
        )),
        IntegrityError::from(ProtocolError::MacKey),
        IntegrityError::Config("c".to_string()),
    ];
    let kinds: Vec<ErrorKind> = errors.iter().map(IntegrityError::kind).collect();

    assert_eq!(
        kinds,
        vec![
            ErrorKind::Validation,
            ErrorKind::AnchorUnavailable,
            ErrorKind::Persistence,
            ErrorKind::Protocol,
            ErrorKind::Config,
        ]
    );
}

#[test]
fn test_register_outcome_serializes_hex_root() {
    let outcome = RegisterOutcome {
        root_hash: [0xAB; 32],
        leaf_index: 2,
        leaf_count: 3,
    };
    let json = serde_json::to_value(&outcome).unwrap();

    assert_eq!(json["root_hash"], "ab".repeat(32));
    assert_eq!(json["leaf_count"], 3);
}

#[test]
fn test_verify_outcome_headers_only_when_authenticated() {
    let plain = VerifyOutcome {
        trusted: false,
        verdict: VerdictString::False,
        anchor_confirmed: true,
        authentication: None,
    };
    assert!(plain.to_headers().is_none());
    assert!(serde_json::to_value(&plain)
        .unwrap()
        .get("authentication")
        .is_none());

    let client = ClientKeyPair::generate();
    let sealed = authenticate(VerdictString::True, &client.public_key_bytes()).unwrap();
    let authenticated = VerifyOutcome {
        trusted: true,
        verdict: VerdictString::True,
        anchor_confirmed: true,
        authentication: Some(sealed.clone()),
    };

    let headers = authenticated.to_headers().unwrap();
    assert_eq!(headers.verification, "true");
    assert_eq!(headers.parse().unwrap(), sealed);

    let json = serde_json::to_value(&authenticated).unwrap();
    assert_eq!(json["verdict"], "true");
    assert_eq!(json["authentication"]["mac_tag"], hex::encode(sealed.mac_tag));
}
