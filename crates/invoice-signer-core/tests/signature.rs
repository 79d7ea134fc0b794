// crates/invoice-signer-core/tests/signature.rs
// ============================================================================
// Module: Reference Signer Tests
// Description: Tests for the ed25519 document signer and verification.
// Purpose: Ensure ownership, validity, and determinism checks hold.
// Dependencies: invoice-signer-core, ed25519-dalek
// ============================================================================
//! ## Overview
//! Signs fixture records and verifies the produced artifacts.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    missing_docs,
    dead_code,
    reason = "Test-only panic-based assertions are permitted; shared fixtures may be unused."
)]

mod common;

use common::broker_record;
use common::certificate;
use common::issuer_record;
use ed25519_dalek::SigningKey;
use invoice_signer_core::DocumentSigner;
use invoice_signer_core::Ed25519DocumentSigner;
use invoice_signer_core::SigningError;
use invoice_signer_core::verify_artifact;
use time::Duration;
use time::OffsetDateTime;

#[test]
fn signed_artifact_verifies_and_is_deterministic() {
    let cert = certificate("A1");
    let record = issuer_record("r1", "A1");
    let signer = Ed25519DocumentSigner::new();

    let first = signer.sign(&record, &cert).unwrap();
    let second = signer.sign(&record, &cert).unwrap();

    assert_eq!(first, second);
    assert_eq!(first.digest.len(), 64);
    assert_eq!(first.signer_serial.as_str(), "serial-A1");
    verify_artifact(&first, &cert.verifying_key()).unwrap();
}

#[test]
fn tampered_document_fails_verification() {
    let cert = certificate("A1");
    let mut artifact = Ed25519DocumentSigner::new().sign(&issuer_record("r1", "A1"), &cert).unwrap();
    artifact.signed_document.push(b' ');

    let err = verify_artifact(&artifact, &cert.verifying_key()).unwrap_err();
    assert!(matches!(err, SigningError::Verification(_)));
}

#[test]
fn wrong_key_fails_verification() {
    let cert = certificate("A1");
    let artifact = Ed25519DocumentSigner::new().sign(&issuer_record("r1", "A1"), &cert).unwrap();
    let other = SigningKey::from_bytes(&[9u8; 32]).verifying_key();

    assert!(verify_artifact(&artifact, &other).is_err());
}

#[test]
fn signer_rejects_records_owned_by_another_actor() {
    let signer = Ed25519DocumentSigner::new();
    let err = signer.sign(&issuer_record("r1", "A1"), &certificate("B1")).unwrap_err();
    assert!(matches!(err, SigningError::CertificateMismatch { .. }));

    let brokered = broker_record("r2", "A1", "BR");
    assert!(signer.sign(&brokered, &certificate("A1")).is_err());
    assert!(signer.sign(&brokered, &certificate("BR")).is_ok());
}

#[test]
fn signer_rejects_unknown_type_codes_and_empty_ids() {
    let signer = Ed25519DocumentSigner::new();
    let mut record = issuer_record("r1", "A1");
    record.type_code = "0199".to_string();
    assert!(matches!(signer.sign(&record, &certificate("A1")), Err(SigningError::MalformedRecord(_))));

    let empty = issuer_record("", "A1");
    assert!(matches!(signer.sign(&empty, &certificate("A1")), Err(SigningError::MalformedRecord(_))));
}

#[test]
fn signer_enforces_validity_window() {
    let now = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
    let cert = (*certificate("A1"))
        .clone()
        .with_validity(Some(now - Duration::days(1)), Some(now + Duration::days(1)));
    let record = issuer_record("r1", "A1");

    assert!(Ed25519DocumentSigner::at(now).sign(&record, &cert).is_ok());
    let expired = Ed25519DocumentSigner::at(now + Duration::days(2)).sign(&record, &cert);
    assert!(matches!(expired, Err(SigningError::CertificateExpired(_))));
    let early = Ed25519DocumentSigner::at(now - Duration::days(2)).sign(&record, &cert);
    assert!(matches!(early, Err(SigningError::CertificateExpired(_))));
}
