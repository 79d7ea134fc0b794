// crates/invoice-signer-core/src/signature.rs
// ============================================================================
// Module: Invoice Signer Reference Signer
// Description: Ed25519 document signer over RFC 8785 canonical JSON.
// Purpose: Provide a deterministic DocumentSigner and artifact verification.
// Dependencies: base64, ed25519-dalek, serde_jcs, sha2, time
// ============================================================================

//! ## Overview
//! [`Ed25519DocumentSigner`] canonicalizes the record identity fields and
//! document payload with RFC 8785 JSON, hashes them with SHA-256, and signs
//! the digest bytes with the certificate key.
//!
//! # Invariants
//! - The certificate subject must be the record's authoritative owner.
//! - The same record and key always yield the same artifact.

// ============================================================================
// SECTION: Imports
// ============================================================================

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use ed25519_dalek::Signature;
use ed25519_dalek::Signer as _;
use ed25519_dalek::VerifyingKey;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;
use time::OffsetDateTime;

use crate::core::certificate::SigningCertificate;
use crate::core::delta::SignedArtifact;
use crate::core::record::SignableRecord;
use crate::interfaces::DocumentSigner;
use crate::interfaces::SigningError;

// ============================================================================
// SECTION: Canonical Payload
// ============================================================================

/// Fields covered by the signature.
#[derive(Serialize)]
struct CanonicalDocument<'a> {
    /// Record identifier.
    record_id: &'a str,
    /// Record type code.
    type_code: &'a str,
    /// Issuer identity.
    issuer_id: &'a str,
    /// Broker identity.
    broker_id: Option<&'a str>,
    /// Counterpart identity.
    counterpart_id: Option<&'a str>,
    /// Issue date (unix seconds).
    issue_date: i64,
    /// Document payload.
    document: &'a serde_json::Value,
}

// ============================================================================
// SECTION: Signer
// ============================================================================

/// Ed25519 reference implementation of [`DocumentSigner`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519DocumentSigner {
    /// Fixed evaluation time for validity checks; `None` uses the wall clock.
    fixed_time: Option<OffsetDateTime>,
}

impl Ed25519DocumentSigner {
    /// Creates a signer that checks validity against the wall clock.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            fixed_time: None,
        }
    }

    /// Creates a signer that checks validity at a fixed instant.
    #[must_use]
    pub const fn at(time: OffsetDateTime) -> Self {
        Self {
            fixed_time: Some(time),
        }
    }

    /// Returns the instant used for validity checks.
    fn now(&self) -> OffsetDateTime {
        self.fixed_time.unwrap_or_else(OffsetDateTime::now_utc)
    }
}

impl DocumentSigner for Ed25519DocumentSigner {
    fn sign(
        &self,
        record: &SignableRecord,
        certificate: &SigningCertificate,
    ) -> Result<SignedArtifact, SigningError> {
        if record.record_id.as_str().is_empty() {
            return Err(SigningError::MalformedRecord("empty record id".to_string()));
        }
        if record.regime().is_none() {
            return Err(SigningError::MalformedRecord(format!(
                "unknown type code {} on record {}",
                record.type_code, record.record_id
            )));
        }
        if !record.is_owned_by(&certificate.subject_id) {
            return Err(SigningError::CertificateMismatch {
                subject: certificate.subject_id.to_string(),
                record_id: record.record_id.to_string(),
            });
        }
        if !certificate.is_valid_at(self.now()) {
            return Err(SigningError::CertificateExpired(certificate.serial.to_string()));
        }

        let canonical = CanonicalDocument {
            record_id: record.record_id.as_str(),
            type_code: &record.type_code,
            issuer_id: record.issuer_id.as_str(),
            broker_id: record.broker_id.as_ref().map(|id| id.as_str()),
            counterpart_id: record.counterpart_id.as_deref(),
            issue_date: record.issue_date,
            document: &record.document,
        };
        let signed_document = serde_jcs::to_vec(&canonical)
            .map_err(|err| SigningError::Canonicalization(err.to_string()))?;
        let digest = Sha256::digest(&signed_document);
        let signature = certificate.signing_key().sign(&digest);
        Ok(SignedArtifact {
            signer_serial: certificate.serial.clone(),
            digest: hex_encode(&digest),
            signature: BASE64.encode(signature.to_bytes()),
            signed_document,
        })
    }
}

// ============================================================================
// SECTION: Verification
// ============================================================================

/// Verifies an artifact's digest and signature against a public key.
///
/// # Errors
///
/// Returns [`SigningError::Verification`] when the digest does not match the
/// signed bytes, the signature is malformed, or verification fails.
pub fn verify_artifact(artifact: &SignedArtifact, key: &VerifyingKey) -> Result<(), SigningError> {
    let digest = Sha256::digest(&artifact.signed_document);
    if hex_encode(&digest) != artifact.digest {
        return Err(SigningError::Verification("digest mismatch".to_string()));
    }
    let bytes = BASE64
        .decode(artifact.signature.as_bytes())
        .map_err(|_| SigningError::Verification("invalid signature encoding".to_string()))?;
    let signature = Signature::try_from(bytes.as_slice())
        .map_err(|_| SigningError::Verification("invalid signature bytes".to_string()))?;
    key.verify_strict(&digest, &signature)
        .map_err(|_| SigningError::Verification("signature verification failed".to_string()))
}

/// Encodes bytes as a lowercase hex string.
fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(char::from(HEX[usize::from(byte >> 4)]));
        out.push(char::from(HEX[usize::from(byte & 0x0f)]));
    }
    out
}
