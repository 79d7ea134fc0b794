// crates/invoice-signer-core/src/core/delta.rs
// ============================================================================
// Module: Invoice Signer Deltas
// Description: Signed artifacts and the delta rows persisted per page.
// Purpose: Carry signing output from the worker pool to the result persister.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A [`SignedResult`] is written once per successfully signed record and never
//! mutated. It embeds the [`SignedArtifact`] returned by the document signer.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::ActorId;
use crate::core::identifiers::CertificateSerial;
use crate::core::identifiers::RecordId;
use crate::core::record::SignableRecord;

// ============================================================================
// SECTION: Signed Artifact
// ============================================================================

/// Output of the signing primitive for one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedArtifact {
    /// Serial of the certificate used.
    pub signer_serial: CertificateSerial,
    /// Lowercase hex SHA-256 of the canonical document bytes.
    pub digest: String,
    /// Base64 signature over the digest bytes.
    pub signature: String,
    /// Canonical document bytes that were signed.
    pub signed_document: Vec<u8>,
}

// ============================================================================
// SECTION: Signed Result
// ============================================================================

/// Delta row produced for one successfully signed record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedResult {
    /// Signed record id.
    pub record_id: RecordId,
    /// Actor the record was signed for.
    pub actor_id: ActorId,
    /// Record type code.
    pub type_code: String,
    /// Issuer contact email.
    pub issuer_email: Option<String>,
    /// Counterpart contact email.
    pub counterpart_email: Option<String>,
    /// Broker contact email.
    pub broker_email: Option<String>,
    /// Provider identity.
    pub provider_id: Option<String>,
    /// Provider contact email.
    pub provider_email: Option<String>,
    /// Signing output.
    pub artifact: SignedArtifact,
    /// Signing time as unix milliseconds.
    pub signed_at_ms: i64,
}

impl SignedResult {
    /// Builds a delta row from the loaded record and its artifact.
    #[must_use]
    pub fn from_record(
        record: &SignableRecord,
        actor_id: &ActorId,
        artifact: SignedArtifact,
        signed_at_ms: i64,
    ) -> Self {
        Self {
            record_id: record.record_id.clone(),
            actor_id: actor_id.clone(),
            type_code: record.type_code.clone(),
            issuer_email: record.issuer_email.clone(),
            counterpart_email: record.counterpart_email.clone(),
            broker_email: record.broker_email.clone(),
            provider_id: record.provider_id.clone(),
            provider_email: record.provider_email.clone(),
            artifact,
            signed_at_ms,
        }
    }
}
