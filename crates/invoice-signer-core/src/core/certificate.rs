// crates/invoice-signer-core/src/core/certificate.rs
// ============================================================================
// Module: Invoice Signer Certificates
// Description: Signing certificate handle passed through a signing request.
// Purpose: Bind an actor identity and validity window to an ed25519 key.
// Dependencies: ed25519-dalek, time
// ============================================================================

//! ## Overview
//! A [`SigningCertificate`] is issued externally and handed to the engine per
//! request. Key material never appears in `Debug` output.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use ed25519_dalek::SigningKey;
use ed25519_dalek::VerifyingKey;
use time::OffsetDateTime;

use crate::core::identifiers::ActorId;
use crate::core::identifiers::CertificateSerial;

// ============================================================================
// SECTION: Certificate
// ============================================================================

/// Signing certificate for one actor.
#[derive(Clone)]
pub struct SigningCertificate {
    /// Actor the certificate was issued to.
    pub subject_id: ActorId,
    /// Certificate serial recorded on every artifact.
    pub serial: CertificateSerial,
    /// Start of validity, when bounded.
    pub not_before: Option<OffsetDateTime>,
    /// End of validity, when bounded.
    pub not_after: Option<OffsetDateTime>,
    /// Private signing key.
    signing_key: SigningKey,
}

impl SigningCertificate {
    /// Creates an unbounded certificate.
    #[must_use]
    pub const fn new(subject_id: ActorId, serial: CertificateSerial, signing_key: SigningKey) -> Self {
        Self {
            subject_id,
            serial,
            not_before: None,
            not_after: None,
            signing_key,
        }
    }

    /// Sets the validity window.
    #[must_use]
    pub const fn with_validity(
        mut self,
        not_before: Option<OffsetDateTime>,
        not_after: Option<OffsetDateTime>,
    ) -> Self {
        self.not_before = not_before;
        self.not_after = not_after;
        self
    }

    /// Returns the private signing key.
    #[must_use]
    pub const fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    /// Returns the public verifying key.
    #[must_use]
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Returns true when `at` falls inside the validity window.
    #[must_use]
    pub fn is_valid_at(&self, at: OffsetDateTime) -> bool {
        let after_start = self.not_before.is_none_or(|start| at >= start);
        let before_end = self.not_after.is_none_or(|end| at <= end);
        after_start && before_end
    }
}

impl fmt::Debug for SigningCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningCertificate")
            .field("subject_id", &self.subject_id)
            .field("serial", &self.serial)
            .field("not_before", &self.not_before)
            .field("not_after", &self.not_after)
            .finish_non_exhaustive()
    }
}
