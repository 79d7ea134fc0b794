// crates/invoice-signer-core/src/interfaces/mod.rs
// ============================================================================
// Module: Invoice Signer Interfaces
// Description: Backend-agnostic contracts for the store gateway and signer.
// Purpose: Define the seams the signing runtime drives.
// Dependencies: crate::core, thiserror
// ============================================================================

//! ## Overview
//! Interfaces decouple the claim/sign/recover runtime from concrete storage
//! and cryptography. Store implementations surface every backend failure as
//! a single [`StoreError`]; signers report per-record [`SigningError`]s that
//! the worker pool contains within a page.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::certificate::SigningCertificate;
use crate::core::delta::SignedArtifact;
use crate::core::delta::SignedResult;
use crate::core::identifiers::ActorId;
use crate::core::profile::CustomerProfile;
use crate::core::record::SignableRecord;
use crate::core::selector::ClaimScope;

// ============================================================================
// SECTION: Store Gateway
// ============================================================================

/// Uniform store gateway errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Store I/O error.
    #[error("signing store io error: {0}")]
    Io(String),
    /// Database engine reported an error.
    #[error("signing store database error: {0}")]
    Db(String),
    /// Stored data is invalid.
    #[error("signing store invalid data: {0}")]
    Invalid(String),
    /// Requested entity does not exist.
    #[error("signing store entity not found: {0}")]
    NotFound(String),
    /// Store reported an error.
    #[error("signing store error: {0}")]
    Store(String),
}

/// Result of an atomic claim attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// Rows were marked claimed (possibly zero).
    Claimed(usize),
    /// Claimed rows already exist in scope; nothing was marked.
    Reentrant {
        /// Rows already bearing the claimed marker.
        working_rows: usize,
    },
}

/// Store gateway driven by the signing runtime.
///
/// # Invariants
/// - Ownership predicates follow the record type-code regime.
/// - `mark_claimed` and `claim_exclusive` only mark rows that are unclaimed
///   and not yet done, lowest record ids first, up to the scope quantity.
/// - `insert_delta` writes every row and flips the signed records to
///   `(Unclaimed, Done)` atomically.
pub trait SigningStore: Send + Sync {
    /// Counts rows in scope that bear the claimed marker.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn count_claimed(&self, scope: &ClaimScope) -> Result<usize, StoreError>;

    /// Marks eligible rows in scope as claimed and returns the affected count.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the update fails.
    fn mark_claimed(&self, scope: &ClaimScope) -> Result<usize, StoreError>;

    /// Performs count-then-mark as one store-level atomic operation.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the transaction fails.
    fn claim_exclusive(&self, scope: &ClaimScope) -> Result<ClaimOutcome, StoreError>;

    /// Loads up to `limit` claimed rows in scope ordered by record id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn load_claimed_page(
        &self,
        scope: &ClaimScope,
        limit: usize,
    ) -> Result<Vec<SignableRecord>, StoreError>;

    /// Persists a batch of delta rows.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails; no row is persisted then.
    fn insert_delta(&self, results: &[SignedResult]) -> Result<(), StoreError>;

    /// Resets claimed rows to `(Unclaimed, NotDone)` for one actor or all.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the update fails.
    fn clear_claims(&self, actor: Option<&ActorId>) -> Result<usize, StoreError>;

    /// Looks up the customer profile for an actor.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn customer_profile(&self, actor: &ActorId) -> Result<Option<CustomerProfile>, StoreError>;
}

// ============================================================================
// SECTION: Document Signer
// ============================================================================

/// Signing primitive errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SigningError {
    /// Certificate subject does not own the record.
    #[error("certificate subject {subject} does not own record {record_id}")]
    CertificateMismatch {
        /// Certificate subject.
        subject: String,
        /// Offending record id.
        record_id: String,
    },
    /// Certificate is outside its validity window.
    #[error("certificate {0} is not valid at signing time")]
    CertificateExpired(String),
    /// Record payload is malformed.
    #[error("malformed record: {0}")]
    MalformedRecord(String),
    /// Canonicalization of the document failed.
    #[error("document canonicalization failed: {0}")]
    Canonicalization(String),
    /// Signature verification failed.
    #[error("signature verification failed: {0}")]
    Verification(String),
}

/// Opaque per-record signing primitive.
pub trait DocumentSigner: Send + Sync {
    /// Signs one record with the given certificate.
    ///
    /// # Errors
    ///
    /// Returns [`SigningError`] on malformed input or certificate misuse.
    fn sign(
        &self,
        record: &SignableRecord,
        certificate: &SigningCertificate,
    ) -> Result<SignedArtifact, SigningError>;
}
