// crates/invoice-signer-core/src/core/mod.rs
// ============================================================================
// Module: Invoice Signer Core Types
// Description: Canonical record, selector, certificate, and delta types.
// Purpose: Provide stable, serializable types shared by every backend.
// Dependencies: ed25519-dalek, serde, time
// ============================================================================

//! ## Overview
//! Core types describe signable records, the claim markers that drive the
//! claim/load/sign/recover loop, and the delta rows it persists. Store
//! backends and transports build on these types without redefining them.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod certificate;
pub mod delta;
pub mod identifiers;
pub mod profile;
pub mod record;
pub mod selector;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use certificate::SigningCertificate;
pub use delta::SignedArtifact;
pub use delta::SignedResult;
pub use identifiers::ActorId;
pub use identifiers::CertificateSerial;
pub use identifiers::RecordId;
pub use profile::CustomerProfile;
pub use record::BROKER_MEDIATED_SUFFIXES;
pub use record::ClaimState;
pub use record::DIRECT_ISSUER_SUFFIXES;
pub use record::OwnershipRegime;
pub use record::RecordState;
pub use record::SignableRecord;
pub use record::SuccessState;
pub use selector::ClaimScope;
pub use selector::DateRange;
pub use selector::RecordSelector;
pub use selector::SelectorError;
