// crates/invoice-signer-core/src/lib.rs
// ============================================================================
// Module: Invoice Signer Core Library
// Description: Public API surface for the invoice signing scheduler.
// Purpose: Expose core types, interfaces, audit sinks, and the runtime.
// Dependencies: crate::{audit, core, interfaces, runtime, signature}
// ============================================================================

//! ## Overview
//! Invoice signer core claims unsigned records under mutual exclusion, signs
//! them page by page on a bounded worker pool, persists the signed deltas,
//! and always returns lingering claims to the unclaimed pool. Storage and
//! cryptography plug in through [`SigningStore`] and [`DocumentSigner`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod core;
pub mod interfaces;
pub mod runtime;
pub mod signature;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use audit::FileAuditSink;
pub use audit::MemoryAuditSink;
pub use audit::NoopAuditSink;
pub use audit::SignerAuditEvent;
pub use audit::SignerAuditKind;
pub use audit::SignerAuditSink;
pub use audit::StderrAuditSink;
pub use interfaces::ClaimOutcome;
pub use interfaces::DocumentSigner;
pub use interfaces::SigningError;
pub use interfaces::SigningStore;
pub use interfaces::StoreError;
pub use runtime::AbortCause;
pub use runtime::BackgroundRun;
pub use runtime::ClaimStrategy;
pub use runtime::DispatchMode;
pub use runtime::EngineConfig;
pub use runtime::EngineError;
pub use runtime::InMemorySigningStore;
pub use runtime::MAX_PAGE_SIZE;
pub use runtime::SigningEngine;
pub use runtime::SigningReport;
pub use runtime::SigningRequest;
pub use runtime::SigningRun;
pub use runtime::StopReason;
pub use runtime::StoreOperation;
pub use signature::Ed25519DocumentSigner;
pub use signature::verify_artifact;
