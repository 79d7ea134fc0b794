// crates/invoice-signer-config/src/lib.rs
// ============================================================================
// Module: Invoice Signer Config Library
// Description: Canonical config model and validation.
// Purpose: Single source of truth for invoice-signer.toml semantics.
// Dependencies: invoice-signer-core, invoice-signer-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! `invoice-signer-config` defines the configuration model for the invoice
//! signer. Validation is strict and fail-closed; the certificate section
//! loads the ed25519 signing key the engine signs with.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
