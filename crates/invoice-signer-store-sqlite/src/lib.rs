// crates/invoice-signer-store-sqlite/src/lib.rs
// ============================================================================
// Module: SQLite Signing Store
// Description: Durable SigningStore backend using SQLite.
// Purpose: Persist invoice markers, signed deltas, and customer profiles.
// Dependencies: invoice-signer-core, rusqlite
// ============================================================================

//! ## Overview
//! This crate provides a SQLite-backed [`SigningStore`] implementation. The
//! claim markers live on the invoice rows themselves, so a crashed run leaves
//! residue that the recovery sweep or a manual clear can reset.
//!
//! [`SigningStore`]: invoice_signer_core::SigningStore

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::SqliteSigningStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
