// crates/invoice-signer-core/src/runtime/mod.rs
// ============================================================================
// Module: Invoice Signer Runtime
// Description: Claim/load/sign/persist/recover scheduler components.
// Purpose: Execute signing requests against a store gateway and signer.
// Dependencies: crate::{audit, core, interfaces}
// ============================================================================

//! ## Overview
//! Runtime modules implement the claim manager, batch loader, worker pool,
//! result persister, recovery sweeper, and the signing engine that drives
//! them. All entry points (CLI, queue triggers) call into the same engine.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod claim;
pub mod engine;
pub mod loader;
pub mod persister;
pub mod pool;
pub mod store;
pub mod sweeper;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use claim::ClaimManager;
pub use claim::ClaimStrategy;
pub use engine::AbortCause;
pub use engine::BackgroundRun;
pub use engine::EngineConfig;
pub use engine::EngineError;
pub use engine::SigningEngine;
pub use engine::SigningReport;
pub use engine::SigningRequest;
pub use engine::SigningRun;
pub use engine::StopReason;
pub use loader::BatchLoader;
pub use loader::MAX_PAGE_SIZE;
pub use persister::ResultPersister;
pub use pool::DispatchMode;
pub use pool::PageOutcome;
pub use pool::PoolError;
pub use pool::RecordFailure;
pub use pool::SigningWorkerPool;
pub use store::InMemorySigningStore;
pub use store::StoreOperation;
pub use sweeper::ClaimGuard;
pub use sweeper::RecoverySweeper;
