// crates/invoice-signer-core/src/runtime/sweeper.rs
// ============================================================================
// Module: Recovery Sweeper
// Description: Resets lingering claims and guards run epilogues.
// Purpose: Guarantee claimed rows become retryable on every exit path.
// Dependencies: crate::{audit, core, interfaces}
// ============================================================================

//! ## Overview
//! [`RecoverySweeper`] resets claimed rows to `(Unclaimed, NotDone)` for one
//! actor or for every actor. [`ClaimGuard`] owns claim ownership for a run:
//! the engine releases it explicitly to observe the cleared count, and its
//! `Drop` sweeps if the run unwinds before release.
//!
//! # Invariants
//! - An armed guard sweeps exactly once.
//! - Sweeping never touches `SuccessState::Done` rows that are unclaimed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::audit::SignerAuditEvent;
use crate::audit::SignerAuditKind;
use crate::audit::SignerAuditSink;
use crate::core::identifiers::ActorId;
use crate::interfaces::SigningStore;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Sweeper
// ============================================================================

/// Resets stale claims.
pub struct RecoverySweeper<'a, S: SigningStore + ?Sized> {
    /// Store gateway.
    store: &'a S,
    /// Audit sink.
    audit: &'a dyn SignerAuditSink,
}

impl<'a, S: SigningStore + ?Sized> RecoverySweeper<'a, S> {
    /// Creates a sweeper.
    #[must_use]
    pub fn new(store: &'a S, audit: &'a dyn SignerAuditSink) -> Self {
        Self {
            store,
            audit,
        }
    }

    /// Resets every claimed row owned by `actor`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the reset statement fails.
    pub fn clear_claim(&self, actor: &ActorId) -> Result<usize, StoreError> {
        self.sweep(Some(actor))
    }

    /// Resets every claimed row for every actor.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the reset statement fails.
    pub fn clear_all(&self) -> Result<usize, StoreError> {
        self.sweep(None)
    }

    /// Runs the reset and audits the result.
    fn sweep(&self, actor: Option<&ActorId>) -> Result<usize, StoreError> {
        let cleared = self.store.clear_claims(actor)?;
        self.audit.record(&SignerAuditEvent::new(
            actor,
            SignerAuditKind::ClaimsCleared {
                cleared,
            },
        ));
        Ok(cleared)
    }
}

// ============================================================================
// SECTION: Claim Guard
// ============================================================================

/// Scoped claim ownership for one run.
pub struct ClaimGuard<'a, S: SigningStore + ?Sized> {
    /// Sweeper used on release.
    sweeper: RecoverySweeper<'a, S>,
    /// Actor whose claims are owned.
    actor: &'a ActorId,
    /// Whether a sweep is still owed.
    armed: bool,
}

impl<'a, S: SigningStore + ?Sized> ClaimGuard<'a, S> {
    /// Arms a guard for `actor`.
    #[must_use]
    pub fn arm(sweeper: RecoverySweeper<'a, S>, actor: &'a ActorId) -> Self {
        Self {
            sweeper,
            actor,
            armed: true,
        }
    }

    /// Sweeps now and disarms the guard.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the reset statement fails.
    pub fn release(mut self) -> Result<usize, StoreError> {
        self.armed = false;
        self.sweeper.clear_claim(self.actor)
    }
}

impl<S: SigningStore + ?Sized> Drop for ClaimGuard<'_, S> {
    fn drop(&mut self) {
        if self.armed {
            self.armed = false;
            let _ = self.sweeper.clear_claim(self.actor);
        }
    }
}
