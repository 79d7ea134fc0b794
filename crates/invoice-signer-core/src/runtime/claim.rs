// crates/invoice-signer-core/src/runtime/claim.rs
// ============================================================================
// Module: Claim Manager
// Description: Exclusive count-then-mark claiming of eligible records.
// Purpose: Ensure no record is claimed by two in-flight runs at once.
// Dependencies: crate::{audit, core, interfaces}
// ============================================================================

//! ## Overview
//! Claiming is a read-then-write against the store. Under
//! [`ClaimStrategy::ProcessLock`] a process-wide mutex serializes every claim
//! attempt; under [`ClaimStrategy::AtomicStatement`] the store performs both
//! steps inside one transaction so exclusivity also holds across processes.
//!
//! # Invariants
//! - When claimed rows already exist in scope, nothing new is marked and the
//!   attempt reports zero.
//! - Marking only touches rows that are unclaimed and not yet done.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Mutex;
use std::sync::PoisonError;

use serde::Deserialize;
use serde::Serialize;

use crate::audit::SignerAuditEvent;
use crate::audit::SignerAuditKind;
use crate::audit::SignerAuditSink;
use crate::core::selector::ClaimScope;
use crate::interfaces::ClaimOutcome;
use crate::interfaces::SigningStore;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Claim Lock
// ============================================================================

/// Process-wide lock guarding count-then-mark.
static CLAIM_LOCK: Mutex<()> = Mutex::new(());

// ============================================================================
// SECTION: Strategy
// ============================================================================

/// How claim exclusivity is enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStrategy {
    /// In-process mutex around separate count and mark statements.
    #[default]
    ProcessLock,
    /// Store-level transaction performing count and mark together.
    AtomicStatement,
}

// ============================================================================
// SECTION: Claim Manager
// ============================================================================

/// Claims eligible records for one actor.
pub struct ClaimManager<'a, S: SigningStore + ?Sized> {
    /// Store gateway.
    store: &'a S,
    /// Exclusivity strategy.
    strategy: ClaimStrategy,
    /// Audit sink for reentry diagnostics.
    audit: &'a dyn SignerAuditSink,
}

impl<'a, S: SigningStore + ?Sized> ClaimManager<'a, S> {
    /// Creates a claim manager.
    #[must_use]
    pub fn new(store: &'a S, strategy: ClaimStrategy, audit: &'a dyn SignerAuditSink) -> Self {
        Self {
            store,
            strategy,
            audit,
        }
    }

    /// Attempts to claim rows in scope and returns the number claimed.
    ///
    /// A reentrant attempt is not an error: it is audited and returns zero.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the count or mark statement fails.
    pub fn try_claim(&self, scope: &ClaimScope) -> Result<usize, StoreError> {
        let outcome = match self.strategy {
            ClaimStrategy::ProcessLock => {
                let _guard = CLAIM_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
                let working_rows = self.store.count_claimed(scope)?;
                if working_rows > 0 {
                    ClaimOutcome::Reentrant {
                        working_rows,
                    }
                } else {
                    ClaimOutcome::Claimed(self.store.mark_claimed(scope)?)
                }
            }
            ClaimStrategy::AtomicStatement => self.store.claim_exclusive(scope)?,
        };
        match outcome {
            ClaimOutcome::Claimed(claimed) => {
                if claimed > 0 {
                    self.audit.record(&SignerAuditEvent::new(
                        Some(&scope.actor_id),
                        SignerAuditKind::ClaimAcquired {
                            claimed,
                        },
                    ));
                }
                Ok(claimed)
            }
            ClaimOutcome::Reentrant {
                working_rows,
            } => {
                self.audit.record(&SignerAuditEvent::new(
                    Some(&scope.actor_id),
                    SignerAuditKind::ClaimReentry {
                        working_rows,
                    },
                ));
                Ok(0)
            }
        }
    }
}
