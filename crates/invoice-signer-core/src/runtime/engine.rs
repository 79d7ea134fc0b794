// crates/invoice-signer-core/src/runtime/engine.rs
// ============================================================================
// Module: Signing Engine
// Description: Claim, load, sign, persist, and recover orchestration.
// Purpose: Drive one signing request from claim to guaranteed recovery sweep.
// Dependencies: crate::{audit, core, interfaces, runtime}, serde, thiserror
// ============================================================================

//! ## Overview
//! [`SigningEngine::request_signing`] claims rows for an actor, then loops:
//! load a page, sign it on the worker pool, persist the page's deltas, and
//! decrement the remaining claimed count by the page size. The loop ends when
//! the count is exhausted, a page comes back empty, or a page is smaller than
//! `min_page_rows`. Pages run strictly in sequence.
//!
//! Every run that claimed rows ends with a recovery sweep for the actor. The
//! sweep runs through a [`ClaimGuard`], so it also runs if the loop unwinds.
//! With `blocking = false` the loop runs on a background thread and the call
//! returns a [`BackgroundRun`] holding the claimed count.
//!
//! # Invariants
//! - `completed` only counts rows whose delta write succeeded.
//! - A reentrant claim performs no sweep, so it never resets the claims of
//!   the run already in flight.
//! - Load, persist, and worker failures abort the loop; the sweep still runs.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::thread;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::audit::SignerAuditEvent;
use crate::audit::SignerAuditKind;
use crate::audit::SignerAuditSink;
use crate::core::certificate::SigningCertificate;
use crate::core::identifiers::ActorId;
use crate::core::profile::CustomerProfile;
use crate::core::selector::ClaimScope;
use crate::core::selector::RecordSelector;
use crate::interfaces::DocumentSigner;
use crate::interfaces::SigningStore;
use crate::interfaces::StoreError;
use crate::runtime::claim::ClaimManager;
use crate::runtime::claim::ClaimStrategy;
use crate::runtime::loader::BatchLoader;
use crate::runtime::loader::MAX_PAGE_SIZE;
use crate::runtime::persister::ResultPersister;
use crate::runtime::pool::DispatchMode;
use crate::runtime::pool::SigningWorkerPool;
use crate::runtime::sweeper::ClaimGuard;
use crate::runtime::sweeper::RecoverySweeper;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Engine tuning knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Rows loaded per page (`1 ..= 800`).
    pub page_size: usize,
    /// Maximum concurrent signing workers per page.
    pub max_workers: usize,
    /// Worker dispatch mode.
    pub dispatch_mode: DispatchMode,
    /// Whether `request_signing` waits for the whole run.
    pub blocking: bool,
    /// Pages smaller than this end the loop before signing.
    pub min_page_rows: usize,
    /// Claim exclusivity strategy.
    pub claim_strategy: ClaimStrategy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            page_size: MAX_PAGE_SIZE,
            max_workers: MAX_PAGE_SIZE,
            dispatch_mode: DispatchMode::Barrier,
            blocking: true,
            min_page_rows: 1,
            claim_strategy: ClaimStrategy::ProcessLock,
        }
    }
}

impl EngineConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] when a knob is out of range.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(EngineError::InvalidConfig(format!(
                "page_size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        if self.max_workers == 0 {
            return Err(EngineError::InvalidConfig("max_workers must be at least 1".to_string()));
        }
        if self.min_page_rows == 0 || self.min_page_rows > self.page_size {
            return Err(EngineError::InvalidConfig(
                "min_page_rows must be between 1 and page_size".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Requests and Reports
// ============================================================================

/// One signing request.
#[derive(Debug, Clone)]
pub struct SigningRequest {
    /// Requesting actor.
    pub actor_id: ActorId,
    /// Certificate used for every record in the run.
    pub certificate: Arc<SigningCertificate>,
    /// Row selector.
    pub selector: RecordSelector,
    /// Requested quantity; `None` takes every eligible row (or the id count).
    pub quantity: Option<usize>,
}

/// Why the page loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Nothing was claimed; the loop never ran.
    NothingClaimed,
    /// The claimed count was exhausted.
    QuantityExhausted,
    /// A page came back empty.
    EmptyPage,
    /// A page was smaller than `min_page_rows`.
    BelowThreshold,
}

/// Final counts of a signing run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SigningReport {
    /// Requesting actor.
    pub actor_id: ActorId,
    /// Rows claimed.
    pub claimed: usize,
    /// Pages signed and persisted.
    pub pages: usize,
    /// Rows loaded across pages.
    pub loaded: usize,
    /// Rows signed and persisted.
    pub completed: usize,
    /// Signing attempts the signer rejected.
    pub failed: usize,
    /// Claimed count left when the loop stopped.
    pub remaining: usize,
    /// Rows reset by the recovery sweep.
    pub cleared: usize,
    /// Loop stop reason.
    pub stop: StopReason,
}

impl SigningReport {
    /// Report for a run that claimed nothing.
    fn idle(actor_id: ActorId) -> Self {
        Self {
            actor_id,
            claimed: 0,
            pages: 0,
            loaded: 0,
            completed: 0,
            failed: 0,
            remaining: 0,
            cleared: 0,
            stop: StopReason::NothingClaimed,
        }
    }
}

/// Handle for a run continuing on a background thread.
#[derive(Debug)]
pub struct BackgroundRun {
    /// Rows claimed before the handle was returned.
    claimed: usize,
    /// Worker thread handle.
    handle: thread::JoinHandle<Result<SigningReport, EngineError>>,
}

impl BackgroundRun {
    /// Rows claimed for the run.
    #[must_use]
    pub const fn claimed(&self) -> usize {
        self.claimed
    }

    /// Waits for the run to finish.
    ///
    /// # Errors
    ///
    /// Returns the run's [`EngineError`], or [`EngineError::BackgroundPanicked`]
    /// when the thread panicked.
    pub fn join(self) -> Result<SigningReport, EngineError> {
        self.handle
            .join()
            .map_err(|_| EngineError::BackgroundPanicked("signing run thread panicked".to_string()))?
    }
}

/// Result of `request_signing`.
#[derive(Debug)]
pub enum SigningRun {
    /// The run finished before returning.
    Completed(SigningReport),
    /// The run continues in the background.
    Background(BackgroundRun),
}

impl SigningRun {
    /// Rows claimed by the run.
    #[must_use]
    pub const fn claimed(&self) -> usize {
        match self {
            Self::Completed(report) => report.claimed,
            Self::Background(run) => run.claimed,
        }
    }

    /// Waits for the run and returns its report.
    ///
    /// # Errors
    ///
    /// Returns the background run's [`EngineError`].
    pub fn wait(self) -> Result<SigningReport, EngineError> {
        match self {
            Self::Completed(report) => Ok(report),
            Self::Background(run) => run.join(),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Page-level failure that aborted a run.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AbortCause {
    /// Loading a page failed.
    #[error("page load failed: {0}")]
    Load(StoreError),
    /// Persisting a page's deltas failed.
    #[error("delta persistence failed: {0}")]
    Persist(StoreError),
    /// A signing worker panicked.
    #[error("signing worker panicked: {0}")]
    WorkerPanicked(String),
}

/// Signing engine errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Engine configuration is invalid.
    #[error("invalid engine config: {0}")]
    InvalidConfig(String),
    /// Signing request is invalid.
    #[error("invalid signing request: {0}")]
    InvalidRequest(String),
    /// Claiming failed; nothing was marked.
    #[error("claim failed: {0}")]
    Claim(StoreError),
    /// The run aborted; the recovery sweep still ran.
    #[error("signing run aborted after {completed} completed ({cleared} claims cleared): {cause}")]
    Aborted {
        /// Rows persisted before the failure.
        completed: usize,
        /// Rows reset by the recovery sweep.
        cleared: usize,
        /// Failure that aborted the loop.
        cause: AbortCause,
    },
    /// The recovery sweep failed.
    #[error("recovery sweep failed after {completed} completed: {source}")]
    Recovery {
        /// Rows persisted before the sweep.
        completed: usize,
        /// Loop failure preceding the sweep, if any.
        cause: Option<AbortCause>,
        /// Sweep failure.
        source: StoreError,
    },
    /// An explicit clear request failed.
    #[error("claim sweep failed: {0}")]
    Sweep(StoreError),
    /// Customer profile lookup failed.
    #[error("customer profile lookup failed: {0}")]
    Profile(StoreError),
    /// The background thread could not be started.
    #[error("failed to spawn signing run: {0}")]
    Spawn(String),
    /// The background thread panicked.
    #[error("{0}")]
    BackgroundPanicked(String),
}

// ============================================================================
// SECTION: Engine
// ============================================================================

/// Orchestrates signing runs against a store and a signer.
pub struct SigningEngine<S, G> {
    /// Store gateway.
    store: Arc<S>,
    /// Signing primitive.
    signer: Arc<G>,
    /// Audit sink.
    audit: Arc<dyn SignerAuditSink>,
    /// Engine configuration.
    config: EngineConfig,
}

impl<S, G> Clone for SigningEngine<S, G> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            signer: Arc::clone(&self.signer),
            audit: Arc::clone(&self.audit),
            config: self.config,
        }
    }
}

impl<S, G> SigningEngine<S, G>
where
    S: SigningStore + 'static,
    G: DocumentSigner + 'static,
{
    /// Creates a signing engine.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] when the configuration is invalid.
    pub fn new(
        store: Arc<S>,
        signer: Arc<G>,
        audit: Arc<dyn SignerAuditSink>,
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            store,
            signer,
            audit,
            config,
        })
    }

    /// Returns the engine configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the store gateway.
    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Claims rows for the request and signs them page by page.
    ///
    /// Returns a [`SigningRun::Background`] handle when the engine is
    /// configured non-blocking and rows were claimed.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when the request is invalid, the claim fails,
    /// the run aborts, or the recovery sweep fails.
    pub fn request_signing(&self, request: SigningRequest) -> Result<SigningRun, EngineError> {
        request
            .selector
            .validate()
            .map_err(|err| EngineError::InvalidRequest(err.to_string()))?;
        let SigningRequest {
            actor_id,
            certificate,
            selector,
            quantity,
        } = request;
        let mut scope = ClaimScope::new(actor_id, selector, quantity);
        scope.quantity = scope.effective_quantity();
        if scope.selector.is_empty() || scope.quantity == Some(0) {
            return Ok(SigningRun::Completed(SigningReport::idle(scope.actor_id)));
        }

        let claimed = ClaimManager::new(self.store.as_ref(), self.config.claim_strategy, self.audit.as_ref())
            .try_claim(&scope)
            .map_err(EngineError::Claim)?;
        if claimed == 0 {
            return Ok(SigningRun::Completed(SigningReport::idle(scope.actor_id)));
        }

        if self.config.blocking {
            return self.run_claimed(&scope, &certificate, claimed).map(SigningRun::Completed);
        }
        let engine = self.clone();
        let thread_scope = scope.clone();
        let spawned = thread::Builder::new()
            .name(format!("invoice-signer-{}", scope.actor_id))
            .spawn(move || engine.run_claimed(&thread_scope, &certificate, claimed));
        match spawned {
            Ok(handle) => Ok(SigningRun::Background(BackgroundRun {
                claimed,
                handle,
            })),
            Err(err) => {
                let _ = RecoverySweeper::new(self.store.as_ref(), self.audit.as_ref())
                    .clear_claim(&scope.actor_id);
                Err(EngineError::Spawn(err.to_string()))
            }
        }
    }

    /// Resets stale claims for one actor.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Sweep`] when the reset fails.
    pub fn clear_claim(&self, actor: &ActorId) -> Result<usize, EngineError> {
        RecoverySweeper::new(self.store.as_ref(), self.audit.as_ref())
            .clear_claim(actor)
            .map_err(EngineError::Sweep)
    }

    /// Resets stale claims for every actor.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Sweep`] when the reset fails.
    pub fn clear_all_claims(&self) -> Result<usize, EngineError> {
        RecoverySweeper::new(self.store.as_ref(), self.audit.as_ref())
            .clear_all()
            .map_err(EngineError::Sweep)
    }

    /// Returns the customer signing profile for an actor.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Profile`] with [`StoreError::NotFound`] when the
    /// actor has no customer row, or when the lookup fails.
    pub fn customer_profile(&self, actor: &ActorId) -> Result<CustomerProfile, EngineError> {
        self.store
            .customer_profile(actor)
            .map_err(EngineError::Profile)?
            .ok_or_else(|| EngineError::Profile(StoreError::NotFound(format!("not exist customer: {actor}"))))
    }

    /// Runs the page loop for claimed rows, then the recovery sweep.
    fn run_claimed(
        &self,
        scope: &ClaimScope,
        certificate: &SigningCertificate,
        claimed: usize,
    ) -> Result<SigningReport, EngineError> {
        let guard = ClaimGuard::arm(
            RecoverySweeper::new(self.store.as_ref(), self.audit.as_ref()),
            &scope.actor_id,
        );
        let mut report = SigningReport::idle(scope.actor_id.clone());
        report.claimed = claimed;
        let looped = self.drive_pages(scope, certificate, &mut report);
        let swept = guard.release();

        match (looped, swept) {
            (Ok(stop), Ok(cleared)) => {
                report.stop = stop;
                report.cleared = cleared;
                self.audit.record(&SignerAuditEvent::new(
                    Some(&scope.actor_id),
                    SignerAuditKind::RunFinished {
                        claimed: report.claimed,
                        completed: report.completed,
                        failed: report.failed,
                        cleared,
                    },
                ));
                Ok(report)
            }
            (Err(cause), Ok(cleared)) => {
                self.audit.record(&SignerAuditEvent::new(
                    Some(&scope.actor_id),
                    SignerAuditKind::RunAborted {
                        completed: report.completed,
                        cleared,
                        error: cause.to_string(),
                    },
                ));
                Err(EngineError::Aborted {
                    completed: report.completed,
                    cleared,
                    cause,
                })
            }
            (looped, Err(source)) => Err(EngineError::Recovery {
                completed: report.completed,
                cause: looped.err(),
                source,
            }),
        }
    }

    /// Loads, signs, and persists pages until a stop condition is reached.
    fn drive_pages(
        &self,
        scope: &ClaimScope,
        certificate: &SigningCertificate,
        report: &mut SigningReport,
    ) -> Result<StopReason, AbortCause> {
        let store = self.store.as_ref();
        let loader = BatchLoader::new(self.config.page_size);
        let pool = SigningWorkerPool::new(self.config.max_workers, self.config.dispatch_mode);
        let persister = ResultPersister;
        report.remaining = report.claimed;

        while report.remaining > 0 {
            let page = loader.load_page(store, scope).map_err(AbortCause::Load)?;
            if page.is_empty() {
                return Ok(StopReason::EmptyPage);
            }
            if page.len() < self.config.min_page_rows {
                return Ok(StopReason::BelowThreshold);
            }

            let outcome = pool
                .sign_page(self.signer.as_ref(), certificate, &scope.actor_id, &page)
                .map_err(|err| AbortCause::WorkerPanicked(err.to_string()))?;
            for failure in &outcome.failures {
                self.audit.record(&SignerAuditEvent::new(
                    Some(&scope.actor_id),
                    SignerAuditKind::RecordSignFailed {
                        record_id: failure.record_id.to_string(),
                        error: failure.error.to_string(),
                    },
                ));
            }
            let written = persister.persist(store, &outcome.signed).map_err(AbortCause::Persist)?;

            report.pages += 1;
            report.loaded += page.len();
            report.completed += written;
            report.failed += outcome.failures.len();
            report.remaining = report.remaining.saturating_sub(page.len());
            self.audit.record(&SignerAuditEvent::new(
                Some(&scope.actor_id),
                SignerAuditKind::PageProcessed {
                    page: report.pages,
                    loaded: page.len(),
                    signed: written,
                    failed: outcome.failures.len(),
                },
            ));
        }
        Ok(StopReason::QuantityExhausted)
    }
}
