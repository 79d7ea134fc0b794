// crates/invoice-signer-core/src/runtime/pool.rs
// ============================================================================
// Module: Signing Worker Pool
// Description: Bounded concurrent fan-out of the signing primitive per page.
// Purpose: Sign a page in parallel and join every worker before returning.
// Dependencies: crate::{core, interfaces}, time
// ============================================================================

//! ## Overview
//! [`SigningWorkerPool::sign_page`] spawns at most `max_workers` scoped
//! threads. Workers pull record indexes from a shared counter until the page
//! is exhausted, so concurrency is bounded by both the worker cap and the
//! page size. The call returns only after every worker has been joined,
//! regardless of dispatch mode.
//!
//! Per-record signing failures are collected beside the signed results and
//! never abort the page. A panicking worker is reported as
//! [`PoolError::WorkerPanicked`] after the remaining workers finish.
//!
//! # Invariants
//! - Output vectors are sorted by record id.
//! - Every input record appears exactly once in either `signed` or
//!   `failures`, unless a worker panicked.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::thread;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;

use crate::core::certificate::SigningCertificate;
use crate::core::delta::SignedResult;
use crate::core::identifiers::ActorId;
use crate::core::identifiers::RecordId;
use crate::core::record::SignableRecord;
use crate::interfaces::DocumentSigner;
use crate::interfaces::SigningError;
use crate::runtime::loader::MAX_PAGE_SIZE;

// ============================================================================
// SECTION: Types
// ============================================================================

/// How signing tasks are dispatched within a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// Start every worker, then wait on a single barrier.
    #[default]
    Barrier,
    /// Await each task right after it starts.
    Sequential,
}

/// A record the signer rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFailure {
    /// Rejected record.
    pub record_id: RecordId,
    /// Signing error.
    pub error: SigningError,
}

/// Result of signing one page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageOutcome {
    /// Delta rows for successfully signed records.
    pub signed: Vec<SignedResult>,
    /// Records the signer rejected.
    pub failures: Vec<RecordFailure>,
}

/// Worker pool errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// A worker thread panicked.
    #[error("signing worker panicked: {0}")]
    WorkerPanicked(String),
}

/// Output buffered by one worker.
type WorkerOutput = (Vec<SignedResult>, Vec<RecordFailure>);

// ============================================================================
// SECTION: Pool
// ============================================================================

/// Bounded worker pool for page signing.
#[derive(Debug, Clone, Copy)]
pub struct SigningWorkerPool {
    /// Maximum concurrent workers.
    max_workers: usize,
    /// Dispatch mode.
    mode: DispatchMode,
}

impl SigningWorkerPool {
    /// Creates a pool; the worker cap is clamped to `1 ..= MAX_PAGE_SIZE`.
    #[must_use]
    pub fn new(max_workers: usize, mode: DispatchMode) -> Self {
        Self {
            max_workers: max_workers.clamp(1, MAX_PAGE_SIZE),
            mode,
        }
    }

    /// Returns the worker count used for a page of `len` records.
    #[must_use]
    pub fn workers_for(&self, len: usize) -> usize {
        match self.mode {
            DispatchMode::Barrier => self.max_workers.min(len),
            DispatchMode::Sequential => len.min(1),
        }
    }

    /// Signs every record in the page.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::WorkerPanicked`] when any worker panicked.
    pub fn sign_page<G: DocumentSigner + ?Sized>(
        &self,
        signer: &G,
        certificate: &SigningCertificate,
        actor_id: &ActorId,
        records: &[SignableRecord],
    ) -> Result<PageOutcome, PoolError> {
        let workers = self.workers_for(records.len());
        if workers == 0 {
            return Ok(PageOutcome::default());
        }
        let next = AtomicUsize::new(0);
        let joined: Vec<thread::Result<WorkerOutput>> = thread::scope(|scope| {
            let handles: Vec<_> = (0 .. workers)
                .map(|_| {
                    scope.spawn(|| drain_records(signer, certificate, actor_id, records, &next))
                })
                .collect();
            handles.into_iter().map(thread::ScopedJoinHandle::join).collect()
        });

        let mut outcome = PageOutcome::default();
        let mut panicked = None;
        for result in joined {
            match result {
                Ok((signed, failures)) => {
                    outcome.signed.extend(signed);
                    outcome.failures.extend(failures);
                }
                Err(payload) => panicked = Some(panic_message(payload.as_ref())),
            }
        }
        if let Some(message) = panicked {
            return Err(PoolError::WorkerPanicked(message));
        }
        outcome.signed.sort_by(|left, right| left.record_id.cmp(&right.record_id));
        outcome.failures.sort_by(|left, right| left.record_id.cmp(&right.record_id));
        Ok(outcome)
    }
}

/// Worker loop: claims indexes until the page is exhausted.
fn drain_records<G: DocumentSigner + ?Sized>(
    signer: &G,
    certificate: &SigningCertificate,
    actor_id: &ActorId,
    records: &[SignableRecord],
    next: &AtomicUsize,
) -> WorkerOutput {
    let mut signed = Vec::new();
    let mut failures = Vec::new();
    loop {
        let index = next.fetch_add(1, Ordering::Relaxed);
        let Some(record) = records.get(index) else {
            break;
        };
        match signer.sign(record, certificate) {
            Ok(artifact) => {
                signed.push(SignedResult::from_record(record, actor_id, artifact, now_ms()));
            }
            Err(error) => failures.push(RecordFailure {
                record_id: record.record_id.clone(),
                error,
            }),
        }
    }
    (signed, failures)
}

/// Returns the current time in unix milliseconds.
fn now_ms() -> i64 {
    let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    i64::try_from(millis).unwrap_or(i64::MAX)
}

/// Extracts a readable message from a panic payload.
fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return (*message).to_string();
    }
    if let Some(message) = payload.downcast_ref::<String>() {
        return message.clone();
    }
    "unknown panic".to_string()
}
