// crates/invoice-signer-core/src/audit.rs
// ============================================================================
// Module: Invoice Signer Audit Logging
// Description: Structured audit events for claim, page, and recovery steps.
// Purpose: Emit JSON-line diagnostics without hard logging dependencies.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! The runtime reports every claim attempt, processed page, per-record
//! signing failure, run outcome, and recovery sweep as a
//! [`SignerAuditEvent`]. Sinks decide where the JSON lines go. Events never
//! carry document payloads or key material.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

use crate::core::identifiers::ActorId;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Actor label used for global sweeps.
pub const GLOBAL_ACTOR: &str = "*";

/// Audit event payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignerAuditEvent {
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Actor identifier, or `*` for global operations.
    pub actor_id: String,
    /// Event details.
    #[serde(flatten)]
    pub kind: SignerAuditKind,
}

/// Audit event kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SignerAuditKind {
    /// Claim skipped because claimed rows already exist in scope.
    ClaimReentry {
        /// Rows already bearing the claimed marker.
        working_rows: usize,
    },
    /// Rows were claimed.
    ClaimAcquired {
        /// Rows marked claimed.
        claimed: usize,
    },
    /// A page was signed and persisted.
    PageProcessed {
        /// One-based page index.
        page: usize,
        /// Rows loaded for the page.
        loaded: usize,
        /// Rows signed and persisted.
        signed: usize,
        /// Rows rejected by the signer.
        failed: usize,
    },
    /// The signer rejected one record.
    RecordSignFailed {
        /// Record identifier.
        record_id: String,
        /// Error message.
        error: String,
    },
    /// A run finished normally.
    RunFinished {
        /// Rows claimed.
        claimed: usize,
        /// Rows signed and persisted.
        completed: usize,
        /// Rows rejected by the signer.
        failed: usize,
        /// Rows reset by the recovery sweep.
        cleared: usize,
    },
    /// A run aborted on a page-level failure.
    RunAborted {
        /// Rows signed and persisted before the failure.
        completed: usize,
        /// Rows reset by the recovery sweep.
        cleared: usize,
        /// Failure message.
        error: String,
    },
    /// Claims were reset to unclaimed.
    ClaimsCleared {
        /// Rows reset.
        cleared: usize,
    },
}

impl SignerAuditEvent {
    /// Creates an event stamped with the current time.
    #[must_use]
    pub fn new(actor: Option<&ActorId>, kind: SignerAuditKind) -> Self {
        Self {
            timestamp_ms: now_ms(),
            actor_id: actor.map_or_else(|| GLOBAL_ACTOR.to_string(), ToString::to_string),
            kind,
        }
    }
}

/// Returns the current time in milliseconds since the unix epoch.
fn now_ms() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|duration| duration.as_millis()).unwrap_or(0)
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Audit sink for signer events.
pub trait SignerAuditSink: Send + Sync {
    /// Records an audit event.
    fn record(&self, event: &SignerAuditEvent);
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl SignerAuditSink for StderrAuditSink {
    fn record(&self, event: &SignerAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(io::stderr(), "{payload}");
        }
    }
}

/// Audit sink that appends JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl SignerAuditSink for FileAuditSink {
    fn record(&self, event: &SignerAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl SignerAuditSink for NoopAuditSink {
    fn record(&self, _event: &SignerAuditEvent) {}
}

/// In-memory audit sink for inspection in tests and embedding hosts.
#[derive(Default)]
pub struct MemoryAuditSink {
    /// Captured events in emission order.
    events: Mutex<Vec<SignerAuditEvent>>,
}

impl MemoryAuditSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of captured events.
    #[must_use]
    pub fn events(&self) -> Vec<SignerAuditEvent> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl SignerAuditSink for MemoryAuditSink {
    fn record(&self, event: &SignerAuditEvent) {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).push(event.clone());
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Tests use unwrap on deterministic fixtures.")]

    use super::*;

    #[test]
    fn events_serialize_with_flat_event_tag() {
        let event = SignerAuditEvent::new(
            Some(&ActorId::new("A1")),
            SignerAuditKind::ClaimReentry {
                working_rows: 2,
            },
        );
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "claim_reentry");
        assert_eq!(value["actor_id"], "A1");
        assert_eq!(value["working_rows"], 2);
    }

    #[test]
    fn global_events_use_wildcard_actor() {
        let event = SignerAuditEvent::new(
            None,
            SignerAuditKind::ClaimsCleared {
                cleared: 0,
            },
        );
        assert_eq!(event.actor_id, GLOBAL_ACTOR);
    }

    #[test]
    fn file_sink_appends_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.log");
        let sink = FileAuditSink::new(&path).unwrap();
        sink.record(&SignerAuditEvent::new(
            None,
            SignerAuditKind::ClaimsCleared {
                cleared: 3,
            },
        ));
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 1);
        assert!(contents.contains("\"event\":\"claims_cleared\""));
    }
}
