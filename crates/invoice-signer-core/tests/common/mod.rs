// crates/invoice-signer-core/tests/common/mod.rs
// ============================================================================
// Module: Shared Test Fixtures
// Description: Record, certificate, signer, and engine builders for tests.
// ============================================================================

//! Shared fixtures for invoice signer core tests.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

use ed25519_dalek::SigningKey;
use invoice_signer_core::ActorId;
use invoice_signer_core::CertificateSerial;
use invoice_signer_core::ClaimState;
use invoice_signer_core::DocumentSigner;
use invoice_signer_core::Ed25519DocumentSigner;
use invoice_signer_core::EngineConfig;
use invoice_signer_core::InMemorySigningStore;
use invoice_signer_core::MemoryAuditSink;
use invoice_signer_core::RecordId;
use invoice_signer_core::RecordSelector;
use invoice_signer_core::SignableRecord;
use invoice_signer_core::SignedArtifact;
use invoice_signer_core::SigningCertificate;
use invoice_signer_core::SigningEngine;
use invoice_signer_core::SigningError;
use invoice_signer_core::SigningRequest;
use serde_json::json;

/// Builds a direct-issuer record owned by `issuer`.
pub fn issuer_record(id: &str, issuer: &str) -> SignableRecord {
    record(id, "0101", issuer, None, 1_700_000_000)
}

/// Builds a broker-mediated record owned by `broker`.
pub fn broker_record(id: &str, issuer: &str, broker: &str) -> SignableRecord {
    record(id, "0103", issuer, Some(broker), 1_700_000_000)
}

/// Builds a record with explicit fields.
pub fn record(
    id: &str,
    type_code: &str,
    issuer: &str,
    broker: Option<&str>,
    issue_date: i64,
) -> SignableRecord {
    SignableRecord {
        record_id: RecordId::new(id),
        type_code: type_code.to_string(),
        issuer_id: ActorId::new(issuer),
        issuer_email: Some(format!("{issuer}@example.test")),
        counterpart_id: Some("C-100".to_string()),
        counterpart_email: Some("c100@example.test".to_string()),
        broker_id: broker.map(ActorId::new),
        broker_email: broker.map(|broker| format!("{broker}@example.test")),
        provider_id: None,
        provider_email: None,
        issue_date,
        document: json!({ "amount": 1200, "id": id }),
    }
}

/// Seeds `count` direct-issuer records `r0000 ..` for `issuer`.
pub fn seed(store: &InMemorySigningStore, issuer: &str, count: usize) {
    for index in 0 .. count {
        store.insert_record(issuer_record(&format!("r{index:04}"), issuer)).unwrap();
    }
}

/// Returns an unbounded certificate for `actor`.
pub fn certificate(actor: &str) -> Arc<SigningCertificate> {
    Arc::new(SigningCertificate::new(
        ActorId::new(actor),
        CertificateSerial::new(format!("serial-{actor}")),
        SigningKey::from_bytes(&[7u8; 32]),
    ))
}

/// Builds a request for `actor`.
pub fn request(actor: &str, selector: RecordSelector, quantity: Option<usize>) -> SigningRequest {
    SigningRequest {
        actor_id: ActorId::new(actor),
        certificate: certificate(actor),
        selector,
        quantity,
    }
}

/// Builds an engine with a memory audit sink.
pub fn engine<G: DocumentSigner + 'static>(
    store: &InMemorySigningStore,
    signer: G,
    config: EngineConfig,
) -> (SigningEngine<InMemorySigningStore, G>, Arc<MemoryAuditSink>) {
    let audit = Arc::new(MemoryAuditSink::new());
    let engine =
        SigningEngine::new(Arc::new(store.clone()), Arc::new(signer), audit.clone(), config)
            .unwrap();
    (engine, audit)
}

/// Counts claimed rows in the store.
pub fn claimed_rows(store: &InMemorySigningStore) -> usize {
    store.record_states().unwrap().iter().filter(|(_, state)| state.claim == ClaimState::Claimed).count()
}

/// Signer that rejects a fixed set of record ids.
pub struct RejectingSigner {
    /// Record ids to reject.
    pub reject: BTreeSet<String>,
}

impl RejectingSigner {
    /// Rejects the given ids.
    pub fn new(ids: &[&str]) -> Self {
        Self {
            reject: ids.iter().map(ToString::to_string).collect(),
        }
    }
}

impl DocumentSigner for RejectingSigner {
    fn sign(
        &self,
        record: &SignableRecord,
        certificate: &SigningCertificate,
    ) -> Result<SignedArtifact, SigningError> {
        if self.reject.contains(record.record_id.as_str()) {
            return Err(SigningError::MalformedRecord(format!("rejected {}", record.record_id)));
        }
        Ed25519DocumentSigner::new().sign(record, certificate)
    }
}

/// Signer that panics on one record id.
pub struct PanickingSigner {
    /// Record id that triggers the panic.
    pub record_id: String,
}

impl DocumentSigner for PanickingSigner {
    fn sign(
        &self,
        record: &SignableRecord,
        certificate: &SigningCertificate,
    ) -> Result<SignedArtifact, SigningError> {
        assert!(record.record_id.as_str() != self.record_id, "signer exploded");
        Ed25519DocumentSigner::new().sign(record, certificate)
    }
}

/// Signer that blocks until its gate opens.
#[derive(Clone, Default)]
pub struct GatedSigner {
    /// Gate flag.
    pub open: Arc<AtomicBool>,
}

impl GatedSigner {
    /// Opens the gate.
    pub fn release(&self) {
        self.open.store(true, Ordering::SeqCst);
    }
}

impl DocumentSigner for GatedSigner {
    fn sign(
        &self,
        record: &SignableRecord,
        certificate: &SigningCertificate,
    ) -> Result<SignedArtifact, SigningError> {
        while !self.open.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(2));
        }
        Ed25519DocumentSigner::new().sign(record, certificate)
    }
}
