// crates/invoice-signer-store-sqlite/tests/sqlite_store.rs
// ============================================================================
// Module: SQLite Store Tests
// Description: Validate SQLite SigningStore behavior.
// Purpose: Ensure claim, page, delta, and sweep statements hold on disk.
// Dependencies: invoice-signer-store-sqlite, invoice-signer-core, rusqlite, tempfile
// ============================================================================

//! ## Overview
//! Conformance tests for the SQLite-backed signing store. Runs the engine end
//! to end against a temporary database and exercises each statement directly.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use ed25519_dalek::SigningKey;
use invoice_signer_core::ActorId;
use invoice_signer_core::CertificateSerial;
use invoice_signer_core::ClaimOutcome;
use invoice_signer_core::ClaimScope;
use invoice_signer_core::ClaimState;
use invoice_signer_core::ClaimStrategy;
use invoice_signer_core::CustomerProfile;
use invoice_signer_core::DateRange;
use invoice_signer_core::DocumentSigner;
use invoice_signer_core::Ed25519DocumentSigner;
use invoice_signer_core::EngineConfig;
use invoice_signer_core::EngineError;
use invoice_signer_core::MemoryAuditSink;
use invoice_signer_core::RecordId;
use invoice_signer_core::RecordSelector;
use invoice_signer_core::RecordState;
use invoice_signer_core::SignableRecord;
use invoice_signer_core::SignedResult;
use invoice_signer_core::SigningCertificate;
use invoice_signer_core::SigningEngine;
use invoice_signer_core::SigningRequest;
use invoice_signer_core::SigningStore;
use invoice_signer_core::StoreError;
use invoice_signer_core::SuccessState;
use invoice_signer_core::verify_artifact;
use invoice_signer_store_sqlite::SqliteSigningStore;
use invoice_signer_store_sqlite::SqliteStoreConfig;
use invoice_signer_store_sqlite::SqliteStoreError;
use tempfile::TempDir;
use time::OffsetDateTime;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn open_store(dir: &TempDir) -> SqliteSigningStore {
    SqliteSigningStore::new(&SqliteStoreConfig::new(dir.path().join("signer.db"))).unwrap()
}

fn invoice(id: &str, type_code: &str, issuer: &str, broker: Option<&str>, issue_date: i64) -> SignableRecord {
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
        document: serde_json::json!({ "id": id, "amount": 990 }),
    }
}

fn seed(store: &SqliteSigningStore, issuer: &str, count: usize) {
    for index in 0 .. count {
        store.insert_invoice(&invoice(&format!("r{index:04}"), "0101", issuer, None, 1_700_000_000)).unwrap();
    }
}

fn certificate(actor: &str) -> Arc<SigningCertificate> {
    Arc::new(SigningCertificate::new(
        ActorId::new(actor),
        CertificateSerial::new(format!("serial-{actor}")),
        SigningKey::from_bytes(&[11u8; 32]),
    ))
}

fn request(actor: &str, selector: RecordSelector, quantity: Option<usize>) -> SigningRequest {
    SigningRequest {
        actor_id: ActorId::new(actor),
        certificate: certificate(actor),
        selector,
        quantity,
    }
}

fn engine(
    store: &SqliteSigningStore,
    config: EngineConfig,
) -> SigningEngine<SqliteSigningStore, Ed25519DocumentSigner> {
    SigningEngine::new(
        Arc::new(store.clone()),
        Arc::new(Ed25519DocumentSigner::new()),
        Arc::new(MemoryAuditSink::new()),
        config,
    )
    .unwrap()
}

fn claimed_rows(store: &SqliteSigningStore) -> usize {
    store.record_states().unwrap().iter().filter(|(_, state)| state.claim == ClaimState::Claimed).count()
}

fn scope(actor: &str, selector: RecordSelector, quantity: Option<usize>) -> ClaimScope {
    ClaimScope::new(ActorId::new(actor), selector, quantity)
}

// ============================================================================
// SECTION: Engine Runs
// ============================================================================

fn full_run_signs_every_row(strategy: ClaimStrategy) {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    seed(&store, "A1", 7);
    let config = EngineConfig {
        page_size: 3,
        claim_strategy: strategy,
        ..EngineConfig::default()
    };

    let report = engine(&store, config)
        .request_signing(request("A1", RecordSelector::Unrestricted, None))
        .unwrap()
        .wait()
        .unwrap();

    assert_eq!(report.claimed, 7);
    assert_eq!(report.completed, 7);
    assert_eq!(report.pages, 3);
    assert_eq!(claimed_rows(&store), 0);
    let states = store.record_states().unwrap();
    assert!(states.iter().all(|(_, state)| state.success == SuccessState::Done));
    let deltas = store.signed_results().unwrap();
    assert_eq!(deltas.len(), 7);
    for delta in &deltas {
        verify_artifact(&delta.artifact, &certificate("A1").verifying_key()).unwrap();
    }
}

#[test]
fn process_lock_run_signs_every_row() {
    full_run_signs_every_row(ClaimStrategy::ProcessLock);
}

#[test]
fn atomic_statement_run_signs_every_row() {
    full_run_signs_every_row(ClaimStrategy::AtomicStatement);
}

#[test]
fn rerun_after_completion_claims_nothing() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    seed(&store, "A1", 2);
    let engine = engine(&store, EngineConfig::default());

    engine.request_signing(request("A1", RecordSelector::Unrestricted, None)).unwrap().wait().unwrap();
    let second =
        engine.request_signing(request("A1", RecordSelector::Unrestricted, None)).unwrap().wait().unwrap();

    assert_eq!(second.claimed, 0);
    assert_eq!(store.signed_results().unwrap().len(), 2);
}

#[test]
fn state_survives_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let store = open_store(&dir);
        seed(&store, "A1", 2);
        store.mark_claimed(&scope("A1", RecordSelector::Unrestricted, None)).unwrap();
    }
    let store = open_store(&dir);
    assert_eq!(claimed_rows(&store), 2);
    assert_eq!(engine(&store, EngineConfig::default()).clear_claim(&ActorId::new("A1")).unwrap(), 2);
    assert_eq!(claimed_rows(&store), 0);
}

// ============================================================================
// SECTION: Claim Statements
// ============================================================================

#[test]
fn claim_exclusive_reports_reentry() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    seed(&store, "A1", 3);
    let scope = scope("A1", RecordSelector::Unrestricted, None);

    assert_eq!(store.claim_exclusive(&scope).unwrap(), ClaimOutcome::Claimed(3));
    assert_eq!(
        store.claim_exclusive(&scope).unwrap(),
        ClaimOutcome::Reentrant {
            working_rows: 3
        }
    );
}

#[test]
fn mark_respects_ownership_regime() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    store.insert_invoice(&invoice("a", "0101", "A1", None, 1)).unwrap();
    store.insert_invoice(&invoice("b", "0103", "A1", Some("BR"), 1)).unwrap();
    store.insert_invoice(&invoice("c", "0105", "X9", Some("BR"), 1)).unwrap();
    store.insert_invoice(&invoice("d", "0199", "A1", Some("BR"), 1)).unwrap();

    assert_eq!(store.mark_claimed(&scope("A1", RecordSelector::Unrestricted, None)).unwrap(), 1);
    assert_eq!(store.mark_claimed(&scope("BR", RecordSelector::Unrestricted, None)).unwrap(), 2);
    let claimed: Vec<String> = store
        .record_states()
        .unwrap()
        .into_iter()
        .filter(|(_, state)| state.claim == ClaimState::Claimed)
        .map(|(id, _)| id.to_string())
        .collect();
    assert_eq!(claimed, vec!["a", "b", "c"]);
}

#[test]
fn mark_honors_inclusive_date_range_and_quantity() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    for (id, day) in [("a", 100), ("b", 200), ("c", 300), ("d", 400)] {
        store.insert_invoice(&invoice(id, "0102", "A1", None, day)).unwrap();
    }
    let range = DateRange::new(
        OffsetDateTime::from_unix_timestamp(200).unwrap(),
        OffsetDateTime::from_unix_timestamp(400).unwrap(),
    )
    .unwrap();

    let marked = store.mark_claimed(&scope("A1", RecordSelector::DateRange(range), Some(2))).unwrap();

    assert_eq!(marked, 2);
    let states = store.record_states().unwrap();
    let claimed: Vec<&str> = states
        .iter()
        .filter(|(_, state)| state.claim == ClaimState::Claimed)
        .map(|(id, _)| id.as_str())
        .collect();
    assert_eq!(claimed, vec!["b", "c"]);
}

#[test]
fn mark_skips_signed_rows() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    seed(&store, "A1", 2);
    let ids = RecordSelector::Ids(vec![RecordId::new("r0000")]);
    engine(&store, EngineConfig::default()).request_signing(request("A1", ids, None)).unwrap().wait().unwrap();

    assert_eq!(store.mark_claimed(&scope("A1", RecordSelector::Unrestricted, None)).unwrap(), 1);
}

// ============================================================================
// SECTION: Pages and Deltas
// ============================================================================

#[test]
fn page_joins_provider_contact_of_counterpart() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    seed(&store, "A1", 1);
    store
        .upsert_customer(&CustomerProfile {
            customer_id: ActorId::new("C-100"),
            provider_id: Some("P-9".to_string()),
            signing_type: "auto".to_string(),
            sign_from_day: 1,
            sign_till_day: None,
        })
        .unwrap();
    store.upsert_provider("P-9", "ops@provider.test").unwrap();
    let scope = scope("A1", RecordSelector::Unrestricted, None);
    store.mark_claimed(&scope).unwrap();

    let page = store.load_claimed_page(&scope, 10).unwrap();

    assert_eq!(page.len(), 1);
    assert_eq!(page[0].provider_id.as_deref(), Some("P-9"));
    assert_eq!(page[0].provider_email.as_deref(), Some("ops@provider.test"));
    assert_eq!(page[0].document["amount"], 990);
}

#[test]
fn page_is_limited_and_ordered() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    for id in ["m", "c", "x", "a"] {
        store.insert_invoice(&invoice(id, "0101", "A1", None, 1)).unwrap();
    }
    let scope = scope("A1", RecordSelector::Unrestricted, None);
    store.mark_claimed(&scope).unwrap();

    let page = store.load_claimed_page(&scope, 3).unwrap();
    let ids: Vec<&str> = page.iter().map(|record| record.record_id.as_str()).collect();
    assert_eq!(ids, vec!["a", "c", "m"]);
}

#[test]
fn delta_for_missing_record_rolls_back() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    seed(&store, "A1", 1);
    let scope = scope("A1", RecordSelector::Unrestricted, None);
    store.mark_claimed(&scope).unwrap();
    let record = store.load_claimed_page(&scope, 1).unwrap().remove(0);
    let signer = Ed25519DocumentSigner::new();
    let cert = certificate("A1");
    let artifact = signer.sign(&record, &cert).unwrap();
    let good = SignedResult::from_record(&record, &ActorId::new("A1"), artifact, 0);
    let mut ghost = good.clone();
    ghost.record_id = RecordId::new("ghost");

    let err = store.insert_delta(&[good, ghost]).unwrap_err();

    assert!(matches!(err, StoreError::NotFound(_)));
    assert!(store.signed_results().unwrap().is_empty());
    assert_eq!(claimed_rows(&store), 1);
}

// ============================================================================
// SECTION: Sweeps and Profiles
// ============================================================================

#[test]
fn clear_claims_scopes_to_owner_or_everyone() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    store.insert_invoice(&invoice("a", "0101", "A1", None, 1)).unwrap();
    store.insert_invoice(&invoice("b", "0101", "B1", None, 1)).unwrap();
    store.mark_claimed(&scope("A1", RecordSelector::Unrestricted, None)).unwrap();
    store.mark_claimed(&scope("B1", RecordSelector::Unrestricted, None)).unwrap();

    assert_eq!(store.clear_claims(Some(&ActorId::new("A1"))).unwrap(), 1);
    assert_eq!(claimed_rows(&store), 1);
    assert_eq!(store.clear_claims(None).unwrap(), 1);
    assert!(store.record_states().unwrap().iter().all(|(_, state)| *state == RecordState::PENDING));
}

#[test]
fn missing_customer_profile_is_not_found() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let engine = engine(&store, EngineConfig::default());

    let err = engine.customer_profile(&ActorId::new("nobody")).unwrap_err();
    assert!(matches!(err, EngineError::Profile(StoreError::NotFound(_))));

    let profile = CustomerProfile {
        customer_id: ActorId::new("A1"),
        provider_id: None,
        signing_type: "manual".to_string(),
        sign_from_day: 3,
        sign_till_day: Some(9),
    };
    store.upsert_customer(&profile).unwrap();
    assert_eq!(engine.customer_profile(&ActorId::new("A1")).unwrap(), profile);
}

// ============================================================================
// SECTION: Integrity
// ============================================================================

#[test]
fn schema_version_mismatch_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("signer.db");
    drop(SqliteSigningStore::new(&SqliteStoreConfig::new(&path)).unwrap());
    let connection = rusqlite::Connection::open(&path).unwrap();
    connection.execute("UPDATE store_meta SET version = 99", []).unwrap();
    drop(connection);

    let err = SqliteSigningStore::new(&SqliteStoreConfig::new(&path)).err().unwrap();
    assert!(matches!(err, SqliteStoreError::VersionMismatch(_)));
}

#[test]
fn directory_store_path_is_rejected() {
    let dir = TempDir::new().unwrap();
    let err = SqliteSigningStore::new(&SqliteStoreConfig::new(dir.path())).err().unwrap();
    assert!(matches!(err, SqliteStoreError::Invalid(_)));
}
