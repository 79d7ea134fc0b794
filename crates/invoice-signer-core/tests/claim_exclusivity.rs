// crates/invoice-signer-core/tests/claim_exclusivity.rs
// ============================================================================
// Module: Claim Exclusivity Tests
// Description: Concurrent claim attempts for the same and different actors.
// Purpose: Ensure a claim in flight blocks re-entrant claims for its actor.
// Dependencies: invoice-signer-core
// ============================================================================
//! ## Overview
//! Holds a background run inside the signer while a second request for the
//! same actor arrives, for both claim strategies.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    missing_docs,
    dead_code,
    reason = "Test-only panic-based assertions are permitted; shared fixtures may be unused."
)]

mod common;

use std::sync::Arc;
use std::thread;

use common::GatedSigner;
use common::claimed_rows;
use common::engine;
use common::request;
use common::seed;
use invoice_signer_core::ClaimScope;
use invoice_signer_core::ClaimStrategy;
use invoice_signer_core::EngineConfig;
use invoice_signer_core::InMemorySigningStore;
use invoice_signer_core::MemoryAuditSink;
use invoice_signer_core::RecordSelector;
use invoice_signer_core::SignerAuditKind;
use invoice_signer_core::runtime::ClaimManager;

fn held_run_blocks_second_claim(strategy: ClaimStrategy) {
    let store = InMemorySigningStore::new();
    seed(&store, "A1", 4);
    let signer = GatedSigner::default();
    let config = EngineConfig {
        blocking: false,
        claim_strategy: strategy,
        ..EngineConfig::default()
    };
    let (engine, audit) = engine(&store, signer.clone(), config);

    let first = engine.request_signing(request("A1", RecordSelector::Unrestricted, None)).unwrap();
    assert_eq!(first.claimed(), 4);

    let second = engine.request_signing(request("A1", RecordSelector::Unrestricted, None)).unwrap();
    assert_eq!(second.claimed(), 0);
    assert_eq!(claimed_rows(&store), 4);

    signer.release();
    let report = first.wait().unwrap();
    assert_eq!(report.completed, 4);
    assert_eq!(claimed_rows(&store), 0);
    assert!(audit.events().iter().any(|event| matches!(
        event.kind,
        SignerAuditKind::ClaimReentry {
            working_rows: 4
        }
    )));
}

#[test]
fn process_lock_blocks_reentrant_claim() {
    held_run_blocks_second_claim(ClaimStrategy::ProcessLock);
}

#[test]
fn atomic_statement_blocks_reentrant_claim() {
    held_run_blocks_second_claim(ClaimStrategy::AtomicStatement);
}

#[test]
fn concurrent_claims_never_overlap() {
    let store = InMemorySigningStore::new();
    seed(&store, "A1", 50);
    let audit = Arc::new(MemoryAuditSink::new());
    let scope = ClaimScope::new("A1".into(), RecordSelector::Unrestricted, None);

    let claimed: Vec<usize> = thread::scope(|threads| {
        let handles: Vec<_> = (0 .. 8)
            .map(|_| {
                threads.spawn(|| {
                    ClaimManager::new(&store, ClaimStrategy::ProcessLock, audit.as_ref())
                        .try_claim(&scope)
                        .unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|handle| handle.join().unwrap()).collect()
    });

    assert_eq!(claimed.iter().filter(|count| **count > 0).count(), 1);
    assert_eq!(claimed.iter().sum::<usize>(), 50);
}

#[test]
fn different_actors_claim_independently() {
    let store = InMemorySigningStore::new();
    seed(&store, "A1", 3);
    store.insert_record(common::issuer_record("z-b1", "B1")).unwrap();
    let signer = GatedSigner::default();
    let config = EngineConfig {
        blocking: false,
        ..EngineConfig::default()
    };
    let (engine, _audit) = engine(&store, signer.clone(), config);

    let first = engine.request_signing(request("A1", RecordSelector::Unrestricted, None)).unwrap();
    let other = engine.request_signing(request("B1", RecordSelector::Unrestricted, None)).unwrap();
    assert_eq!(first.claimed(), 3);
    assert_eq!(other.claimed(), 1);

    signer.release();
    assert_eq!(first.wait().unwrap().completed, 3);
    assert_eq!(other.wait().unwrap().completed, 1);
}
