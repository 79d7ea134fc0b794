// crates/invoice-signer-core/tests/recovery_properties.rs
// ============================================================================
// Module: Recovery Property Tests
// Description: Property tests for stuck claims, ordering, and idempotence.
// Purpose: Exercise the run epilogue under arbitrary injected failures.
// Dependencies: invoice-signer-core, proptest
// ============================================================================
//! ## Overview
//! Generates record sets, page sizes, rejected records, and a failing store
//! operation, then checks that no claim survives a run and that persisted
//! deltas never repeat a record.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    missing_docs,
    dead_code,
    reason = "Test-only panic-based assertions are permitted; shared fixtures may be unused."
)]

mod common;

use std::collections::BTreeSet;

use common::RejectingSigner;
use common::claimed_rows;
use common::engine;
use common::issuer_record;
use common::request;
use invoice_signer_core::ClaimScope;
use invoice_signer_core::EngineConfig;
use invoice_signer_core::EngineError;
use invoice_signer_core::InMemorySigningStore;
use invoice_signer_core::RecordSelector;
use invoice_signer_core::SigningStore;
use invoice_signer_core::StoreOperation;
use invoice_signer_core::runtime::BatchLoader;
use proptest::prelude::*;

fn failure_point() -> impl Strategy<Value = Option<(StoreOperation, usize)>> {
    prop_oneof![
        Just(None),
        (1usize .. 4).prop_map(|call| Some((StoreOperation::Load, call))),
        (1usize .. 4).prop_map(|call| Some((StoreOperation::InsertDelta, call))),
        Just(Some((StoreOperation::Mark, 1))),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn no_claim_survives_a_run(
        ids in proptest::collection::btree_set(0u16 .. 500, 0 .. 40),
        page_size in 1usize .. 8,
        rejected in proptest::collection::btree_set(0u16 .. 500, 0 .. 5),
        failure in failure_point(),
    ) {
        let store = InMemorySigningStore::new();
        for id in &ids {
            store.insert_record(issuer_record(&format!("r{id:04}"), "A1")).unwrap();
        }
        if let Some((operation, call)) = failure {
            store.fail_on(operation, call).unwrap();
        }
        let rejected_ids: Vec<String> = rejected.iter().map(|id| format!("r{id:04}")).collect();
        let rejected_refs: Vec<&str> = rejected_ids.iter().map(String::as_str).collect();
        let config = EngineConfig { page_size, ..EngineConfig::default() };
        let (engine, _audit) = engine(&store, RejectingSigner::new(&rejected_refs), config);

        let outcome = engine.request_signing(request("A1", RecordSelector::Unrestricted, None));

        let recovery_failed = matches!(outcome, Err(EngineError::Recovery { .. }));
        prop_assert!(!recovery_failed);
        prop_assert_eq!(claimed_rows(&store), 0);
        let signed = store.signed_results().unwrap();
        let unique: BTreeSet<_> = signed.iter().map(|row| row.record_id.clone()).collect();
        prop_assert_eq!(unique.len(), signed.len());
        for row in &signed {
            prop_assert!(!rejected_ids.contains(&row.record_id.to_string()));
        }
        let signable = ids.difference(&rejected).count();
        prop_assert!(signed.len() <= signable);
        let no_rejects = ids.is_disjoint(&rejected);
        if failure.is_none() && (no_rejects || page_size >= ids.len()) {
            prop_assert_eq!(signed.len(), signable);
        }
    }

    #[test]
    fn loaded_pages_are_ordered_by_id(
        ids in proptest::collection::vec(0u32 .. 10_000, 1 .. 60),
        page_size in 1usize .. 20,
    ) {
        let store = InMemorySigningStore::new();
        for id in ids.iter().rev() {
            store.insert_record(issuer_record(&format!("id-{id}"), "A1")).unwrap();
        }
        let scope = ClaimScope::new("A1".into(), RecordSelector::Unrestricted, None);
        store.mark_claimed(&scope).unwrap();

        let page = BatchLoader::new(page_size).load_page(&store, &scope).unwrap();

        prop_assert!(page.len() <= page_size);
        prop_assert!(page.windows(2).all(|pair| pair[0].record_id <= pair[1].record_id));
    }
}
