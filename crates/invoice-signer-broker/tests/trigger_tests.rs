// crates/invoice-signer-broker/tests/trigger_tests.rs
// ============================================================================
// Module: Trigger Consumer Tests
// Description: Queue-driven signing runs against the in-memory store.
// ============================================================================

//! Trigger consumer tests.

#![allow(clippy::unwrap_used, reason = "Tests use unwrap on deterministic fixtures.")]

use std::sync::Arc;
use std::time::Duration;

use ed25519_dalek::SigningKey;
use invoice_signer_broker::ChannelQueue;
use invoice_signer_broker::QueueError;
use invoice_signer_broker::SigningTrigger;
use invoice_signer_broker::TriggerConsumer;
use invoice_signer_core::ActorId;
use invoice_signer_core::CertificateSerial;
use invoice_signer_core::Ed25519DocumentSigner;
use invoice_signer_core::EngineConfig;
use invoice_signer_core::InMemorySigningStore;
use invoice_signer_core::NoopAuditSink;
use invoice_signer_core::RecordId;
use invoice_signer_core::RecordSelector;
use invoice_signer_core::SignableRecord;
use invoice_signer_core::SigningCertificate;
use invoice_signer_core::SigningEngine;
use tokio::sync::watch;

fn store_with(ids: &[&str]) -> InMemorySigningStore {
    let store = InMemorySigningStore::new();
    for id in ids {
        store
            .insert_record(SignableRecord {
                record_id: RecordId::new(*id),
                type_code: "0102".to_string(),
                issuer_id: ActorId::new("A1"),
                issuer_email: None,
                counterpart_id: None,
                counterpart_email: None,
                broker_id: None,
                broker_email: None,
                provider_id: None,
                provider_email: None,
                issue_date: 1_700_000_000,
                document: serde_json::json!({ "id": id }),
            })
            .unwrap();
    }
    store
}

fn consumer(store: &InMemorySigningStore) -> TriggerConsumer<InMemorySigningStore, Ed25519DocumentSigner> {
    let engine = SigningEngine::new(
        Arc::new(store.clone()),
        Arc::new(Ed25519DocumentSigner::new()),
        Arc::new(NoopAuditSink),
        EngineConfig::default(),
    )
    .unwrap();
    let certificate = Arc::new(SigningCertificate::new(
        ActorId::new("A1"),
        CertificateSerial::new("serial-A1"),
        SigningKey::from_bytes(&[3u8; 32]),
    ));
    TriggerConsumer::new(engine, certificate)
}

fn trigger(actor: &str, selector: RecordSelector) -> SigningTrigger {
    SigningTrigger {
        actor_id: ActorId::new(actor),
        selector,
        quantity: None,
    }
}

#[tokio::test]
async fn trigger_runs_signing_to_completion() {
    let store = store_with(&["a", "b"]);
    let report = consumer(&store).run(trigger("A1", RecordSelector::Unrestricted)).await.unwrap();

    assert_eq!(report.completed, 2);
    assert_eq!(store.signed_results().unwrap().len(), 2);
}

#[tokio::test]
async fn trigger_for_foreign_actor_is_rejected() {
    let store = store_with(&["a"]);
    let err = consumer(&store).run(trigger("B1", RecordSelector::Unrestricted)).await.unwrap_err();

    assert!(matches!(err, QueueError::Handler(_)));
    assert!(store.signed_results().unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn queued_triggers_drive_the_engine() {
    let store = store_with(&["a", "b", "c"]);
    let consumer = Arc::new(consumer(&store));
    let queue = Arc::new(ChannelQueue::new("signing", 4));
    queue.send(&trigger("A1", RecordSelector::Ids(vec![RecordId::new("a")]))).unwrap();
    queue.send(&trigger("B1", RecordSelector::Unrestricted)).unwrap();
    queue.send(&trigger("A1", RecordSelector::Unrestricted)).unwrap();
    let (stop, shutdown) = watch::channel(false);

    let receiver = Arc::clone(&queue);
    let handler = Arc::clone(&consumer);
    let task = tokio::spawn(async move {
        receiver
            .receive(
                move |trigger: SigningTrigger| {
                    let handler = Arc::clone(&handler);
                    async move { handler.handle(trigger).await }
                },
                Duration::from_millis(5),
                shutdown,
            )
            .await
    });
    while store.signed_results().unwrap().len() < 3 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    stop.send(true).unwrap();

    assert!(!task.await.unwrap().unwrap());
}

#[test]
fn trigger_json_shape_is_stable() {
    let decoded: SigningTrigger = serde_json::from_str(
        r#"{"actor_id":"A1","selector":{"kind":"ids","value":["r1","r2"]},"quantity":1}"#,
    )
    .unwrap();

    assert_eq!(decoded.actor_id.as_str(), "A1");
    assert_eq!(decoded.selector, RecordSelector::Ids(vec![RecordId::new("r1"), RecordId::new("r2")]));
    assert_eq!(decoded.quantity, Some(1));
}
