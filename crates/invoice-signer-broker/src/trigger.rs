// crates/invoice-signer-broker/src/trigger.rs
// ============================================================================
// Module: Signing Triggers
// Description: Queue message that requests a signing run, and its consumer.
// Purpose: Forward queued triggers into the signing engine.
// Dependencies: invoice-signer-core, serde, tokio
// ============================================================================

//! ## Overview
//! A [`SigningTrigger`] names the actor and the records to sign. The
//! [`TriggerConsumer`] holds one certificate and rejects triggers for any
//! other actor before touching the store.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use invoice_signer_core::ActorId;
use invoice_signer_core::DocumentSigner;
use invoice_signer_core::RecordSelector;
use invoice_signer_core::SigningCertificate;
use invoice_signer_core::SigningEngine;
use invoice_signer_core::SigningReport;
use invoice_signer_core::SigningRequest;
use invoice_signer_core::SigningStore;
use serde::Deserialize;
use serde::Serialize;

use crate::queue::QueueError;

// ============================================================================
// SECTION: Trigger
// ============================================================================

/// Message requesting a signing run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SigningTrigger {
    /// Requesting actor.
    pub actor_id: ActorId,
    /// Records to sign.
    pub selector: RecordSelector,
    /// Optional cap on rows claimed.
    #[serde(default)]
    pub quantity: Option<usize>,
}

// ============================================================================
// SECTION: Consumer
// ============================================================================

/// Runs signing triggers against an engine with a fixed certificate.
pub struct TriggerConsumer<S, G> {
    /// Engine that performs the runs.
    engine: SigningEngine<S, G>,
    /// Certificate used for every run.
    certificate: Arc<SigningCertificate>,
}

impl<S, G> TriggerConsumer<S, G>
where
    S: SigningStore + 'static,
    G: DocumentSigner + 'static,
{
    /// Creates a consumer.
    #[must_use]
    pub const fn new(engine: SigningEngine<S, G>, certificate: Arc<SigningCertificate>) -> Self {
        Self {
            engine,
            certificate,
        }
    }

    /// Runs one trigger to completion on a blocking thread.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Handler`] when the trigger names another actor,
    /// the run fails, or the blocking task cannot be joined.
    pub async fn run(&self, trigger: SigningTrigger) -> Result<SigningReport, QueueError> {
        if trigger.actor_id != self.certificate.subject_id {
            return Err(QueueError::Handler(format!("no certificate for actor {}", trigger.actor_id)));
        }
        let engine = self.engine.clone();
        let request = SigningRequest {
            actor_id: trigger.actor_id,
            certificate: Arc::clone(&self.certificate),
            selector: trigger.selector,
            quantity: trigger.quantity,
        };
        tokio::task::spawn_blocking(move || engine.request_signing(request).and_then(|run| run.wait()))
            .await
            .map_err(|err| QueueError::Handler(err.to_string()))?
            .map_err(|err| QueueError::Handler(err.to_string()))
    }

    /// Runs one trigger and reports whether it succeeded.
    pub async fn handle(&self, trigger: SigningTrigger) -> bool {
        self.run(trigger).await.is_ok()
    }
}
