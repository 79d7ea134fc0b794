// crates/invoice-signer-broker/src/lib.rs
// ============================================================================
// Module: Invoice Signer Broker Library
// Description: Named message queue and signing trigger consumer.
// Purpose: Deliver signing triggers from producers into the engine.
// Dependencies: invoice-signer-core, serde_json, tokio
// ============================================================================

//! ## Overview
//! The broker carries JSON messages over a named, bounded in-process queue.
//! [`TriggerConsumer`] turns [`SigningTrigger`] messages into signing runs on
//! a blocking thread so the async receive loop never stalls on a page.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod queue;
pub mod trigger;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use queue::ChannelQueue;
pub use queue::QueueError;
pub use queue::QueueSender;
pub use trigger::SigningTrigger;
pub use trigger::TriggerConsumer;
