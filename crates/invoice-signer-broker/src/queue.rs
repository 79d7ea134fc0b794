// crates/invoice-signer-broker/src/queue.rs
// ============================================================================
// Module: Channel Queue
// Description: Named bounded queue carrying JSON-encoded messages.
// Purpose: Send typed values and consume them with an async handler.
// Dependencies: serde, serde_json, tokio
// ============================================================================

//! ## Overview
//! [`ChannelQueue`] wraps a `tokio::sync::mpsc` channel. Producers enqueue
//! JSON text; the single consumer decodes each message and awaits a handler.
//! Invariants:
//! - Delivery is at-most-once; there is no retry or acknowledgement.
//! - [`ChannelQueue::receive`] returns `false` when any handler call did.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::watch;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Queue errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// The consumer side has been dropped.
    #[error("queue {0} is closed")]
    Closed(String),
    /// The bounded queue is full.
    #[error("queue {0} is full")]
    Full(String),
    /// Message encoding failed.
    #[error("queue encode error: {0}")]
    Encode(String),
    /// Message decoding failed.
    #[error("queue decode error: {0}")]
    Decode(String),
    /// Handler reported a failure.
    #[error("queue handler error: {0}")]
    Handler(String),
}

// ============================================================================
// SECTION: Sender
// ============================================================================

/// Cloneable producer handle for a named queue.
#[derive(Debug, Clone)]
pub struct QueueSender {
    /// Queue name used in errors.
    name: String,
    /// Channel sender.
    sender: mpsc::Sender<String>,
}

impl QueueSender {
    /// Returns the queue name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Encodes `value` as JSON and enqueues it without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] when encoding fails or the queue is full or closed.
    pub fn send<T: Serialize>(&self, value: &T) -> Result<(), QueueError> {
        let body = serde_json::to_string(value).map_err(|err| QueueError::Encode(err.to_string()))?;
        self.sender.try_send(body).map_err(|err| match err {
            TrySendError::Full(_) => QueueError::Full(self.name.clone()),
            TrySendError::Closed(_) => QueueError::Closed(self.name.clone()),
        })
    }

    /// Encodes `value` as JSON and enqueues it, waiting for capacity.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] when encoding fails or the queue is closed.
    pub async fn send_wait<T: Serialize>(&self, value: &T) -> Result<(), QueueError> {
        let body = serde_json::to_string(value).map_err(|err| QueueError::Encode(err.to_string()))?;
        self.sender.send(body).await.map_err(|_| QueueError::Closed(self.name.clone()))
    }
}

// ============================================================================
// SECTION: Queue
// ============================================================================

/// Named bounded message queue.
#[derive(Debug)]
pub struct ChannelQueue {
    /// Producer handle owned by the queue.
    sender: QueueSender,
    /// Consumer end; one receive loop at a time.
    receiver: Mutex<mpsc::Receiver<String>>,
}

impl ChannelQueue {
    /// Creates a queue holding at most `capacity` pending messages.
    #[must_use]
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        Self {
            sender: QueueSender {
                name: name.into(),
                sender,
            },
            receiver: Mutex::new(receiver),
        }
    }

    /// Returns the queue name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.sender.name()
    }

    /// Returns a producer handle for this queue.
    #[must_use]
    pub fn sender(&self) -> QueueSender {
        self.sender.clone()
    }

    /// Encodes `value` as JSON and enqueues it without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] when encoding fails or the queue is full.
    pub fn send<T: Serialize>(&self, value: &T) -> Result<(), QueueError> {
        self.sender.send(value)
    }

    /// Consumes messages until `shutdown` turns `true` or its sender drops.
    ///
    /// Each message is decoded as `T` and passed to `handler`. The shutdown
    /// flag is rechecked at least every `poll_interval` while idle.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Decode`] when a message is not valid JSON for `T`.
    pub async fn receive<T, F, Fut>(
        &self,
        mut handler: F,
        poll_interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<bool, QueueError>
    where
        T: DeserializeOwned,
        F: FnMut(T) -> Fut,
        Fut: Future<Output = bool>,
    {
        let mut receiver = self.receiver.lock().await;
        let mut all_succeeded = true;
        while !*shutdown.borrow() {
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                message = receiver.recv() => {
                    let Some(body) = message else {
                        break;
                    };
                    let value: T = serde_json::from_str(&body)
                        .map_err(|err| QueueError::Decode(err.to_string()))?;
                    if !handler(value).await {
                        all_succeeded = false;
                    }
                }
                () = tokio::time::sleep(poll_interval) => {}
            }
        }
        Ok(all_succeeded)
    }
}
