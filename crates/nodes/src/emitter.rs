//! Ordered, lossless delivery of [`CollaborationEvent`]s to one consumer.
//!
//! Backed by a bounded `tokio::sync::mpsc` channel: a slow consumer applies
//! back-pressure to the run instead of losing events. When the consumer goes
//! away, [`EventEmitter::emit`] reports [`Cancelled`] and the run stops before
//! starting any further step.

use thiserror::Error;
use tokio::sync::mpsc;

use pipeline::CollaborationEvent;

/// Default channel capacity used by [`EventEmitter::channel`].
pub const DEFAULT_CAPACITY: usize = 64;

/// The consumer of the event stream is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Event consumer disconnected")]
pub struct Cancelled;

/// Sending half of a run's event stream.
#[derive(Debug, Clone)]
pub struct EventEmitter {
    tx: mpsc::Sender<CollaborationEvent>,
}

impl EventEmitter {
    /// Wraps an existing sender.
    pub fn new(tx: mpsc::Sender<CollaborationEvent>) -> Self {
        Self { tx }
    }

    /// Creates an emitter together with its receiving half.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<CollaborationEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }

    /// Delivers `event` after every previously emitted event.
    ///
    /// Waits for channel capacity rather than dropping the event.
    pub async fn emit(&self, event: CollaborationEvent) -> Result<(), Cancelled> {
        let kind = event.kind();
        self.tx.send(event).await.map_err(|_| {
            tracing::info!(event = kind, "Event consumer disconnected");
            Cancelled
        })
    }
}
