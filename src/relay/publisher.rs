use serde_json::Value;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

use super::envelope::{RelayEnvelope, RelayKind};
use super::RelayError;

/// Hub-side end of the relay: queues envelopes for the bridge without waiting on the broker.
///
/// Delivery is best-effort. A full or closed queue drops the envelope.
#[derive(Debug, Clone)]
pub struct RelayPublisher {
    origin: String,
    queue: mpsc::Sender<RelayEnvelope>,
}

impl RelayPublisher {
    /// Creates a publisher stamped with `origin` and the queue the bridge drains
    pub fn channel(
        origin: impl Into<String>,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<RelayEnvelope>) {
        let (queue, receiver) = mpsc::channel(capacity.max(1));
        (
            Self {
                origin: origin.into(),
                queue,
            },
            receiver,
        )
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn try_publish(
        &self,
        kind: RelayKind,
        room: &str,
        label: &str,
        data: Value,
    ) -> Result<(), RelayError> {
        let envelope = RelayEnvelope::new(kind, room, label, data).with_origin(&self.origin);

        self.queue.try_send(envelope).map_err(|e| match e {
            TrySendError::Full(_) => RelayError::QueueFull,
            TrySendError::Closed(_) => RelayError::Closed,
        })
    }

    /// Queues an envelope, logging and swallowing failures
    pub fn publish(&self, kind: RelayKind, room: &str, label: &str, data: Value) {
        match self.try_publish(kind, room, label, data) {
            Ok(()) => debug!(room = %room, label = %label, kind = ?kind, "Relay envelope queued"),
            Err(e) => warn!(room = %room, label = %label, error = %e, "Relay envelope dropped"),
        }
    }
}
