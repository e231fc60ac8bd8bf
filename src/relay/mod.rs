// Cross-instance relay
//
// Local broadcasts are queued to a bridge that publishes them on one shared
// redis channel; envelopes received on that channel re-enter the hub through
// its local-only delivery path and are never published again.

// Public API - what other modules can use
pub use backoff::Backoff;
pub use bridge::{RelayBridge, RelayTasks};
pub use envelope::{RelayEnvelope, RelayKind};
pub use publisher::RelayPublisher;

use thiserror::Error;

// Internal modules
mod backoff;
mod bridge;
mod envelope;
mod publisher;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Relay queue is full")]
    QueueFull,

    #[error("Relay queue is closed")]
    Closed,
}
