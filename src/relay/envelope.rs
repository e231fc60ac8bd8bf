use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelayKind {
    Event,
    RoomBroadcast,
    /// Anything a newer or foreign publisher sends; ignored on receipt
    #[serde(other)]
    Unknown,
}

/// Message exchanged between instances on the shared relay channel.
///
/// The payload is written under both `event` and `message` so either
/// consumption path can read it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayEnvelope {
    #[serde(rename = "type")]
    pub kind: RelayKind,
    pub room: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Value>,
    /// Instance id of the publisher
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}

impl RelayEnvelope {
    pub fn new(
        kind: RelayKind,
        room: impl Into<String>,
        label: impl Into<String>,
        data: Value,
    ) -> Self {
        Self {
            kind,
            room: room.into(),
            label: label.into(),
            event: Some(data.clone()),
            message: Some(data),
            origin: None,
        }
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn payload(&self) -> Option<&Value> {
        self.event.as_ref().or(self.message.as_ref())
    }
}
