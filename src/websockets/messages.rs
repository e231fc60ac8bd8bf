use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Room-scoped, authorization-gated change notification
pub const LABEL_EVENT: &str = "payload:event";
/// Unscoped feed of every change, sent to every connection
pub const LABEL_EVENT_ALL: &str = "payload:event:all";

// Reserved inbound labels, handled by built-in room logic
pub const LABEL_SUBSCRIBE: &str = "subscribe";
pub const LABEL_JOIN_COLLECTION: &str = "join-collection";
pub const LABEL_UNSUBSCRIBE: &str = "unsubscribe";

/// Labels that custom handlers can never claim
pub const RESERVED_LABELS: [&str; 3] = [LABEL_SUBSCRIBE, LABEL_JOIN_COLLECTION, LABEL_UNSUBSCRIBE];

/// Wire envelope used in both directions: `{"type": <label>, "data": <payload>}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebSocketMessage {
    #[serde(rename = "type")]
    pub label: String,
    #[serde(default)]
    pub data: Value,
}

impl WebSocketMessage {
    pub fn new(label: impl Into<String>, data: Value) -> Self {
        Self {
            label: label.into(),
            data,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// A single collection slug or a list of them
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CollectionSlugs {
    One(String),
    Many(Vec<String>),
}

impl From<CollectionSlugs> for Vec<String> {
    fn from(slugs: CollectionSlugs) -> Self {
        match slugs {
            CollectionSlugs::One(slug) => vec![slug],
            CollectionSlugs::Many(slugs) => slugs,
        }
    }
}

/// Inbound message, validated at the socket boundary
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    /// `subscribe` / `join-collection`
    JoinCollections(Vec<String>),
    /// `unsubscribe`
    LeaveCollections(Vec<String>),
    /// Any other label; routed to the custom handler registry
    Custom { label: String, data: Value },
}

#[derive(Debug, Error)]
pub enum MessageError {
    #[error("Malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Invalid payload for {label}: expected a collection slug or a list of slugs")]
    InvalidSlugs { label: String },
}

impl ClientMessage {
    pub fn parse(text: &str) -> Result<Self, MessageError> {
        let message: WebSocketMessage = serde_json::from_str(text)?;
        Self::try_from(message)
    }

    fn slugs(label: &str, data: Value) -> Result<Vec<String>, MessageError> {
        serde_json::from_value::<CollectionSlugs>(data)
            .map(Into::into)
            .map_err(|_| MessageError::InvalidSlugs {
                label: label.to_string(),
            })
    }
}

impl TryFrom<WebSocketMessage> for ClientMessage {
    type Error = MessageError;

    fn try_from(message: WebSocketMessage) -> Result<Self, Self::Error> {
        match message.label.as_str() {
            LABEL_SUBSCRIBE | LABEL_JOIN_COLLECTION => Ok(ClientMessage::JoinCollections(
                Self::slugs(&message.label, message.data)?,
            )),
            LABEL_UNSUBSCRIBE => Ok(ClientMessage::LeaveCollections(Self::slugs(
                &message.label,
                message.data,
            )?)),
            _ => Ok(ClientMessage::Custom {
                label: message.label,
                data: message.data,
            }),
        }
    }
}
