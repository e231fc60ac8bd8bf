use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum_macros::{Display, EnumString};

use crate::session::Identity;

/// Kind of change that happened to a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EventKind {
    Create,
    Update,
    Delete,
}

/// A change to a record in a watched collection. Transient; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub collection: String,
    pub id: String,
    /// Snapshot of the record after the change; absent for deletes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<Value>,
    /// Who made the change, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<Identity>,
    pub timestamp: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn new(kind: EventKind, collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind,
            collection: collection.into(),
            id: id.into(),
            doc: None,
            user: None,
            timestamp: Utc::now(),
        }
    }

    pub fn create(collection: impl Into<String>, id: impl Into<String>, doc: Value) -> Self {
        Self::new(EventKind::Create, collection, id).with_doc(doc)
    }

    pub fn update(collection: impl Into<String>, id: impl Into<String>, doc: Value) -> Self {
        Self::new(EventKind::Update, collection, id).with_doc(doc)
    }

    pub fn delete(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self::new(EventKind::Delete, collection, id)
    }

    /// Attaches a document snapshot. Ignored for deletes.
    pub fn with_doc(mut self, doc: Value) -> Self {
        if self.kind != EventKind::Delete {
            self.doc = Some(doc);
        }
        self
    }

    pub fn with_actor(mut self, actor: Identity) -> Self {
        self.user = Some(actor);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::str::FromStr;

    #[test]
    fn test_event_kind_strings() {
        assert_eq!(EventKind::Update.to_string(), "update");
        assert_eq!(EventKind::from_str("delete").unwrap(), EventKind::Delete);
        assert_eq!(serde_json::to_value(EventKind::Create).unwrap(), json!("create"));
    }

    #[test]
    fn test_delete_never_carries_doc() {
        let event = ChangeEvent::delete("posts", "7").with_doc(json!({"title": "gone"}));
        assert_eq!(event.doc, None);

        let json = serde_json::to_value(&event).unwrap();
        assert!(json.get("doc").is_none());
        assert_eq!(json["type"], "delete");
    }

    #[test]
    fn test_update_wire_shape() {
        let event = ChangeEvent::update("posts", "7", json!({"title": "Hello"}))
            .with_actor(Identity::new("1", "users"));
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "update");
        assert_eq!(json["collection"], "posts");
        assert_eq!(json["id"], "7");
        assert_eq!(json["doc"]["title"], "Hello");
        assert_eq!(json["user"]["id"], "1");
        assert!(json["timestamp"].is_string());

        let back: ChangeEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
