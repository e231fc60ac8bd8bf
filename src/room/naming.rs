/// Prefix of rooms derived from a collection slug
pub const COLLECTION_ROOM_PREFIX: &str = "collection:";

/// Label used for departure notices unless a rule names another one
pub const DEFAULT_LEAVE_LABEL: &str = "user-left";

/// Deterministic room name for a collection slug
pub fn collection_room(slug: &str) -> String {
    format!("{COLLECTION_ROOM_PREFIX}{slug}")
}

/// One room-naming convention whose members are told when someone disconnects
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaveNotice {
    pub prefix: String,
    pub label: String,
}

impl LeaveNotice {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            label: DEFAULT_LEAVE_LABEL.to_string(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

/// Which room kinds receive departure notices.
///
/// Only rooms matching a configured prefix are notified; collection rooms and
/// other custom rooms are left silent unless a rule names them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaveNoticePolicy {
    rules: Vec<LeaveNotice>,
}

impl LeaveNoticePolicy {
    pub fn new(rules: Vec<LeaveNotice>) -> Self {
        Self { rules }
    }

    pub fn from_prefixes<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(prefixes.into_iter().map(LeaveNotice::new).collect())
    }

    /// Label to broadcast under when a member of `room` disconnects, if any
    pub fn label_for(&self, room: &str) -> Option<&str> {
        self.rules
            .iter()
            .find(|rule| room.starts_with(&rule.prefix))
            .map(|rule| rule.label.as_str())
    }
}

impl Default for LeaveNoticePolicy {
    fn default() -> Self {
        Self::from_prefixes(["room:"])
    }
}
