use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use super::events::ChangeEvent;
use crate::session::Identity;

/// Global predicate deciding whether an event is delivered at all
pub type EventFilter = Arc<dyn Fn(&ChangeEvent) -> bool + Send + Sync>;

/// Global rewrite applied before delivery
pub type EventTransform = Arc<dyn Fn(ChangeEvent) -> ChangeEvent + Send + Sync>;

/// Per-recipient gate: may this identity see this event?
pub type AuthorizePredicate = Arc<dyn Fn(&Identity, &ChangeEvent) -> bool + Send + Sync>;

/// Who in a collection room receives an event
pub enum Audience<'a> {
    /// No authorization configured: every member
    Everyone,
    /// Members for which the predicate holds
    Gated(&'a AuthorizePredicate),
    /// Authorization configured but nothing registered for the collection
    Nobody,
}

/// Filter, transform, allow-list and authorization rules for emitted events
#[derive(Clone, Default)]
pub struct DispatchPolicy {
    filter: Option<EventFilter>,
    transform: Option<EventTransform>,
    // None: authorization disabled. Some(empty): enabled, default-deny everywhere.
    authorization: Option<HashMap<String, AuthorizePredicate>>,
    collections: Option<HashSet<String>>,
}

impl DispatchPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&ChangeEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }

    pub fn with_transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(ChangeEvent) -> ChangeEvent + Send + Sync + 'static,
    {
        self.transform = Some(Arc::new(transform));
        self
    }

    /// Turns authorization on without registering any predicate
    pub fn require_authorization(mut self) -> Self {
        self.authorization.get_or_insert_with(HashMap::new);
        self
    }

    /// Registers the predicate for one collection, turning authorization on
    pub fn authorize<F>(mut self, collection: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Identity, &ChangeEvent) -> bool + Send + Sync + 'static,
    {
        self.authorization
            .get_or_insert_with(HashMap::new)
            .insert(collection.into(), Arc::new(predicate));
        self
    }

    /// Restricts emission to the given collections
    pub fn with_collections<I, S>(mut self, collections: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.collections = Some(collections.into_iter().map(Into::into).collect());
        self
    }

    /// Applies allow-list, filter and transform. `None` means the event is dropped.
    pub fn prepare(&self, event: ChangeEvent) -> Option<ChangeEvent> {
        if let Some(collections) = &self.collections {
            if !collections.contains(&event.collection) {
                return None;
            }
        }

        if let Some(filter) = &self.filter {
            if !filter(&event) {
                return None;
            }
        }

        Some(match &self.transform {
            Some(transform) => transform(event),
            None => event,
        })
    }

    pub fn audience(&self, collection: &str) -> Audience<'_> {
        match &self.authorization {
            None => Audience::Everyone,
            Some(predicates) => match predicates.get(collection) {
                Some(predicate) => Audience::Gated(predicate),
                None => Audience::Nobody,
            },
        }
    }
}

impl fmt::Debug for DispatchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchPolicy")
            .field("filter", &self.filter.is_some())
            .field("transform", &self.transform.is_some())
            .field(
                "authorized_collections",
                &self.authorization.as_ref().map(|p| p.keys().collect::<Vec<_>>()),
            )
            .field("collections", &self.collections)
            .finish()
    }
}
