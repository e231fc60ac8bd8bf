use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use super::connection_manager::ConnectionInfo;
use super::messages::RESERVED_LABELS;
use crate::hub::HubHandle;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum HandlerError {
    #[error("Label {0} is reserved for built-in room handling")]
    ReservedLabel(String),

    #[error("Handler failed: {0}")]
    Failed(String),
}

impl HandlerError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Handler for one custom inbound label.
///
/// Runs in its own task and reaches shared state only through the [`HubHandle`].
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(
        &self,
        hub: HubHandle,
        connection: ConnectionInfo,
        data: Value,
    ) -> Result<(), HandlerError>;
}

#[async_trait]
impl<F, Fut> MessageHandler for F
where
    F: Fn(HubHandle, ConnectionInfo, Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    async fn handle(
        &self,
        hub: HubHandle,
        connection: ConnectionInfo,
        data: Value,
    ) -> Result<(), HandlerError> {
        (self)(hub, connection, data).await
    }
}

/// Called once for every connection after it is registered
#[async_trait]
pub trait ConnectHook: Send + Sync {
    async fn on_connect(&self, hub: HubHandle, connection: ConnectionInfo)
        -> Result<(), HandlerError>;
}

#[async_trait]
impl<F, Fut> ConnectHook for F
where
    F: Fn(HubHandle, ConnectionInfo) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    async fn on_connect(
        &self,
        hub: HubHandle,
        connection: ConnectionInfo,
    ) -> Result<(), HandlerError> {
        (self)(hub, connection).await
    }
}

/// Label -> handler table for custom inbound messages.
///
/// The last registration for a label wins. `subscribe`, `join-collection` and
/// `unsubscribe` are permanently reserved for the built-in room logic and can
/// never be registered here.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn MessageHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_reserved(label: &str) -> bool {
        RESERVED_LABELS.contains(&label)
    }

    pub fn register(
        &mut self,
        label: impl Into<String>,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<(), HandlerError> {
        let label = label.into();
        if Self::is_reserved(&label) {
            warn!(label = %label, "Refusing to register handler for reserved label");
            return Err(HandlerError::ReservedLabel(label));
        }

        let replaced = self.handlers.insert(label.clone(), handler).is_some();
        info!(label = %label, replaced, "Registered custom handler");
        Ok(())
    }

    pub fn get(&self, label: &str) -> Option<Arc<dyn MessageHandler>> {
        self.handlers.get(label).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> Arc<dyn MessageHandler> {
        Arc::new(|_hub: HubHandle, _conn: ConnectionInfo, _data: Value| async {
            Ok::<(), HandlerError>(())
        })
    }

    fn failing(message: &'static str) -> Arc<dyn MessageHandler> {
        Arc::new(move |_hub: HubHandle, _conn: ConnectionInfo, _data: Value| async move {
            Err::<(), _>(HandlerError::failed(message))
        })
    }

    #[test]
    fn test_reserved_labels_cannot_be_registered() {
        let mut registry = HandlerRegistry::new();

        for label in ["subscribe", "join-collection", "unsubscribe"] {
            assert_eq!(
                registry.register(label, noop()),
                Err(HandlerError::ReservedLabel(label.to_string()))
            );
            assert!(registry.get(label).is_none());
        }
        assert!(registry.handlers.is_empty());
    }

    #[test]
    fn test_last_registration_wins() {
        let mut registry = HandlerRegistry::new();
        let first = noop();
        let second = failing("second");

        registry.register("typing", first).unwrap();
        registry.register("typing", second.clone()).unwrap();

        let current = registry.get("typing").unwrap();
        assert!(Arc::ptr_eq(&current, &second));
        assert_eq!(registry.handlers.len(), 1);
    }

    #[test]
    fn test_unknown_label() {
        assert!(HandlerRegistry::new().get("nope").is_none());
    }
}
