#![allow(dead_code)] // Test utilities may not all be used in every test

use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use roomcast::{
    hub::HubHandle,
    session::{Identity, IdentityResolver, LookupError, TokenClaims},
    websockets::{ConnectionInfo, HandlerError, MessageHandler},
};

// ============================================================================
// Mock Infrastructure
// ============================================================================

/// Records every invocation as (handler name, subject id, payload)
#[derive(Clone)]
pub struct RecordingHandler {
    name: String,
    calls: Arc<Mutex<Vec<(String, String, Value)>>>,
}

impl RecordingHandler {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Another handler writing into the same call log
    pub fn sibling(&self, name: &str) -> Self {
        Self {
            name: name.to_string(),
            calls: self.calls.clone(),
        }
    }

    pub fn calls(&self) -> Vec<(String, String, Value)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageHandler for RecordingHandler {
    async fn handle(
        &self,
        _hub: HubHandle,
        connection: ConnectionInfo,
        data: Value,
    ) -> Result<(), HandlerError> {
        self.calls
            .lock()
            .unwrap()
            .push((self.name.clone(), connection.identity.id, data));
        Ok(())
    }
}

/// Always fails
pub struct FailingHandler;

#[async_trait]
impl MessageHandler for FailingHandler {
    async fn handle(
        &self,
        _hub: HubHandle,
        _connection: ConnectionInfo,
        _data: Value,
    ) -> Result<(), HandlerError> {
        Err(HandlerError::failed("boom"))
    }
}

/// Identity lookup that parks until released, so a test can abort mid-handshake
pub struct GatedResolver {
    pub release: Arc<Notify>,
    pub started: Arc<Notify>,
}

impl GatedResolver {
    pub fn new() -> Self {
        Self {
            release: Arc::new(Notify::new()),
            started: Arc::new(Notify::new()),
        }
    }
}

#[async_trait]
impl IdentityResolver for GatedResolver {
    async fn resolve(&self, claims: &TokenClaims) -> Result<Option<Identity>, LookupError> {
        self.started.notify_one();
        self.release.notified().await;
        Ok(Some(Identity::new(
            claims.id.clone(),
            claims.collection.clone(),
        )))
    }
}
