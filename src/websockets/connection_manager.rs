use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::session::Identity;
use crate::shared::ConnectionId;

#[derive(Debug, Error, PartialEq)]
#[error("Connection {0} is no longer accepting messages")]
pub struct SendError(pub ConnectionId);

/// One authenticated client channel.
///
/// The sender feeds the socket task's outbound queue; it is the only way the
/// hub reaches the transport.
#[derive(Debug)]
pub struct Connection {
    pub id: ConnectionId,
    pub identity: Identity,
    pub connected_at: DateTime<Utc>,
    sender: mpsc::UnboundedSender<String>,
}

impl Connection {
    pub fn new(
        id: ConnectionId,
        identity: Identity,
        sender: mpsc::UnboundedSender<String>,
    ) -> Self {
        Self {
            id,
            identity,
            connected_at: Utc::now(),
            sender,
        }
    }

    pub fn send(&self, text: String) -> Result<(), SendError> {
        self.sender.send(text).map_err(|_| SendError(self.id))
    }
}

/// Read-only snapshot of a connection, handed to handlers and hooks
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionInfo {
    pub id: ConnectionId,
    pub identity: Identity,
    pub rooms: Vec<String>,
    pub connected_at: DateTime<Utc>,
}

/// Table of registered connections, owned by the hub task
#[derive(Debug, Default)]
pub struct ConnectionManager {
    connections: HashMap<ConnectionId, Connection>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connection. Refuses an id that is already registered.
    pub fn add_connection(&mut self, connection: Connection) -> bool {
        if self.connections.contains_key(&connection.id) {
            error!(connection_id = %connection.id, "Connection id already registered");
            return false;
        }

        debug!(
            connection_id = %connection.id,
            subject = %connection.identity.id,
            "Connection registered"
        );
        self.connections.insert(connection.id, connection);
        true
    }

    pub fn remove_connection(&mut self, id: ConnectionId) -> Option<Connection> {
        self.connections.remove(&id)
    }

    pub fn get(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Sends pre-serialized text to one connection
    pub fn send_to(&self, id: ConnectionId, text: &str) -> Result<(), SendError> {
        match self.connections.get(&id) {
            Some(connection) => connection.send(text.to_string()),
            None => Err(SendError(id)),
        }
    }
}
