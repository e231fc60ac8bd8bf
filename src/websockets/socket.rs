use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::debug;

use crate::hub::HubHandle;
use crate::shared::ConnectionId;

/// Simple WebSocket abstraction - all we care about is send/receive
#[async_trait]
pub trait SocketWrapper: Send {
    /// Send a text message to the client
    async fn send_message(&mut self, message: String) -> Result<(), SocketError>;

    /// Receive the next text message from the client (None if connection closed)
    async fn receive_message(&mut self) -> Result<Option<String>, SocketError>;

    /// Close the connection
    async fn close(&mut self) -> Result<(), SocketError>;
}

#[derive(Debug, thiserror::Error)]
pub enum SocketError {
    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Receive failed: {0}")]
    ReceiveFailed(String),
}

/// Direct implementation on axum's WebSocket
#[async_trait]
impl SocketWrapper for WebSocket {
    async fn send_message(&mut self, message: String) -> Result<(), SocketError> {
        self.send(Message::Text(message))
            .await
            .map_err(|e| SocketError::SendFailed(e.to_string()))
    }

    async fn receive_message(&mut self) -> Result<Option<String>, SocketError> {
        loop {
            match self.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(text)),
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                // Ping/pong are answered by axum; binary frames carry nothing we route
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(SocketError::ReceiveFailed(e.to_string())),
            }
        }
    }

    async fn close(&mut self) -> Result<(), SocketError> {
        self.send(Message::Close(None))
            .await
            .map_err(|e| SocketError::SendFailed(e.to_string()))
    }
}

/// Pumps one registered connection: hub output to the client, client input to the hub
pub struct SocketSession {
    pub connection_id: ConnectionId,
    socket: Box<dyn SocketWrapper>,
    outbound_receiver: mpsc::UnboundedReceiver<String>,
    hub: HubHandle,
}

impl SocketSession {
    pub fn new(
        connection_id: ConnectionId,
        socket: Box<dyn SocketWrapper>,
        outbound_receiver: mpsc::UnboundedReceiver<String>,
        hub: HubHandle,
    ) -> Self {
        Self {
            connection_id,
            socket,
            outbound_receiver,
            hub,
        }
    }

    /// Runs until either side goes away. Does not unregister the connection.
    pub async fn run(mut self) -> Result<(), SocketError> {
        loop {
            tokio::select! {
                // Outbound messages (hub -> client)
                msg = self.outbound_receiver.recv() => {
                    match msg {
                        Some(message) => self.socket.send_message(message).await?,
                        None => break, // Hub dropped the connection
                    }
                }

                // Inbound messages (client -> hub)
                msg = self.socket.receive_message() => {
                    match msg? {
                        Some(message) => {
                            if self.hub.inbound(self.connection_id, message).is_err() {
                                debug!(
                                    connection_id = %self.connection_id,
                                    "Hub closed, ending session"
                                );
                                break;
                            }
                        }
                        None => break, // Client disconnected
                    }
                }
            }
        }

        // Clean disconnect
        let _ = self.socket.close().await;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Scripted socket: yields queued inbound frames, records outbound ones
    pub struct ScriptedSocket {
        pub inbound: VecDeque<String>,
        pub sent: Arc<Mutex<Vec<String>>>,
        pub closed: Arc<Mutex<bool>>,
        pub hold_open: bool,
    }

    #[async_trait]
    impl SocketWrapper for ScriptedSocket {
        async fn send_message(&mut self, message: String) -> Result<(), SocketError> {
            self.sent.lock().unwrap().push(message);
            Ok(())
        }

        async fn receive_message(&mut self) -> Result<Option<String>, SocketError> {
            match self.inbound.pop_front() {
                Some(text) => Ok(Some(text)),
                None if self.hold_open => std::future::pending().await,
                None => Ok(None),
            }
        }

        async fn close(&mut self) -> Result<(), SocketError> {
            *self.closed.lock().unwrap() = true;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::ScriptedSocket;
    use super::*;
    use crate::hub::{Hub, HubConfig};
    use crate::session::Identity;
    use crate::websockets::Connection;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[tokio::test]
    async fn test_session_forwards_inbound_and_outbound() {
        let (hub, _task) = Hub::spawn(HubConfig::new(), None);
        let (tx, rx) = mpsc::unbounded_channel();
        let id = ConnectionId::new();
        hub.open(Connection::new(id, Identity::new("7", "users"), tx))
            .await
            .unwrap();

        let sent = Arc::new(Mutex::new(Vec::new()));
        let closed = Arc::new(Mutex::new(false));
        let socket = ScriptedSocket {
            inbound: VecDeque::from(vec![r#"{"type":"subscribe","data":"posts"}"#.to_string()]),
            sent: sent.clone(),
            closed: closed.clone(),
            hold_open: true,
        };

        let session = tokio::spawn(SocketSession::new(id, Box::new(socket), rx, hub.clone()).run());

        // Wait for the subscribe frame to reach the hub
        let mut joined = false;
        for _ in 0..50 {
            if hub.room_members("collection:posts").await.unwrap() == vec![id] {
                joined = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(joined);

        hub.send_to(id, "hello", serde_json::json!({"n": 1}));
        for _ in 0..50 {
            if !sent.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(
            sent.lock().unwrap().as_slice(),
            &[r#"{"type":"hello","data":{"n":1}}"#.to_string()]
        );

        session.abort();
    }

    #[tokio::test]
    async fn test_session_ends_when_client_disconnects() {
        let (hub, _task) = Hub::spawn(HubConfig::new(), None);
        let (_tx, rx) = mpsc::unbounded_channel();
        let closed = Arc::new(Mutex::new(false));
        let socket = ScriptedSocket {
            inbound: VecDeque::new(),
            sent: Arc::new(Mutex::new(Vec::new())),
            closed: closed.clone(),
            hold_open: false,
        };

        SocketSession::new(ConnectionId::new(), Box::new(socket), rx, hub)
            .run()
            .await
            .unwrap();
        assert!(*closed.lock().unwrap());
    }
}
