use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

use crate::event::ChangeEvent;
use crate::relay::RelayEnvelope;
use crate::shared::ConnectionId;
use crate::websockets::{Connection, ConnectionInfo, HandlerError, HandlerRegistry, MessageHandler};

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("Hub is no longer running")]
pub struct HubClosed;

/// Work queued for the hub task
pub(crate) enum HubCommand {
    Open {
        connection: Connection,
        opened: oneshot::Sender<()>,
    },
    Inbound {
        connection_id: ConnectionId,
        text: String,
    },
    Close(ConnectionId),
    EmitEvent(ChangeEvent),
    BroadcastToRoom {
        room: String,
        label: String,
        data: Value,
        exclude: Option<ConnectionId>,
    },
    SendTo {
        connection_id: ConnectionId,
        label: String,
        data: Value,
    },
    JoinRoom {
        connection_id: ConnectionId,
        room: String,
    },
    LeaveRoom {
        connection_id: ConnectionId,
        room: String,
    },
    RegisterHandler {
        label: String,
        handler: Arc<dyn MessageHandler>,
    },
    RelayInbound(RelayEnvelope),
    Query(HubQuery),
}

pub(crate) enum HubQuery {
    RoomMembers {
        room: String,
        reply: oneshot::Sender<Vec<ConnectionId>>,
    },
    Rooms(oneshot::Sender<Vec<String>>),
    Connection {
        connection_id: ConnectionId,
        reply: oneshot::Sender<Option<ConnectionInfo>>,
    },
    ConnectionCount(oneshot::Sender<usize>),
}

/// Cloneable front door to the hub.
///
/// Every call is queued onto the hub task in FIFO order, so a query observes
/// the effect of every call issued before it from the same handle.
#[derive(Clone)]
pub struct HubHandle {
    commands: mpsc::UnboundedSender<HubCommand>,
}

impl HubHandle {
    pub(crate) fn new(commands: mpsc::UnboundedSender<HubCommand>) -> Self {
        Self { commands }
    }

    fn enqueue(&self, command: HubCommand) -> Result<(), HubClosed> {
        self.commands.send(command).map_err(|_| HubClosed)
    }

    fn enqueue_or_log(&self, command: HubCommand, operation: &'static str) {
        if self.enqueue(command).is_err() {
            warn!(operation, "Hub is closed, dropping request");
        }
    }

    async fn query<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> HubQuery,
    ) -> Result<T, HubClosed> {
        let (reply, response) = oneshot::channel();
        self.enqueue(HubCommand::Query(build(reply)))?;
        response.await.map_err(|_| HubClosed)
    }

    // Connection lifecycle, driven by the socket task

    /// Registers an authenticated connection ("open").
    ///
    /// Resolves once the connect hook has run, so frames passed to
    /// [`HubHandle::inbound`] afterwards reach any handler the hook registered.
    /// Fails if the hub stopped or refused the connection.
    pub async fn open(&self, connection: Connection) -> Result<(), HubClosed> {
        let (opened, ack) = oneshot::channel();
        self.enqueue(HubCommand::Open { connection, opened })?;
        ack.await.map_err(|_| HubClosed)
    }

    pub fn inbound(&self, connection_id: ConnectionId, text: String) -> Result<(), HubClosed> {
        self.enqueue(HubCommand::Inbound {
            connection_id,
            text,
        })
    }

    /// Leave notices, room eviction and table removal for a closed connection
    pub fn close(&self, connection_id: ConnectionId) {
        self.enqueue_or_log(HubCommand::Close(connection_id), "close");
    }

    /// Replays an envelope received from another instance. Local delivery only.
    pub fn relay_inbound(&self, envelope: RelayEnvelope) -> Result<(), HubClosed> {
        self.enqueue(HubCommand::RelayInbound(envelope))
    }

    // Host-facing API

    pub fn emit_event(&self, event: ChangeEvent) {
        self.enqueue_or_log(HubCommand::EmitEvent(event), "emit_event");
    }

    pub fn broadcast_to_room(
        &self,
        room: impl Into<String>,
        label: impl Into<String>,
        data: Value,
        exclude: Option<ConnectionId>,
    ) {
        self.enqueue_or_log(
            HubCommand::BroadcastToRoom {
                room: room.into(),
                label: label.into(),
                data,
                exclude,
            },
            "broadcast_to_room",
        );
    }

    pub fn send_to(&self, connection_id: ConnectionId, label: impl Into<String>, data: Value) {
        self.enqueue_or_log(
            HubCommand::SendTo {
                connection_id,
                label: label.into(),
                data,
            },
            "send_to",
        );
    }

    pub fn join_room(&self, connection_id: ConnectionId, room: impl Into<String>) {
        self.enqueue_or_log(
            HubCommand::JoinRoom {
                connection_id,
                room: room.into(),
            },
            "join_room",
        );
    }

    pub fn leave_room(&self, connection_id: ConnectionId, room: impl Into<String>) {
        self.enqueue_or_log(
            HubCommand::LeaveRoom {
                connection_id,
                room: room.into(),
            },
            "leave_room",
        );
    }

    /// Registers a custom handler. Reserved labels are refused immediately.
    pub fn register_handler<H>(
        &self,
        label: impl Into<String>,
        handler: H,
    ) -> Result<(), HandlerError>
    where
        H: MessageHandler + 'static,
    {
        let label = label.into();
        if HandlerRegistry::is_reserved(&label) {
            return Err(HandlerError::ReservedLabel(label));
        }

        self.enqueue_or_log(
            HubCommand::RegisterHandler {
                label,
                handler: Arc::new(handler),
            },
            "register_handler",
        );
        Ok(())
    }

    // Introspection

    pub async fn room_members(
        &self,
        room: impl Into<String>,
    ) -> Result<Vec<ConnectionId>, HubClosed> {
        let room = room.into();
        self.query(|reply| HubQuery::RoomMembers { room, reply }).await
    }

    pub async fn rooms(&self) -> Result<Vec<String>, HubClosed> {
        self.query(HubQuery::Rooms).await
    }

    pub async fn connection(
        &self,
        connection_id: ConnectionId,
    ) -> Result<Option<ConnectionInfo>, HubClosed> {
        self.query(|reply| HubQuery::Connection {
            connection_id,
            reply,
        })
        .await
    }

    pub async fn connection_count(&self) -> Result<usize, HubClosed> {
        self.query(HubQuery::ConnectionCount).await
    }
}
