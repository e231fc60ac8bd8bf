use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::config::HubConfig;
use super::handle::{HubCommand, HubHandle, HubQuery};
use crate::event::{ChangeEvent, EventDispatcher};
use crate::relay::{RelayEnvelope, RelayKind, RelayPublisher};
use crate::room::{collection_room, LeaveNoticePolicy, RoomRegistry};
use crate::shared::ConnectionId;
use crate::websockets::{
    ClientMessage, ConnectHook, Connection, ConnectionInfo, ConnectionManager, HandlerRegistry,
    MessageHandler,
};

/// Owner of all process-wide realtime state.
///
/// The connection table, room registry and handler registry live here and are
/// mutated only by [`Hub::run`], one queued command at a time. Nothing else
/// holds a reference to them, so no locking is involved.
pub struct Hub {
    connections: ConnectionManager,
    rooms: RoomRegistry,
    handlers: HandlerRegistry,
    dispatcher: EventDispatcher,
    leave_notices: LeaveNoticePolicy,
    on_connect: Option<Arc<dyn ConnectHook>>,
    commands: mpsc::UnboundedReceiver<HubCommand>,
    // Weak so the loop ends once every external handle is dropped
    myself: mpsc::WeakUnboundedSender<HubCommand>,
}

impl Hub {
    pub fn new(config: HubConfig, relay: Option<RelayPublisher>) -> (Self, HubHandle) {
        let (sender, commands) = mpsc::unbounded_channel();
        let hub = Self {
            connections: ConnectionManager::new(),
            rooms: RoomRegistry::new(),
            handlers: HandlerRegistry::new(),
            dispatcher: EventDispatcher::new(config.policy, relay),
            leave_notices: config.leave_notices,
            on_connect: config.on_connect,
            commands,
            myself: sender.downgrade(),
        };
        (hub, HubHandle::new(sender))
    }

    /// Spawns the hub loop and returns its handle
    pub fn spawn(config: HubConfig, relay: Option<RelayPublisher>) -> (HubHandle, JoinHandle<()>) {
        let (hub, handle) = Self::new(config, relay);
        let task = tokio::spawn(hub.run());
        (handle, task)
    }

    pub async fn run(mut self) {
        info!(relay = self.dispatcher.origin().is_some(), "Hub started");

        while let Some(command) = self.commands.recv().await {
            self.apply(command);
        }

        info!(connections = self.connections.len(), "Hub stopped");
    }

    fn handle(&self) -> Option<HubHandle> {
        self.myself.upgrade().map(HubHandle::new)
    }

    fn apply(&mut self, command: HubCommand) {
        match command {
            HubCommand::Open { connection, opened } => self.open(connection, opened),
            HubCommand::Inbound {
                connection_id,
                text,
            } => self.inbound(connection_id, &text),
            HubCommand::Close(connection_id) => self.close(connection_id),
            HubCommand::EmitEvent(event) => self.emit_event(event),
            HubCommand::BroadcastToRoom {
                room,
                label,
                data,
                exclude,
            } => {
                self.dispatcher.broadcast_to_room(
                    &room,
                    &label,
                    data,
                    exclude,
                    &self.connections,
                    &self.rooms,
                );
            }
            HubCommand::SendTo {
                connection_id,
                label,
                data,
            } => {
                self.dispatcher
                    .send_to_socket(connection_id, &label, &data, &self.connections);
            }
            HubCommand::JoinRoom {
                connection_id,
                room,
            } => self.join_room(connection_id, &room),
            HubCommand::LeaveRoom {
                connection_id,
                room,
            } => {
                self.rooms.leave(connection_id, &room);
            }
            HubCommand::RegisterHandler { label, handler } => {
                // Reserved labels are rejected (and logged) by the registry
                let _ = self.handlers.register(label, handler);
            }
            HubCommand::RelayInbound(envelope) => self.relay_inbound(envelope),
            HubCommand::Query(query) => self.answer(query),
        }
    }

    /// Registers the connection, then acknowledges on `opened` once the connect
    /// hook (if any) has finished. The socket task waits for that ack before
    /// pumping client frames, so handlers the hook registers see the first frame.
    fn open(&mut self, connection: Connection, opened: oneshot::Sender<()>) {
        let connection_id = connection.id;
        let subject = connection.identity.id.clone();

        if !self.connections.add_connection(connection) {
            return;
        }

        info!(
            connection_id = %connection_id,
            subject = %subject,
            connections = self.connections.len(),
            "Connection opened"
        );

        let (Some(hook), Some(hub), Some(info)) =
            (self.on_connect.clone(), self.handle(), self.info(connection_id))
        else {
            let _ = opened.send(());
            return;
        };

        tokio::spawn(async move {
            if let Err(e) = hook.on_connect(hub, info).await {
                warn!(connection_id = %connection_id, error = %e, "Connect hook failed");
            }
            // Every command the hook issued is already queued
            let _ = opened.send(());
        });
    }

    fn close(&mut self, connection_id: ConnectionId) {
        let Some(connection) = self.connections.get(connection_id) else {
            debug!(connection_id = %connection_id, "Close for unknown connection");
            return;
        };
        let subject = connection.identity.id.clone();

        for room in self.rooms.rooms_of(connection_id) {
            if let Some(label) = self.leave_notices.label_for(&room) {
                self.dispatcher.broadcast_to_room(
                    &room,
                    label,
                    json!({ "userId": subject, "room": room }),
                    Some(connection_id),
                    &self.connections,
                    &self.rooms,
                );
            }
            self.rooms.leave(connection_id, &room);
        }

        self.connections.remove_connection(connection_id);

        info!(
            connection_id = %connection_id,
            subject = %subject,
            connections = self.connections.len(),
            "Connection closed"
        );
    }

    fn inbound(&mut self, connection_id: ConnectionId, text: &str) {
        if !self.connections.contains(connection_id) {
            debug!(connection_id = %connection_id, "Message from unregistered connection");
            return;
        }

        match ClientMessage::parse(text) {
            Ok(ClientMessage::JoinCollections(slugs)) => {
                for slug in slugs {
                    self.join_room(connection_id, &collection_room(&slug));
                }
            }
            Ok(ClientMessage::LeaveCollections(slugs)) => {
                for slug in slugs {
                    self.rooms.leave(connection_id, &collection_room(&slug));
                }
            }
            Ok(ClientMessage::Custom { label, data }) => {
                match self.handlers.get(&label) {
                    Some(handler) => self.run_handler(connection_id, label, handler, data),
                    None => debug!(
                        connection_id = %connection_id,
                        label = %label,
                        "No handler registered for label"
                    ),
                }
            }
            Err(e) => warn!(
                connection_id = %connection_id,
                error = %e,
                "Failed to parse inbound message"
            ),
        }
    }

    fn run_handler(
        &self,
        connection_id: ConnectionId,
        label: String,
        handler: Arc<dyn MessageHandler>,
        data: Value,
    ) {
        let (Some(hub), Some(info)) = (self.handle(), self.info(connection_id)) else {
            return;
        };

        tokio::spawn(async move {
            if let Err(e) = handler.handle(hub, info, data).await {
                warn!(
                    connection_id = %connection_id,
                    label = %label,
                    error = %e,
                    "Custom handler failed"
                );
            }
        });
    }

    fn join_room(&mut self, connection_id: ConnectionId, room: &str) {
        if !self.connections.contains(connection_id) {
            debug!(
                connection_id = %connection_id,
                room = %room,
                "Join for unregistered connection"
            );
            return;
        }
        self.rooms.join(connection_id, room);
    }

    fn emit_event(&mut self, event: ChangeEvent) {
        self.dispatcher
            .emit_event(event, &self.connections, &self.rooms);
    }

    fn relay_inbound(&mut self, envelope: RelayEnvelope) {
        if envelope.origin.is_some() && envelope.origin.as_deref() == self.dispatcher.origin() {
            debug!(room = %envelope.room, "Skipping relay envelope from this instance");
            return;
        }

        let Some(data) = envelope.payload() else {
            warn!(room = %envelope.room, "Relay envelope without payload");
            return;
        };

        match envelope.kind {
            RelayKind::Event => match serde_json::from_value::<ChangeEvent>(data.clone()) {
                Ok(event) => {
                    let delivered = self.dispatcher.deliver_event(
                        &envelope.room,
                        &envelope.label,
                        &event,
                        data,
                        &self.connections,
                        &self.rooms,
                    );
                    debug!(room = %envelope.room, delivered, "Relayed event delivered");
                }
                Err(e) => warn!(room = %envelope.room, error = %e, "Malformed relayed event"),
            },
            RelayKind::RoomBroadcast => {
                self.dispatcher.broadcast_local(
                    &envelope.room,
                    &envelope.label,
                    data,
                    None,
                    &self.connections,
                    &self.rooms,
                );
            }
            RelayKind::Unknown => {
                debug!(room = %envelope.room, "Ignoring relay envelope of unknown kind");
            }
        }
    }

    fn info(&self, connection_id: ConnectionId) -> Option<ConnectionInfo> {
        self.connections.get(connection_id).map(|connection| ConnectionInfo {
            id: connection.id,
            identity: connection.identity.clone(),
            rooms: self.rooms.rooms_of(connection_id),
            connected_at: connection.connected_at,
        })
    }

    fn answer(&self, query: HubQuery) {
        // A dropped receiver means the caller stopped waiting
        match query {
            HubQuery::RoomMembers { room, reply } => {
                let _ = reply.send(self.rooms.members_of(&room));
            }
            HubQuery::Rooms(reply) => {
                let _ = reply.send(self.rooms.room_names());
            }
            HubQuery::Connection {
                connection_id,
                reply,
            } => {
                let _ = reply.send(self.info(connection_id));
            }
            HubQuery::ConnectionCount(reply) => {
                let _ = reply.send(self.connections.len());
            }
        }
    }
}
