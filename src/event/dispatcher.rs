use serde_json::Value;
use tracing::{debug, error, warn};

use super::events::ChangeEvent;
use super::policy::{Audience, DispatchPolicy};
use crate::relay::{RelayKind, RelayPublisher};
use crate::room::{collection_room, RoomRegistry};
use crate::shared::ConnectionId;
use crate::websockets::{ConnectionManager, WebSocketMessage, LABEL_EVENT, LABEL_EVENT_ALL};

/// Fans events out to local connections and forwards them to the relay.
///
/// Every method works on borrowed hub state; the hub is the only caller, so a
/// fan-out always sees one consistent snapshot of connections and rooms.
pub struct EventDispatcher {
    policy: DispatchPolicy,
    relay: Option<RelayPublisher>,
}

impl EventDispatcher {
    pub fn new(policy: DispatchPolicy, relay: Option<RelayPublisher>) -> Self {
        Self { policy, relay }
    }

    /// Instance id stamped on outgoing relay envelopes, if relaying
    pub fn origin(&self) -> Option<&str> {
        self.relay.as_ref().map(|relay| relay.origin())
    }

    /// Filters, transforms, delivers to the collection room and the global feed, then relays
    pub fn emit_event(
        &self,
        event: ChangeEvent,
        connections: &ConnectionManager,
        rooms: &RoomRegistry,
    ) {
        let Some(event) = self.policy.prepare(event) else {
            debug!("Event dropped by dispatch policy");
            return;
        };

        let data = match serde_json::to_value(&event) {
            Ok(data) => data,
            Err(e) => {
                error!(error = %e, "Failed to serialize event");
                return;
            }
        };

        let room = collection_room(&event.collection);
        let delivered = self.deliver_event(&room, LABEL_EVENT, &event, &data, connections, rooms);
        let fed = self.broadcast_all(LABEL_EVENT_ALL, &data, connections);

        debug!(
            room = %room,
            kind = %event.kind,
            id = %event.id,
            delivered,
            fed,
            "Event emitted"
        );

        if let Some(relay) = &self.relay {
            relay.publish(RelayKind::Event, &room, LABEL_EVENT, data);
        }
    }

    /// Delivers an event to the members of `room` permitted by the authorization policy.
    /// Local only.
    pub fn deliver_event(
        &self,
        room: &str,
        label: &str,
        event: &ChangeEvent,
        data: &Value,
        connections: &ConnectionManager,
        rooms: &RoomRegistry,
    ) -> usize {
        let audience = self.policy.audience(&event.collection);
        if matches!(audience, Audience::Nobody) {
            debug!(
                room = %room,
                collection = %event.collection,
                "No authorization rule for collection"
            );
            return 0;
        }

        let Some(text) = serialize(label, data) else {
            return 0;
        };

        let mut delivered = 0;
        for id in rooms.members_of(room) {
            let Some(connection) = connections.get(id) else {
                continue;
            };

            if let Audience::Gated(predicate) = &audience {
                if !predicate(&connection.identity, event) {
                    continue;
                }
            }

            match connection.send(text.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => warn!(connection_id = %id, error = %e, "Failed to deliver event"),
            }
        }

        delivered
    }

    /// Delivers to every member of `room` except `exclude`, then relays
    pub fn broadcast_to_room(
        &self,
        room: &str,
        label: &str,
        data: Value,
        exclude: Option<ConnectionId>,
        connections: &ConnectionManager,
        rooms: &RoomRegistry,
    ) -> usize {
        let delivered = self.broadcast_local(room, label, &data, exclude, connections, rooms);

        if let Some(relay) = &self.relay {
            relay.publish(RelayKind::RoomBroadcast, room, label, data);
        }

        delivered
    }

    /// Delivers to every member of `room` except `exclude`. Never relays.
    pub fn broadcast_local(
        &self,
        room: &str,
        label: &str,
        data: &Value,
        exclude: Option<ConnectionId>,
        connections: &ConnectionManager,
        rooms: &RoomRegistry,
    ) -> usize {
        let Some(text) = serialize(label, data) else {
            return 0;
        };

        let mut delivered = 0;
        for id in rooms.members_of(room) {
            if Some(id) == exclude {
                continue;
            }
            match connections.send_to(id, &text) {
                Ok(()) => delivered += 1,
                Err(e) => warn!(
                    connection_id = %id,
                    room = %room,
                    error = %e,
                    "Failed to deliver room broadcast"
                ),
            }
        }

        debug!(room = %room, label = %label, delivered, "Room broadcast delivered");
        delivered
    }

    /// Delivers to every registered connection
    fn broadcast_all(&self, label: &str, data: &Value, connections: &ConnectionManager) -> usize {
        let Some(text) = serialize(label, data) else {
            return 0;
        };

        let mut delivered = 0;
        for connection in connections.iter() {
            match connection.send(text.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => warn!(
                    connection_id = %connection.id,
                    error = %e,
                    "Failed to deliver to global feed"
                ),
            }
        }
        delivered
    }

    /// Sends one message to one connection; failures are logged, not raised
    pub fn send_to_socket(
        &self,
        id: ConnectionId,
        label: &str,
        data: &Value,
        connections: &ConnectionManager,
    ) -> bool {
        let Some(text) = serialize(label, data) else {
            return false;
        };

        match connections.send_to(id, &text) {
            Ok(()) => true,
            Err(e) => {
                warn!(connection_id = %id, label = %label, error = %e, "Failed to send message");
                false
            }
        }
    }
}

fn serialize(label: &str, data: &Value) -> Option<String> {
    match WebSocketMessage::new(label, data.clone()).to_json() {
        Ok(text) => Some(text),
        Err(e) => {
            error!(label = %label, error = %e, "Failed to serialize outbound message");
            None
        }
    }
}
