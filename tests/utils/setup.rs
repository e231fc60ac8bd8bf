#![allow(dead_code)] // Test utilities may not all be used in every test

use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use roomcast::{
    hub::{Hub, HubConfig, HubHandle},
    relay::{RelayEnvelope, RelayPublisher},
    session::Identity,
    shared::ConnectionId,
    websockets::Connection,
};

// ============================================================================
// Test Setup Infrastructure
// ============================================================================

/// One simulated client: its registered id and the outbound side of its transport
pub struct TestClient {
    pub id: ConnectionId,
    pub identity: Identity,
    pub outbound: mpsc::UnboundedReceiver<String>,
}

pub struct TestSetup {
    pub hub: HubHandle,
    pub clients: HashMap<String, TestClient>,
    /// Envelopes the hub queued for the relay, when built with a relay
    pub relay: Option<mpsc::Receiver<RelayEnvelope>>,
    pub _hub_task: JoinHandle<()>,
}

pub struct TestSetupBuilder {
    config: HubConfig,
    relay_origin: Option<String>,
    clients: Vec<(String, Identity)>,
}

impl TestSetupBuilder {
    pub fn new() -> Self {
        Self {
            config: HubConfig::new(),
            relay_origin: None,
            clients: vec![],
        }
    }

    pub fn with_config(mut self, config: HubConfig) -> Self {
        self.config = config;
        self
    }

    /// Wires a relay queue stamped with `origin`
    pub fn with_relay(mut self, origin: &str) -> Self {
        self.relay_origin = Some(origin.to_string());
        self
    }

    pub fn with_client(mut self, name: &str, identity: Identity) -> Self {
        self.clients.push((name.to_string(), identity));
        self
    }

    /// Clients named after their subject ids, all from the "users" collection
    pub fn with_users(mut self, names: Vec<&str>) -> Self {
        for name in names {
            self.clients
                .push((name.to_string(), Identity::new(name, "users")));
        }
        self
    }

    pub async fn build(self) -> TestSetup {
        let (publisher, relay) = match self.relay_origin {
            Some(origin) => {
                let (publisher, receiver) = RelayPublisher::channel(origin, 64);
                (Some(publisher), Some(receiver))
            }
            None => (None, None),
        };

        let (hub, hub_task) = Hub::spawn(self.config, publisher);

        let mut setup = TestSetup {
            hub,
            clients: HashMap::new(),
            relay,
            _hub_task: hub_task,
        };

        for (name, identity) in self.clients {
            setup.connect(&name, identity).await;
        }

        setup
    }
}

impl TestSetup {
    /// Completes a handshake for `name` and waits until the hub registered it
    pub async fn connect(&mut self, name: &str, identity: Identity) -> ConnectionId {
        let id = ConnectionId::new();
        let (sender, outbound) = mpsc::unbounded_channel();

        self.hub
            .open(Connection::new(id, identity.clone(), sender))
            .await
            .unwrap();
        self.settle().await;

        self.clients.insert(
            name.to_string(),
            TestClient {
                id,
                identity,
                outbound,
            },
        );
        id
    }

    pub fn id_of(&self, name: &str) -> ConnectionId {
        self.client(name).id
    }

    pub fn client(&self, name: &str) -> &TestClient {
        self.clients
            .get(name)
            .unwrap_or_else(|| panic!("no client named {name}"))
    }

    pub fn client_mut(&mut self, name: &str) -> &mut TestClient {
        self.clients
            .get_mut(name)
            .unwrap_or_else(|| panic!("no client named {name}"))
    }

    /// Sends a raw text frame from `name`
    pub async fn send_raw(&self, name: &str, text: &str) {
        self.hub
            .inbound(self.id_of(name), text.to_string())
            .unwrap();
        self.settle().await;
    }

    /// Sends `{type: label, data}` from `name`
    pub async fn send(&self, name: &str, label: &str, data: Value) {
        let frame = json!({ "type": label, "data": data }).to_string();
        self.send_raw(name, &frame).await;
    }

    pub async fn join_collection(&self, name: &str, slug: &str) {
        self.send(name, "join-collection", json!(slug)).await;
    }

    /// Transport close for `name`; the client's outbound queue stays readable
    pub async fn disconnect(&self, name: &str) {
        self.hub.close(self.id_of(name));
        self.settle().await;
    }

    /// Waits for every command queued so far to be applied
    pub async fn settle(&self) {
        self.hub.connection_count().await.unwrap();
    }

    /// Waits for spawned handler tasks and the commands they queue
    pub async fn settle_tasks(&self) {
        for _ in 0..5 {
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.settle().await;
        }
    }

    /// Envelopes queued for the relay so far
    pub fn relayed(&mut self) -> Vec<RelayEnvelope> {
        let mut envelopes = vec![];
        if let Some(relay) = self.relay.as_mut() {
            while let Ok(envelope) = relay.try_recv() {
                envelopes.push(envelope);
            }
        }
        envelopes
    }
}
