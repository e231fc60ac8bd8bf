use futures::StreamExt;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use super::backoff::Backoff;
use super::envelope::RelayEnvelope;
use super::RelayError;
use crate::hub::{HubClosed, HubHandle};

/// Cross-instance relay over redis pub/sub.
///
/// Publishing and subscribing use independent connections. Both reconnect with
/// [`Backoff`] and never take local delivery down with them.
pub struct RelayBridge {
    client: Client,
    channel: String,
    backoff: Backoff,
}

/// Background tasks of a running bridge
pub struct RelayTasks {
    pub publisher: JoinHandle<()>,
    pub subscriber: JoinHandle<()>,
}

impl RelayTasks {
    pub fn abort(&self) {
        self.publisher.abort();
        self.subscriber.abort();
    }
}

impl RelayBridge {
    /// Validates the broker URL; no connection is made until [`RelayBridge::start`]
    pub fn new(
        redis_url: &str,
        channel: impl Into<String>,
        backoff: Backoff,
    ) -> Result<Self, RelayError> {
        Ok(Self {
            client: Client::open(redis_url)?,
            channel: channel.into(),
            backoff,
        })
    }

    pub fn start(self, outbound: mpsc::Receiver<RelayEnvelope>, hub: HubHandle) -> RelayTasks {
        info!(channel = %self.channel, "Starting relay bridge");

        let publisher = tokio::spawn(run_publisher(
            self.client.clone(),
            self.channel.clone(),
            self.backoff,
            outbound,
        ));
        let subscriber = tokio::spawn(run_subscriber(self.client, self.channel, self.backoff, hub));

        RelayTasks {
            publisher,
            subscriber,
        }
    }
}

async fn connect_publisher(client: &Client, backoff: Backoff) -> ConnectionManager {
    let mut attempt: u32 = 0;
    loop {
        match ConnectionManager::new(client.clone()).await {
            Ok(connection) => {
                info!(attempts = attempt + 1, "Relay publisher connected");
                return connection;
            }
            Err(e) => {
                attempt = attempt.saturating_add(1);
                let delay = backoff.delay(attempt);
                error!(
                    error = %e,
                    attempt,
                    retry_in_ms = delay.as_millis() as u64,
                    "Relay publisher connection failed"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[instrument(skip(client, backoff, outbound))]
async fn run_publisher(
    client: Client,
    channel: String,
    backoff: Backoff,
    mut outbound: mpsc::Receiver<RelayEnvelope>,
) {
    let mut connection = connect_publisher(&client, backoff).await;

    while let Some(envelope) = outbound.recv().await {
        let payload = match encode_envelope(&envelope) {
            Ok(payload) => payload,
            Err(e) => {
                error!(error = %e, room = %envelope.room, "Failed to serialize relay envelope");
                continue;
            }
        };

        // The connection manager reconnects on its own; a failed publish is simply lost
        match connection.publish::<_, _, usize>(&channel, payload).await {
            Ok(receivers) => debug!(room = %envelope.room, receivers, "Relay envelope published"),
            Err(e) => warn!(room = %envelope.room, error = %e, "Relay publish failed"),
        }
    }

    info!("Relay publisher stopped: hub queue closed");
}

#[instrument(skip(client, backoff, hub))]
async fn run_subscriber(client: Client, channel: String, backoff: Backoff, hub: HubHandle) {
    let mut attempt: u32 = 0;

    loop {
        match subscribe_once(&client, &channel, &hub, &mut attempt).await {
            Ok(SubscriptionEnd::HubClosed) => {
                info!("Relay subscriber stopped: hub closed");
                return;
            }
            Ok(SubscriptionEnd::StreamEnded) => {
                warn!("Relay subscription ended");
            }
            Err(e) => {
                error!(error = %e, "Relay subscription failed");
            }
        }

        attempt = attempt.saturating_add(1);
        let delay = backoff.delay(attempt);
        debug!(attempt, retry_in_ms = delay.as_millis() as u64, "Resubscribing to relay channel");
        tokio::time::sleep(delay).await;
    }
}

enum SubscriptionEnd {
    StreamEnded,
    HubClosed,
}

async fn subscribe_once(
    client: &Client,
    channel: &str,
    hub: &HubHandle,
    attempt: &mut u32,
) -> Result<SubscriptionEnd, RelayError> {
    let mut pubsub = client.get_async_pubsub().await?;
    pubsub.subscribe(channel).await?;

    info!(channel = %channel, "Subscribed to relay channel");
    *attempt = 0;

    let mut stream = pubsub.on_message();
    while let Some(msg) = stream.next().await {
        let payload = match msg.get_payload::<String>() {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "Failed to read relay payload");
                continue;
            }
        };

        if forward_payload(&payload, hub).is_err() {
            return Ok(SubscriptionEnd::HubClosed);
        }
    }

    Ok(SubscriptionEnd::StreamEnded)
}

fn encode_envelope(envelope: &RelayEnvelope) -> Result<String, RelayError> {
    Ok(serde_json::to_string(envelope)?)
}

fn decode_payload(payload: &str) -> Result<RelayEnvelope, RelayError> {
    Ok(serde_json::from_str(payload)?)
}

/// Hands one channel message to the hub. Undecodable payloads are skipped;
/// only a stopped hub is an error.
fn forward_payload(payload: &str, hub: &HubHandle) -> Result<(), HubClosed> {
    match decode_payload(payload) {
        Ok(envelope) => hub.relay_inbound(envelope),
        Err(e) => {
            warn!(error = %e, payload = %payload, "Failed to deserialize relay envelope");
            Ok(())
        }
    }
}
