use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::connection_manager::Connection;
use super::gateway::{AbortSignal, GatewayError, HandshakeOutcome};
use super::socket::SocketSession;
use crate::hub::HubHandle;
use crate::session::Identity;
use crate::shared::{AppError, AppState, ConnectionId};

/// Query parameters of the upgrade request
#[derive(Debug, Default, Deserialize)]
pub struct HandshakeQuery {
    pub token: Option<String>,
}

/// WebSocket endpoint, authenticated by a token in the query string
/// GET /ws?token=<jwt>
///
/// The upgrade fields are extracted before any await and carried through the
/// identity lookup. Authentication failures are answered with 401 even when
/// the request is not a valid upgrade.
pub async fn websocket_handler(
    Query(query): Query<HandshakeQuery>,
    State(app_state): State<AppState>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, AppError> {
    let Some(token) = query.token.filter(|t| !t.is_empty()) else {
        warn!("Missing authentication token");
        return Err(GatewayError::MissingToken.into());
    };

    debug!("WebSocket connection requested");

    // The signal is private to this future and only the guard trips it, which
    // happens when axum drops the future because the client went away. No
    // response is written in that case.
    let abort = AbortSignal::new();
    let guard = abort.guard();
    let outcome = app_state.gateway.authenticate(Some(&token), &abort).await;
    guard.disarm();

    let identity = match outcome? {
        HandshakeOutcome::Accepted(identity) => identity,
        // Never observed here while a client is listening, see above
        HandshakeOutcome::Aborted => {
            debug!("Handshake aborted");
            return Ok(StatusCode::NO_CONTENT.into_response());
        }
    };

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => {
            warn!(
                subject = %identity.id,
                error = %rejection,
                "Authenticated request is not a WebSocket upgrade"
            );
            return Ok(rejection.into_response());
        }
    };

    let hub = app_state.hub.clone();
    Ok(ws
        .on_failed_upgrade(|e| warn!(error = %e, "WebSocket upgrade failed"))
        .on_upgrade(move |socket| run_connection(socket, identity, hub)))
}

/// Drives one upgraded connection from "open" to "close"
async fn run_connection(socket: WebSocket, identity: Identity, hub: HubHandle) {
    let connection_id = ConnectionId::new();

    // Create the outbound channel (hub -> client)
    let (outbound_sender, outbound_receiver) = mpsc::unbounded_channel::<String>();

    let connection = Connection::new(connection_id, identity.clone(), outbound_sender);
    // Client frames are pumped only after the connect hook has finished
    if hub.open(connection).await.is_err() {
        warn!(connection_id = %connection_id, "Hub refused the connection");
        hub.close(connection_id);
        return;
    }

    info!(
        connection_id = %connection_id,
        subject = %identity.id,
        collection = %identity.collection,
        "WebSocket connection established"
    );

    let session = SocketSession::new(
        connection_id,
        Box::new(socket),
        outbound_receiver,
        hub.clone(),
    );
    match session.run().await {
        Ok(()) => {
            info!(connection_id = %connection_id, "WebSocket connection closed cleanly");
        }
        Err(e) => {
            warn!(connection_id = %connection_id, error = %e, "WebSocket connection error");
        }
    }

    hub.close(connection_id);
}
