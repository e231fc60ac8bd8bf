// Library crate for the roomcast realtime broadcast service
// This file exposes the public API for embedding hosts and integration tests

pub mod config;
pub mod event;
pub mod hub;
pub mod relay;
pub mod room;
pub mod session;
pub mod shared;
pub mod websockets;

use axum::{routing::get, Router};

// Re-export commonly used types for easier access in tests
pub use config::RealtimeConfig;
pub use event::{ChangeEvent, DispatchPolicy, EventKind};
pub use hub::{Hub, HubClosed, HubConfig, HubHandle};
pub use relay::{RelayBridge, RelayEnvelope, RelayKind, RelayPublisher};
pub use room::{collection_room, LeaveNoticePolicy};
pub use session::{Identity, IdentityResolver, TokenConfig};
pub use shared::{AppError, AppState, ConnectionId};
pub use websockets::{
    websocket_handler, ConnectHook, Gateway, HandlerError, MessageHandler, WebSocketMessage,
};

/// HTTP routes: `/ws` for upgrades, `/health` for liveness
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/ws", get(websocket_handler))
        .with_state(state)
}
