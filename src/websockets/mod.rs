// Public API
pub use connection_manager::{Connection, ConnectionInfo, ConnectionManager, SendError};
pub use custom_handlers::{ConnectHook, HandlerError, HandlerRegistry, MessageHandler};
pub use gateway::{
    AbortGuard, AbortSignal, Gateway, GatewayError, HandshakeOutcome, REASON_INVALID_TOKEN,
    REASON_TOKEN_REQUIRED, REASON_USER_NOT_FOUND,
};
pub use handler::{websocket_handler, HandshakeQuery};
pub use messages::{
    ClientMessage, MessageError, WebSocketMessage, LABEL_EVENT, LABEL_EVENT_ALL,
    LABEL_JOIN_COLLECTION, LABEL_SUBSCRIBE, LABEL_UNSUBSCRIBE, RESERVED_LABELS,
};
pub use socket::{SocketError, SocketSession, SocketWrapper};

// Internal modules
mod connection_manager;
mod custom_handlers;
mod gateway;
mod handler;
mod messages;
mod socket;
