// The hub: single owner of connection, room and handler state
//
// Socket tasks, the relay bridge, custom handlers and the host all talk to the
// hub through `HubHandle`, which queues calls onto one task.

// Public API - what other modules can use
pub use config::HubConfig;
pub use handle::{HubClosed, HubHandle};
pub use runtime::Hub;

// Internal modules
mod config;
mod handle;
mod runtime;
