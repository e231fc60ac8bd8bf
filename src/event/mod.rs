// Change events and their delivery
//
// The dispatcher applies the dispatch policy (filter, transform, allow-list,
// per-recipient authorization) and fans events out to local connections.

// Public API - what other modules can use
pub use dispatcher::EventDispatcher;
pub use events::{ChangeEvent, EventKind};
pub use policy::{Audience, AuthorizePredicate, DispatchPolicy, EventFilter, EventTransform};

// Internal modules
mod dispatcher;
mod events;
mod policy;
