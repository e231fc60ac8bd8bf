// Public API - what other modules can use
pub use naming::{
    collection_room, LeaveNotice, LeaveNoticePolicy, COLLECTION_ROOM_PREFIX, DEFAULT_LEAVE_LABEL,
};
pub use registry::{LeaveRoomResult, RoomRegistry};

// Internal modules
mod naming;
mod registry;
