// Public API - what other modules can use
pub use cleanup_task::{start_room_cleanup_task, DEFAULT_RELEASE_INTERVAL};
pub use handlers::{
    conference_info, create_room, get_room, join_room, leave_room, list_members, list_rooms,
};

// Internal modules
mod cleanup_task;
pub mod errors;
mod handlers;
pub mod locks;
pub mod members;
pub mod models;
pub mod permissions;
pub mod repository;
pub mod service;
pub mod types;
