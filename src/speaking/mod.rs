// Public API - what other modules can use
pub use handlers::{
    approve_speaking, list_speaking_requests, mute_member, reject_speaking, request_to_speak,
    revoke_speaking, start_speaking, stop_speaking, unmute_member,
};

// Internal modules
mod handlers;
pub mod models;
pub mod repository;
pub mod service;
pub mod types;
