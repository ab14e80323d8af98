// Public API - what other modules can use
pub use handlers::{create_invite, list_invites};

// Internal modules
pub mod generator;
mod handlers;
pub mod models;
pub mod repository;
pub mod service;
pub mod types;
