// Public API - what other modules can use
pub use cleanup_task::{start_session_purge_task, DEFAULT_PURGE_INTERVAL};
pub use extractor::bearer_token;
pub use handlers::{login, logout};
pub use types::SessionClaims;

// Internal modules
mod cleanup_task;
mod extractor;
mod handlers;
pub mod models;
pub mod repository;
pub mod service;
pub mod token;
mod types;
