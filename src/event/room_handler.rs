use async_trait::async_trait;
use thiserror::Error;

use super::events::SequencedEvent;

/// Errors that can occur when handling room events
#[derive(Debug, Error)]
pub enum RoomEventError {
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Handler error: {0}")]
    HandlerError(String),
}

/// Consumer of a room's event stream
#[async_trait]
pub trait RoomEventHandler: Send + Sync {
    async fn handle_room_event(&self, event: &SequencedEvent) -> Result<(), RoomEventError>;

    /// Get a human-readable name for this handler (for logging/debugging)
    fn handler_name(&self) -> &'static str;
}
