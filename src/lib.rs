// Library crate for the audio room server
// This file exposes the public API for integration tests

pub mod account;
pub mod config;
pub mod db;
pub mod event;
pub mod invite;
pub mod room;
pub mod routes;
pub mod session;
pub mod shared;
pub mod speaking;
pub mod telephony;
pub mod websockets;

// Re-export commonly used types for easier access in tests
pub use config::AppConfig;
pub use event::{EventBus, RoomEvent, RoomSubscription, SequencedEvent};
pub use room::{errors::RoomError, models::RoomModel, repository::RoomRepository};
pub use routes::build_router;
pub use shared::{AppError, AppState, Stores};
pub use websockets::{
    ConnectionManager, MessageHandler, MessageType, WebSocketMessage, WebSocketRoomSubscriber,
    WebsocketReceiveHandler,
};
