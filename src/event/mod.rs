// Room event stream: services emit, subscriptions forward to handlers

// Public API - what other modules can use
pub use bus::EventBus;
pub use events::{RoomEvent, SequencedEvent};
pub use room_handler::{RoomEventError, RoomEventHandler};
pub use room_subscription::{RoomSubscription, RoomSubscriptions};

// Internal modules
mod bus;
mod events;
mod room_handler;
mod room_subscription;
