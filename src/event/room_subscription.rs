use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tokio::sync::{broadcast::error::RecvError, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{bus::EventBus, room_handler::RoomEventHandler};

/// Forwards one room's events to a handler
pub struct RoomSubscription {
    room_id: String,
    handler: Arc<dyn RoomEventHandler>,
    event_bus: EventBus,
}

impl RoomSubscription {
    pub fn new(room_id: String, handler: Arc<dyn RoomEventHandler>, event_bus: EventBus) -> Self {
        Self {
            room_id,
            handler,
            event_bus,
        }
    }

    /// Subscribes before returning, so no event emitted afterwards is missed.
    /// The spawned task runs until the room's channel closes.
    pub async fn start(self) -> JoinHandle<()> {
        let room_id = self.room_id.clone();
        let handler_name = self.handler.handler_name();

        info!(
            room_id = %room_id,
            handler = handler_name,
            "Starting room subscription"
        );

        let mut receiver = self.event_bus.subscribe_to_room(&room_id).await;

        tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => {
                        debug!(
                            room_id = %room_id,
                            handler = handler_name,
                            seq = event.seq,
                            event_type = event.event.event_type(),
                            "Received room event"
                        );

                        if let Err(e) = self.handler.handle_room_event(&event).await {
                            warn!(
                                room_id = %room_id,
                                handler = handler_name,
                                seq = event.seq,
                                error = %e,
                                "Room event handler failed"
                            );
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(
                            room_id = %room_id,
                            handler = handler_name,
                            skipped,
                            "Room subscription lagged, events dropped"
                        );
                    }
                    Err(RecvError::Closed) => break,
                }
            }

            info!(
                room_id = %room_id,
                handler = handler_name,
                "Room subscription ended, channel closed"
            );
        })
    }
}

/// Starts at most one subscription per room for a shared handler.
/// A room is forgotten once its subscription ends, so it can be started again.
#[derive(Clone)]
pub struct RoomSubscriptions {
    event_bus: EventBus,
    handler: Arc<dyn RoomEventHandler>,
    // room_id -> generation of the running subscription
    started: Arc<Mutex<HashMap<String, u64>>>,
    next_generation: Arc<AtomicU64>,
}

impl RoomSubscriptions {
    pub fn new(event_bus: EventBus, handler: Arc<dyn RoomEventHandler>) -> Self {
        Self {
            event_bus,
            handler,
            started: Arc::new(Mutex::new(HashMap::new())),
            next_generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Returns true if this call started the room's subscription
    pub async fn ensure_started(&self, room_id: &str) -> bool {
        let mut started = self.started.lock().await;
        if started.contains_key(room_id) {
            return false;
        }

        let subscription = RoomSubscription::new(
            room_id.to_string(),
            Arc::clone(&self.handler),
            self.event_bus.clone(),
        );
        let task = subscription.start().await;
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        started.insert(room_id.to_string(), generation);

        let started = Arc::clone(&self.started);
        let room_id = room_id.to_string();
        tokio::spawn(async move {
            let _ = task.await;
            let mut started = started.lock().await;
            if started.get(&room_id) == Some(&generation) {
                started.remove(&room_id);
            }
        });
        true
    }

    pub async fn is_running(&self, room_id: &str) -> bool {
        self.started.lock().await.contains_key(room_id)
    }
}
