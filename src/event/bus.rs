use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

use super::events::{RoomEvent, SequencedEvent};

#[derive(Debug)]
struct RoomChannel {
    sender: broadcast::Sender<SequencedEvent>,
    last_seq: u64,
}

impl RoomChannel {
    fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            last_seq: 0,
        }
    }
}

/// Per-room broadcast channels with a sequence counter each
#[derive(Debug, Clone)]
pub struct EventBus {
    capacity: usize,
    /// Room-specific event channels: room_id -> channel
    room_channels: Arc<RwLock<HashMap<String, RoomChannel>>>,
}

impl EventBus {
    /// `capacity` is the number of events buffered per room before slow receivers lag
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            room_channels: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Stamps the event with the room's next sequence number and broadcasts it.
    /// Returns the assigned sequence number.
    pub async fn emit_to_room(&self, room_id: &str, event: RoomEvent) -> u64 {
        let mut room_channels = self.room_channels.write().await;
        let channel = room_channels
            .entry(room_id.to_string())
            .or_insert_with(|| RoomChannel::new(self.capacity));

        channel.last_seq += 1;
        let seq = channel.last_seq;
        let event_type = event.event_type();

        let sequenced = SequencedEvent {
            room_id: room_id.to_string(),
            seq,
            timestamp: Utc::now(),
            event,
        };

        match channel.sender.send(sequenced) {
            Ok(receiver_count) => {
                debug!(
                    room_id = %room_id,
                    seq,
                    event_type,
                    receivers = receiver_count,
                    "Room event emitted"
                );
            }
            Err(_) => {
                debug!(room_id = %room_id, seq, event_type, "Room event emitted with no receivers");
            }
        }

        seq
    }

    /// Subscribe to events for a specific room
    pub async fn subscribe_to_room(&self, room_id: &str) -> broadcast::Receiver<SequencedEvent> {
        if let Some(channel) = self.room_channels.read().await.get(room_id) {
            return channel.sender.subscribe();
        }

        debug!(room_id = %room_id, "Creating new room channel for subscription");
        let mut room_channels = self.room_channels.write().await;
        room_channels
            .entry(room_id.to_string())
            .or_insert_with(|| RoomChannel::new(self.capacity))
            .sender
            .subscribe()
    }

    /// Drops the room's channel. Subscribers see the stream end once they
    /// have drained what was already sent.
    pub async fn close_room(&self, room_id: &str) -> bool {
        let closed = self.room_channels.write().await.remove(room_id).is_some();
        if closed {
            debug!(room_id = %room_id, "Room channel closed");
        }
        closed
    }

    /// Rooms that currently have a channel
    pub async fn room_ids(&self) -> Vec<String> {
        self.room_channels.read().await.keys().cloned().collect()
    }

    /// Sequence number of the last event emitted to the room, 0 if none
    pub async fn last_seq(&self, room_id: &str) -> u64 {
        self.room_channels
            .read()
            .await
            .get(room_id)
            .map(|channel| channel.last_seq)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn members_updated() -> RoomEvent {
        RoomEvent::MembersUpdated { members: vec![] }
    }

    #[tokio::test]
    async fn test_sequence_numbers_are_per_room_and_monotonic() {
        let bus = EventBus::new(16);

        assert_eq!(bus.emit_to_room("a", members_updated()).await, 1);
        assert_eq!(bus.emit_to_room("a", members_updated()).await, 2);
        assert_eq!(bus.emit_to_room("b", members_updated()).await, 1);
        assert_eq!(bus.emit_to_room("a", members_updated()).await, 3);

        assert_eq!(bus.last_seq("a").await, 3);
        assert_eq!(bus.last_seq("b").await, 1);
        assert_eq!(bus.last_seq("c").await, 0);
    }

    #[tokio::test]
    async fn test_subscribers_receive_events_in_order() {
        let bus = EventBus::new(16);
        let mut receiver = bus.subscribe_to_room("room").await;

        bus.emit_to_room("room", members_updated()).await;
        bus.emit_to_room("other", members_updated()).await;
        bus.emit_to_room("room", members_updated()).await;

        let first = receiver.recv().await.unwrap();
        let second = receiver.recv().await.unwrap();
        assert_eq!((first.seq, second.seq), (1, 2));
        assert_eq!(first.room_id, "room");
        assert!(receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_slow_subscriber_lags() {
        let bus = EventBus::new(2);
        let mut receiver = bus.subscribe_to_room("room").await;

        for _ in 0..5 {
            bus.emit_to_room("room", members_updated()).await;
        }

        assert!(matches!(
            receiver.recv().await,
            Err(broadcast::error::RecvError::Lagged(3))
        ));
        assert_eq!(receiver.recv().await.unwrap().seq, 4);
    }

    #[tokio::test]
    async fn test_close_room_ends_the_stream() {
        let bus = EventBus::new(16);
        let mut receiver = bus.subscribe_to_room("room").await;
        bus.emit_to_room("room", members_updated()).await;

        assert!(bus.close_room("room").await);
        assert!(!bus.close_room("room").await);
        assert!(bus.room_ids().await.is_empty());

        assert_eq!(receiver.recv().await.unwrap().seq, 1);
        assert!(matches!(
            receiver.recv().await,
            Err(broadcast::error::RecvError::Closed)
        ));
        assert_eq!(bus.last_seq("room").await, 0);
    }
}
