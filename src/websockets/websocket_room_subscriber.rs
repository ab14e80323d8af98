use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::{connection_manager::ConnectionManager, messages::WebSocketMessage};
use crate::event::{RoomEventError, RoomEventHandler, SequencedEvent};

/// Pushes every room event to the sockets open in that room
pub struct WebSocketRoomSubscriber {
    connection_manager: Arc<dyn ConnectionManager>,
}

impl WebSocketRoomSubscriber {
    pub fn new(connection_manager: Arc<dyn ConnectionManager>) -> Self {
        Self { connection_manager }
    }
}

#[async_trait]
impl RoomEventHandler for WebSocketRoomSubscriber {
    async fn handle_room_event(&self, event: &SequencedEvent) -> Result<(), RoomEventError> {
        let message = WebSocketMessage::from_event(event)
            .and_then(|message| message.to_json())
            .map_err(|e| RoomEventError::Serialization(e.to_string()))?;

        debug!(
            room_id = %event.room_id,
            seq = event.seq,
            event_type = event.event.event_type(),
            "Pushing room event to sockets"
        );
        self.connection_manager
            .send_to_room(&event.room_id, &message)
            .await;
        Ok(())
    }

    fn handler_name(&self) -> &'static str {
        "WebSocketRoomSubscriber"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::RoomEvent;
    use crate::room::{models::MembershipModel, types::MemberResponse};
    use crate::websockets::InMemoryConnectionManager;
    use chrono::Utc;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_event_reaches_room_sockets() {
        let manager = Arc::new(InMemoryConnectionManager::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        manager.add_connection("room-1", "acc-2", tx).await;

        let subscriber = WebSocketRoomSubscriber::new(manager);
        let member = MemberResponse::new(
            &MembershipModel::listener("acc-1".to_string(), "room-1".to_string()),
            None,
        );
        let event = SequencedEvent {
            room_id: "room-1".to_string(),
            seq: 4,
            timestamp: Utc::now(),
            event: RoomEvent::UserStartedSpeaking { member },
        };

        subscriber.handle_room_event(&event).await.unwrap();

        let pushed: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(pushed["type"], "user_started_speaking");
        assert_eq!(pushed["payload"]["user_id"], "acc-1");
        assert_eq!(pushed["meta"]["seq"], 4);
    }
}
