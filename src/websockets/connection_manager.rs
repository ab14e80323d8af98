use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::debug;

/// Outbound channels of the sockets open in each room
#[async_trait]
pub trait ConnectionManager: Send + Sync {
    /// Registers the socket, replacing an earlier one of the same account in the room
    async fn add_connection(
        &self,
        room_id: &str,
        account_id: &str,
        sender: mpsc::UnboundedSender<String>,
    );

    /// Forgets the account's socket once its receiving side has gone away.
    /// A newer socket that replaced it is left registered, and false is
    /// returned while the account still has an open socket in the room.
    async fn remove_connection(&self, room_id: &str, account_id: &str) -> bool;

    /// Drops the account's socket from the room. Its connection ends once the
    /// messages already queued for it are sent.
    async fn disconnect(&self, room_id: &str, account_id: &str);

    async fn send_to_room(&self, room_id: &str, message: &str);
}

type RoomConnections = HashMap<String, mpsc::UnboundedSender<String>>;

pub struct InMemoryConnectionManager {
    // room_id -> account_id -> sender
    connections: Arc<RwLock<HashMap<String, RoomConnections>>>,
}

impl Default for InMemoryConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryConnectionManager {
    pub fn new() -> Self {
        Self {
            connections: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn connection_count(&self, room_id: &str) -> usize {
        self.connections
            .read()
            .await
            .get(room_id)
            .map_or(0, HashMap::len)
    }
}

#[async_trait]
impl ConnectionManager for InMemoryConnectionManager {
    async fn add_connection(
        &self,
        room_id: &str,
        account_id: &str,
        sender: mpsc::UnboundedSender<String>,
    ) {
        let mut connections = self.connections.write().await;
        connections
            .entry(room_id.to_string())
            .or_default()
            .insert(account_id.to_string(), sender);
    }

    async fn remove_connection(&self, room_id: &str, account_id: &str) -> bool {
        let mut connections = self.connections.write().await;
        let Some(room) = connections.get_mut(room_id) else {
            return true;
        };

        let released = match room.get(account_id) {
            Some(sender) if sender.is_closed() => {
                room.remove(account_id);
                true
            }
            Some(_) => false,
            None => true,
        };
        if room.is_empty() {
            connections.remove(room_id);
        }
        released
    }

    async fn disconnect(&self, room_id: &str, account_id: &str) {
        let mut connections = self.connections.write().await;
        let Some(room) = connections.get_mut(room_id) else {
            return;
        };

        if room.remove(account_id).is_some() {
            debug!(room_id = %room_id, account_id = %account_id, "Socket dropped from room");
        }
        if room.is_empty() {
            connections.remove(room_id);
        }
    }

    async fn send_to_room(&self, room_id: &str, message: &str) {
        let connections = self.connections.read().await;
        let Some(room) = connections.get(room_id) else {
            debug!(room_id = %room_id, "No sockets open in room");
            return;
        };

        for (account_id, sender) in room {
            if sender.send(message.to_string()).is_err() {
                debug!(room_id = %room_id, account_id = %account_id, "Socket already closed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_room_fan_out_is_scoped() {
        let manager = InMemoryConnectionManager::new();
        let (a_tx, mut a_rx) = mpsc::unbounded_channel();
        let (b_tx, mut b_rx) = mpsc::unbounded_channel();
        let (c_tx, mut c_rx) = mpsc::unbounded_channel();

        manager.add_connection("room-1", "a", a_tx).await;
        manager.add_connection("room-1", "b", b_tx).await;
        manager.add_connection("room-2", "a", c_tx).await;

        manager.send_to_room("room-1", "hello").await;
        assert_eq!(a_rx.recv().await.unwrap(), "hello");
        assert_eq!(b_rx.recv().await.unwrap(), "hello");
        assert!(c_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_reconnect_survives_removal_of_old_socket() {
        let manager = InMemoryConnectionManager::new();
        let (old_tx, old_rx) = mpsc::unbounded_channel();
        let (new_tx, mut new_rx) = mpsc::unbounded_channel();

        manager.add_connection("room-1", "a", old_tx).await;
        manager.add_connection("room-1", "a", new_tx).await;
        drop(old_rx);

        assert!(!manager.remove_connection("room-1", "a").await);
        assert_eq!(manager.connection_count("room-1").await, 1);
        manager.send_to_room("room-1", "still here").await;
        assert_eq!(new_rx.recv().await.unwrap(), "still here");

        drop(new_rx);
        assert!(manager.remove_connection("room-1", "a").await);
        assert_eq!(manager.connection_count("room-1").await, 0);
    }

    #[tokio::test]
    async fn test_disconnect_ends_the_outbound_stream() {
        let manager = InMemoryConnectionManager::new();
        let (a_tx, mut a_rx) = mpsc::unbounded_channel();
        let (b_tx, mut b_rx) = mpsc::unbounded_channel();
        manager.add_connection("room-1", "a", a_tx).await;
        manager.add_connection("room-1", "b", b_tx).await;

        manager.send_to_room("room-1", "before").await;
        manager.disconnect("room-1", "a").await;
        manager.send_to_room("room-1", "after").await;

        assert_eq!(a_rx.recv().await.unwrap(), "before");
        assert!(a_rx.recv().await.is_none());
        assert_eq!(b_rx.recv().await.unwrap(), "before");
        assert_eq!(b_rx.recv().await.unwrap(), "after");

        // Already gone, nothing left to keep open
        assert!(manager.remove_connection("room-1", "a").await);
        assert_eq!(manager.connection_count("room-1").await, 1);
    }
}
