use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

use audiorooms::websockets::ConnectionManager;

// ============================================================================
// Mock Infrastructure
// ============================================================================

/// Records every message pushed to each account instead of writing to sockets
#[derive(Clone, Default)]
pub struct MockConnectionManager {
    // account_id -> messages, in delivery order
    sent_messages: Arc<RwLock<HashMap<String, Vec<String>>>>,
    // room_id -> connected account ids
    connected: Arc<RwLock<HashMap<String, Vec<String>>>>,
}

impl MockConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn connect(&self, room_id: &str, account_id: &str) {
        let mut connected = self.connected.write().await;
        let accounts = connected.entry(room_id.to_string()).or_default();
        if !accounts.iter().any(|a| a == account_id) {
            accounts.push(account_id.to_string());
        }
    }

    pub async fn is_connected(&self, room_id: &str, account_id: &str) -> bool {
        self.connected
            .read()
            .await
            .get(room_id)
            .is_some_and(|accounts| accounts.iter().any(|a| a == account_id))
    }

    async fn forget(&self, room_id: &str, account_id: &str) {
        if let Some(accounts) = self.connected.write().await.get_mut(room_id) {
            accounts.retain(|a| a != account_id);
        }
    }

    pub async fn get_messages_for(&self, account_id: &str) -> Vec<String> {
        self.sent_messages
            .read()
            .await
            .get(account_id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn clear_messages(&self) {
        self.sent_messages.write().await.clear();
    }
}

#[async_trait]
impl ConnectionManager for MockConnectionManager {
    async fn add_connection(
        &self,
        room_id: &str,
        account_id: &str,
        _sender: mpsc::UnboundedSender<String>,
    ) {
        self.connect(room_id, account_id).await;
    }

    async fn remove_connection(&self, room_id: &str, account_id: &str) -> bool {
        self.forget(room_id, account_id).await;
        true
    }

    async fn disconnect(&self, room_id: &str, account_id: &str) {
        self.forget(room_id, account_id).await;
    }

    async fn send_to_room(&self, room_id: &str, message: &str) {
        let accounts = self
            .connected
            .read()
            .await
            .get(room_id)
            .cloned()
            .unwrap_or_default();
        let mut sent = self.sent_messages.write().await;
        for account_id in accounts {
            sent.entry(account_id)
                .or_default()
                .push(message.to_string());
        }
    }
}
