use serde_json::Value;
use std::time::Duration;

use super::setup::TestSetup;

// ============================================================================
// Message Assertions
// ============================================================================

/// Waits until the account has received at least `count` pushes and returns
/// them parsed. Delivery runs on the room's subscription task, so it lags the
/// service call slightly.
pub async fn wait_for_messages(setup: &TestSetup, username: &str, count: usize) -> Vec<Value> {
    let account_id = setup.id(username);
    for _ in 0..100 {
        let messages = setup.mock_conn_manager.get_messages_for(&account_id).await;
        if messages.len() >= count {
            return messages
                .iter()
                .map(|m| serde_json::from_str(m).unwrap())
                .collect();
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("{} did not receive {} messages", username, count);
}

/// Gives the subscription task time to deliver, then returns what arrived
pub async fn settled_messages(setup: &TestSetup, username: &str) -> Vec<Value> {
    tokio::time::sleep(Duration::from_millis(50)).await;
    setup
        .mock_conn_manager
        .get_messages_for(&setup.id(username))
        .await
        .iter()
        .map(|m| serde_json::from_str(m).unwrap())
        .collect()
}

pub fn message_types(messages: &[Value]) -> Vec<String> {
    messages
        .iter()
        .map(|m| m["type"].as_str().unwrap_or_default().to_string())
        .collect()
}

pub fn sequence_numbers(messages: &[Value]) -> Vec<u64> {
    messages
        .iter()
        .map(|m| m["meta"]["seq"].as_u64().unwrap_or_default())
        .collect()
}
