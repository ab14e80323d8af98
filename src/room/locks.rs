use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::debug;

/// One async mutex per room.
///
/// Every read-modify-write on a room's memberships, requests or invites runs
/// while holding that room's guard, so two requests touching the same room are
/// applied one after the other.
#[derive(Debug, Clone, Default)]
pub struct RoomLocks {
    locks: Arc<RwLock<HashMap<String, Arc<Mutex<()>>>>>,
}

impl RoomLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, room_id: &str) -> OwnedMutexGuard<()> {
        let existing = self.locks.read().await.get(room_id).cloned();

        let lock = match existing {
            Some(lock) => lock,
            None => {
                let mut locks = self.locks.write().await;
                Arc::clone(locks.entry(room_id.to_string()).or_insert_with(|| {
                    debug!(room_id = %room_id, "Creating room lock");
                    Arc::new(Mutex::new(()))
                }))
            }
        };

        lock.lock_owned().await
    }

    /// Forgets the room's lock unless someone holds it or waits for it.
    /// Returns whether it was forgotten.
    pub async fn release_if_idle(&self, room_id: &str) -> bool {
        let mut locks = self.locks.write().await;
        let idle = locks
            .get(room_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1);
        if idle {
            locks.remove(room_id);
            debug!(room_id = %room_id, "Room lock released");
        }
        idle
    }

    pub async fn room_ids(&self) -> Vec<String> {
        self.locks.read().await.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_room_is_serialized() {
        let locks = RoomLocks::new();
        let guard = locks.acquire("room-1").await;

        let contender = locks.clone();
        let waiting = tokio::spawn(async move {
            let _guard = contender.acquire("room-1").await;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiting.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiting)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_held_lock_is_not_released() {
        let locks = RoomLocks::new();
        let guard = locks.acquire("room-1").await;

        assert!(!locks.release_if_idle("room-1").await);
        assert_eq!(locks.room_ids().await, vec!["room-1".to_string()]);

        drop(guard);
        assert!(locks.release_if_idle("room-1").await);
        assert!(locks.room_ids().await.is_empty());
        assert!(!locks.release_if_idle("room-1").await);
    }

    #[tokio::test]
    async fn test_different_rooms_do_not_block() {
        let locks = RoomLocks::new();
        let _first = locks.acquire("room-1").await;

        let second = tokio::time::timeout(Duration::from_millis(100), locks.acquire("room-2")).await;
        assert!(second.is_ok());
    }
}
