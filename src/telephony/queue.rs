use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

use super::bridge::{ConferenceInfo, TelephonyBridge, TelephonyError};

/// A best-effort command for the conferencing daemon
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeCommand {
    /// Creates the conference and dials the owner into it once created
    Create {
        conference_id: String,
        owner_id: String,
    },
    Dial {
        conference_id: String,
        account_id: String,
    },
    Kick {
        conference_id: String,
        account_id: String,
    },
    SetMuted {
        conference_id: String,
        account_id: String,
        muted: bool,
    },
}

/// Hands bridge commands to one worker task per room.
///
/// Submitting never waits on the daemon. Commands of a room run in the order
/// they were submitted, and failures are logged and dropped.
#[derive(Clone)]
pub struct TelephonyQueue {
    bridge: Arc<dyn TelephonyBridge>,
    // room_id -> worker inbox
    workers: Arc<Mutex<HashMap<String, mpsc::UnboundedSender<BridgeCommand>>>>,
}

impl TelephonyQueue {
    pub fn new(bridge: Arc<dyn TelephonyBridge>) -> Self {
        Self {
            bridge,
            workers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub async fn submit(&self, room_id: &str, command: BridgeCommand) {
        let mut workers = self.workers.lock().await;

        let command = match workers.get(room_id) {
            Some(inbox) => match inbox.send(command) {
                Ok(()) => return,
                // Worker gone, start a fresh one below
                Err(mpsc::error::SendError(command)) => command,
            },
            None => command,
        };

        let (inbox, commands) = mpsc::unbounded_channel();
        let _ = inbox.send(command);
        workers.insert(room_id.to_string(), inbox);
        tokio::spawn(run_worker(
            room_id.to_string(),
            Arc::clone(&self.bridge),
            commands,
        ));
    }

    /// Lets the room's worker finish what is queued, then exit
    pub async fn close_room(&self, room_id: &str) {
        if self.workers.lock().await.remove(room_id).is_some() {
            debug!(room_id = %room_id, "Telephony worker released");
        }
    }

    /// Rooms with a worker that has not been released
    pub async fn room_ids(&self) -> Vec<String> {
        self.workers.lock().await.keys().cloned().collect()
    }

    /// Asked directly; the caller decides what a failure means
    pub async fn conference_info(
        &self,
        conference_id: &str,
    ) -> Result<ConferenceInfo, TelephonyError> {
        self.bridge.conference_info(conference_id).await
    }
}

async fn run_worker(
    room_id: String,
    bridge: Arc<dyn TelephonyBridge>,
    mut commands: mpsc::UnboundedReceiver<BridgeCommand>,
) {
    while let Some(command) = commands.recv().await {
        if let Err(e) = execute(bridge.as_ref(), &command).await {
            warn!(
                room_id = %room_id,
                command = ?command,
                error = %e,
                "Telephony command failed, continuing"
            );
        }
    }
    debug!(room_id = %room_id, "Telephony worker stopped");
}

async fn execute(bridge: &dyn TelephonyBridge, command: &BridgeCommand) -> Result<(), TelephonyError> {
    match command {
        BridgeCommand::Create {
            conference_id,
            owner_id,
        } => {
            bridge.create_conference(conference_id).await?;
            bridge.join_conference(conference_id, owner_id).await
        }
        BridgeCommand::Dial {
            conference_id,
            account_id,
        } => bridge.join_conference(conference_id, account_id).await,
        BridgeCommand::Kick {
            conference_id,
            account_id,
        } => bridge.kick(conference_id, account_id).await,
        BridgeCommand::SetMuted {
            conference_id,
            account_id,
            muted,
        } => bridge.set_muted(conference_id, account_id, *muted).await,
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;

    /// Records every command it receives, optionally after a delay
    #[derive(Default)]
    pub struct RecordingBridge {
        pub delay: Option<Duration>,
        pub fail_create: bool,
        pub calls: std::sync::Mutex<Vec<String>>,
    }

    impl RecordingBridge {
        pub fn slow(delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Self::default()
            }
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().map(|c| c.clone()).unwrap_or_default()
        }

        async fn record(&self, call: String) {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(call);
            }
        }
    }

    #[async_trait]
    impl TelephonyBridge for RecordingBridge {
        async fn create_conference(&self, conference_id: &str) -> Result<(), TelephonyError> {
            if self.fail_create {
                return Err(TelephonyError::Unavailable);
            }
            self.record(format!("create {}", conference_id)).await;
            Ok(())
        }

        async fn join_conference(
            &self,
            conference_id: &str,
            account_id: &str,
        ) -> Result<(), TelephonyError> {
            self.record(format!("dial {} {}", conference_id, account_id)).await;
            Ok(())
        }

        async fn kick(&self, conference_id: &str, account_id: &str) -> Result<(), TelephonyError> {
            self.record(format!("kick {} {}", conference_id, account_id)).await;
            Ok(())
        }

        async fn set_muted(
            &self,
            conference_id: &str,
            account_id: &str,
            muted: bool,
        ) -> Result<(), TelephonyError> {
            let verb = if muted { "mute" } else { "unmute" };
            self.record(format!("{} {} {}", verb, conference_id, account_id)).await;
            Ok(())
        }

        async fn conference_info(
            &self,
            _conference_id: &str,
        ) -> Result<ConferenceInfo, TelephonyError> {
            Err(TelephonyError::Unavailable)
        }
    }

    /// Polls until the bridge has seen `count` calls
    pub async fn wait_for_calls(bridge: &RecordingBridge, count: usize) -> Vec<String> {
        for _ in 0..100 {
            let calls = bridge.calls();
            if calls.len() >= count {
                return calls;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        bridge.calls()
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{wait_for_calls, RecordingBridge};
    use super::*;
    use std::time::Duration;

    fn mute(account_id: &str, muted: bool) -> BridgeCommand {
        BridgeCommand::SetMuted {
            conference_id: "conf".to_string(),
            account_id: account_id.to_string(),
            muted,
        }
    }

    #[tokio::test]
    async fn test_submit_does_not_wait_for_the_daemon() {
        let bridge = Arc::new(RecordingBridge::slow(Duration::from_secs(2)));
        let queue = TelephonyQueue::new(bridge.clone());

        let submitted = tokio::time::timeout(Duration::from_millis(200), async {
            queue.submit("room", mute("a", true)).await;
            queue.submit("room", mute("a", false)).await;
        })
        .await;

        assert!(submitted.is_ok());
        assert!(bridge.calls().is_empty());
    }

    #[tokio::test]
    async fn test_commands_of_a_room_keep_their_order() {
        let bridge = Arc::new(RecordingBridge::slow(Duration::from_millis(5)));
        let queue = TelephonyQueue::new(bridge.clone());

        queue
            .submit(
                "room",
                BridgeCommand::Create {
                    conference_id: "conf".to_string(),
                    owner_id: "owner".to_string(),
                },
            )
            .await;
        queue.submit("room", mute("a", true)).await;
        queue.submit("room", mute("a", false)).await;
        queue.submit("room", mute("a", true)).await;

        let calls = wait_for_calls(&bridge, 5).await;
        assert_eq!(
            calls,
            vec![
                "create conf",
                "dial conf owner",
                "mute conf a",
                "unmute conf a",
                "mute conf a",
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_create_skips_the_owner_dial() {
        let bridge = Arc::new(RecordingBridge {
            fail_create: true,
            ..RecordingBridge::default()
        });
        let queue = TelephonyQueue::new(bridge.clone());

        queue
            .submit(
                "room",
                BridgeCommand::Create {
                    conference_id: "conf".to_string(),
                    owner_id: "owner".to_string(),
                },
            )
            .await;
        queue.submit("room", mute("a", true)).await;

        assert_eq!(wait_for_calls(&bridge, 1).await, vec!["mute conf a"]);
    }

    #[tokio::test]
    async fn test_closed_room_restarts_on_next_command() {
        let bridge = Arc::new(RecordingBridge::default());
        let queue = TelephonyQueue::new(bridge.clone());

        queue.submit("room", mute("a", true)).await;
        assert_eq!(queue.room_ids().await, vec!["room".to_string()]);

        queue.close_room("room").await;
        assert!(queue.room_ids().await.is_empty());

        queue.submit("room", mute("a", false)).await;
        assert_eq!(
            wait_for_calls(&bridge, 2).await,
            vec!["mute conf a", "unmute conf a"]
        );
    }
}
