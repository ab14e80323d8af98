use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum TelephonyError {
    #[error("Telephony is not configured")]
    Unavailable,

    #[error("Telephony connection error: {0}")]
    Io(String),

    #[error("Telephony protocol error: {0}")]
    Protocol(String),

    #[error("Telephony authentication failed: {0}")]
    AuthFailed(String),

    #[error("Telephony rejected `{command}`: {reply}")]
    Rejected { command: String, reply: String },

    #[error("Telephony did not answer in time")]
    Timeout,
}

impl From<std::io::Error> for TelephonyError {
    fn from(err: std::io::Error) -> Self {
        TelephonyError::Io(err.to_string())
    }
}

/// Conference state as reported by the daemon
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ConferenceInfo {
    pub conference_id: String,
    pub member_count: usize,
    /// Raw listing, one line per conference member
    pub listing: String,
}

/// Operations the room services need from the conferencing daemon
#[async_trait]
pub trait TelephonyBridge: Send + Sync {
    async fn create_conference(&self, conference_id: &str) -> Result<(), TelephonyError>;

    /// Dials the account into the conference
    async fn join_conference(
        &self,
        conference_id: &str,
        account_id: &str,
    ) -> Result<(), TelephonyError>;

    async fn kick(&self, conference_id: &str, account_id: &str) -> Result<(), TelephonyError>;

    async fn set_muted(
        &self,
        conference_id: &str,
        account_id: &str,
        muted: bool,
    ) -> Result<(), TelephonyError>;

    async fn conference_info(&self, conference_id: &str) -> Result<ConferenceInfo, TelephonyError>;
}

/// Used when no daemon is configured. Every command succeeds without effect.
#[derive(Debug, Default)]
pub struct DisabledTelephony;

#[async_trait]
impl TelephonyBridge for DisabledTelephony {
    async fn create_conference(&self, conference_id: &str) -> Result<(), TelephonyError> {
        debug!(conference_id = %conference_id, "Telephony disabled, skipping conference create");
        Ok(())
    }

    async fn join_conference(
        &self,
        conference_id: &str,
        account_id: &str,
    ) -> Result<(), TelephonyError> {
        debug!(
            conference_id = %conference_id,
            account_id = %account_id,
            "Telephony disabled, skipping dial"
        );
        Ok(())
    }

    async fn kick(&self, conference_id: &str, account_id: &str) -> Result<(), TelephonyError> {
        debug!(
            conference_id = %conference_id,
            account_id = %account_id,
            "Telephony disabled, skipping kick"
        );
        Ok(())
    }

    async fn set_muted(
        &self,
        conference_id: &str,
        account_id: &str,
        muted: bool,
    ) -> Result<(), TelephonyError> {
        debug!(
            conference_id = %conference_id,
            account_id = %account_id,
            muted,
            "Telephony disabled, skipping mute change"
        );
        Ok(())
    }

    async fn conference_info(&self, _conference_id: &str) -> Result<ConferenceInfo, TelephonyError> {
        Err(TelephonyError::Unavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_bridge_accepts_commands() {
        let bridge = DisabledTelephony;
        assert!(bridge.create_conference("room_1").await.is_ok());
        assert!(bridge.join_conference("room_1", "acc").await.is_ok());
        assert!(bridge.kick("room_1", "acc").await.is_ok());
        assert!(bridge.set_muted("room_1", "acc", true).await.is_ok());
    }

    #[tokio::test]
    async fn test_disabled_bridge_has_no_conference_info() {
        assert_eq!(
            DisabledTelephony.conference_info("room_1").await,
            Err(TelephonyError::Unavailable)
        );
    }
}
