use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SpeakingRequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl SpeakingRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpeakingRequestStatus::Pending => "pending",
            SpeakingRequestStatus::Approved => "approved",
            SpeakingRequestStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for SpeakingRequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SpeakingRequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SpeakingRequestStatus::Pending),
            "approved" => Ok(SpeakingRequestStatus::Approved),
            "rejected" => Ok(SpeakingRequestStatus::Rejected),
            other => Err(format!("unknown speaking request status: {}", other)),
        }
    }
}

/// Database model for speaking_requests table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpeakingRequestModel {
    pub id: String,
    pub account_id: String,
    pub room_id: String,
    pub status: SpeakingRequestStatus,
    pub requested_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}

impl SpeakingRequestModel {
    pub fn new(account_id: String, room_id: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            account_id,
            room_id,
            status: SpeakingRequestStatus::Pending,
            requested_at: Utc::now(),
            responded_at: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == SpeakingRequestStatus::Pending
    }
}
