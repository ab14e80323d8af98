use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Database model for room_invites table
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct InviteModel {
    pub id: String,
    pub room_id: String,
    pub code: String,
    pub is_used: bool,
    pub created_by: String,
    pub used_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
}

impl InviteModel {
    pub fn new(room_id: String, code: String, created_by: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            room_id,
            code,
            is_used: false,
            created_by,
            used_by: None,
            created_at: Utc::now(),
            used_at: None,
        }
    }

    /// Whether this invite can still admit someone to the given room
    pub fn admits(&self, room_id: &str) -> bool {
        !self.is_used && self.room_id == room_id
    }

    /// Records the single use of this invite
    pub fn consume(&mut self, account_id: &str) {
        self.is_used = true;
        self.used_by = Some(account_id.to_string());
        self.used_at = Some(Utc::now());
    }
}
