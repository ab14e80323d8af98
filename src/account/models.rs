use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Database model for accounts table
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct AccountModel {
    pub id: String,
    pub username: String,
    pub display_name: String,
    pub email: Option<String>,
    pub bio: Option<String>,
    pub is_online: bool,
    pub last_seen: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl AccountModel {
    /// A freshly registered account, online
    pub fn new(
        username: String,
        display_name: String,
        email: Option<String>,
        bio: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            username,
            display_name,
            email,
            bio,
            is_online: true,
            last_seen: now,
            created_at: now,
        }
    }

    pub fn set_online(&mut self, online: bool) {
        self.is_online = online;
        self.last_seen = Utc::now();
    }
}
