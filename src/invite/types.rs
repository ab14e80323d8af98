use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::models::InviteModel;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InviteResponse {
    pub id: String,
    pub room_id: String,
    pub code: String,
    pub is_used: bool,
    pub created_by: String,
    pub used_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
}

impl From<InviteModel> for InviteResponse {
    fn from(invite: InviteModel) -> Self {
        Self {
            id: invite.id,
            room_id: invite.room_id,
            code: invite.code,
            is_used: invite.is_used,
            created_by: invite.created_by,
            used_by: invite.used_by,
            created_at: invite.created_at,
            used_at: invite.used_at,
        }
    }
}
