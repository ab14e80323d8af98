use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::models::{MembershipModel, RoomModel};
use crate::account::models::AccountModel;

pub const DEFAULT_ROOM_CAPACITY: i32 = 10;

fn default_is_public() -> bool {
    true
}

fn default_capacity() -> i32 {
    DEFAULT_ROOM_CAPACITY
}

/// Request payload for creating a new room
#[derive(Debug, Deserialize)]
pub struct RoomCreateRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_is_public")]
    pub is_public: bool,
    #[serde(default = "default_capacity")]
    pub max_participants: i32,
}

/// Request payload for joining a room. Only private rooms look at the code.
#[derive(Debug, Default, Deserialize)]
pub struct JoinRoomRequest {
    #[serde(default)]
    pub invite_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoomResponse {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub is_public: bool,
    pub max_participants: i32,
    pub current_participants: i32,
    pub is_active: bool,
    pub owner_id: String,
    pub conference_id: String,
    pub created_at: DateTime<Utc>,
}

impl From<RoomModel> for RoomResponse {
    fn from(room: RoomModel) -> Self {
        Self {
            id: room.id,
            name: room.name,
            description: room.description,
            is_public: room.is_public,
            max_participants: room.max_participants,
            current_participants: room.current_participants,
            is_active: room.is_active,
            owner_id: room.owner_id,
            conference_id: room.conference_id,
            created_at: room.created_at,
        }
    }
}

/// A membership joined with the account it belongs to
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemberResponse {
    pub account_id: String,
    pub username: String,
    pub display_name: String,
    pub can_speak: bool,
    pub is_speaking: bool,
    pub is_muted: bool,
    pub is_moderator: bool,
    pub joined_at: DateTime<Utc>,
}

impl MemberResponse {
    pub fn new(membership: &MembershipModel, account: Option<&AccountModel>) -> Self {
        // Accounts are never deleted, but a missing one should not hide the member
        let (username, display_name) = match account {
            Some(account) => (account.username.clone(), account.display_name.clone()),
            None => (membership.account_id.clone(), membership.account_id.clone()),
        };

        Self {
            account_id: membership.account_id.clone(),
            username,
            display_name,
            can_speak: membership.can_speak,
            is_speaking: membership.is_speaking,
            is_muted: membership.is_muted,
            is_moderator: membership.is_moderator,
            joined_at: membership.joined_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JoinRoomResponse {
    pub room: RoomResponse,
    pub member: MemberResponse,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LeaveRoomResponse {
    pub room_id: String,
    /// True when the owner left and the room stopped accepting members
    pub room_deactivated: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConferenceInfoResponse {
    pub room_id: String,
    pub conference_id: String,
    pub member_count: usize,
    /// Listing as returned by the daemon
    pub listing: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_defaults() {
        let request: RoomCreateRequest = serde_json::from_str(r#"{"name": "Lunch"}"#).unwrap();
        assert!(request.is_public);
        assert_eq!(request.max_participants, DEFAULT_ROOM_CAPACITY);
        assert!(request.description.is_none());
    }

    #[test]
    fn test_member_response_without_account_falls_back_to_id() {
        let membership = MembershipModel::listener("acc-1".to_string(), "room".to_string());
        let member = MemberResponse::new(&membership, None);
        assert_eq!(member.username, "acc-1");
        assert_eq!(member.display_name, "acc-1");
    }
}
