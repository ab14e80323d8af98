use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Database model for rooms table
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct RoomModel {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub is_public: bool,
    pub max_participants: i32,
    pub current_participants: i32,
    pub is_active: bool,
    pub owner_id: String,
    pub conference_id: String, // Name of the conference on the telephony daemon
    pub created_at: DateTime<Utc>,
}

impl RoomModel {
    /// Creates an active room with no occupants yet
    pub fn new(
        owner_id: String,
        name: String,
        description: Option<String>,
        is_public: bool,
        max_participants: i32,
    ) -> Self {
        let id = Uuid::new_v4();

        Self {
            id: id.to_string(),
            name,
            description,
            is_public,
            max_participants,
            current_participants: 0,
            is_active: true,
            owner_id,
            conference_id: format!("room_{}", id.simple()),
            created_at: Utc::now(),
        }
    }

    pub fn is_full(&self) -> bool {
        self.current_participants >= self.max_participants
    }

    pub fn is_owned_by(&self, account_id: &str) -> bool {
        self.owner_id == account_id
    }

    pub fn occupy_seat(&mut self) {
        self.current_participants += 1;
    }

    pub fn vacate_seat(&mut self) {
        self.current_participants = (self.current_participants - 1).max(0);
    }

    /// Marks the room non-joinable. Existing members are left in place.
    pub fn deactivate(&mut self) {
        self.is_active = false;
    }
}

/// Database model for room_members table
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct MembershipModel {
    pub id: String,
    pub account_id: String,
    pub room_id: String,
    pub can_speak: bool,
    pub is_speaking: bool,
    pub is_muted: bool,
    pub is_moderator: bool,
    pub joined_at: DateTime<Utc>,
}

impl MembershipModel {
    /// A regular member: listens until granted permission to speak
    pub fn listener(account_id: String, room_id: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            account_id,
            room_id,
            can_speak: false,
            is_speaking: false,
            is_muted: false,
            is_moderator: false,
            joined_at: Utc::now(),
        }
    }

    /// The membership created for the owner together with the room
    pub fn owner(account_id: String, room_id: String) -> Self {
        Self {
            can_speak: true,
            is_moderator: true,
            ..Self::listener(account_id, room_id)
        }
    }

    /// A member may only be speaking while allowed to and unmuted
    pub fn is_consistent(&self) -> bool {
        !self.is_speaking || (self.can_speak && !self.is_muted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room(capacity: i32) -> RoomModel {
        RoomModel::new(
            "owner".to_string(),
            "Morning standup".to_string(),
            None,
            true,
            capacity,
        )
    }

    #[test]
    fn test_new_room_is_active_and_empty() {
        let room = room(10);

        assert_eq!(room.id.len(), 36);
        assert!(room.is_active);
        assert_eq!(room.current_participants, 0);
        assert!(room.is_owned_by("owner"));
        assert!(!room.is_owned_by("someone-else"));
        assert!(room.conference_id.starts_with("room_"));
        assert!(!room.conference_id.contains('-'));
    }

    #[test]
    fn test_seats_and_capacity() {
        let mut room = room(2);

        room.occupy_seat();
        assert!(!room.is_full());
        room.occupy_seat();
        assert!(room.is_full());

        room.vacate_seat();
        room.vacate_seat();
        room.vacate_seat();
        assert_eq!(room.current_participants, 0);
    }

    #[test]
    fn test_owner_membership_can_speak_and_moderate() {
        let owner = MembershipModel::owner("owner".to_string(), "room".to_string());
        assert!(owner.can_speak);
        assert!(owner.is_moderator);
        assert!(!owner.is_speaking);

        let listener = MembershipModel::listener("guest".to_string(), "room".to_string());
        assert!(!listener.can_speak);
        assert!(!listener.is_moderator);
        assert_ne!(owner.id, listener.id);
    }

    #[test]
    fn test_consistency_rules() {
        let mut member = MembershipModel::owner("owner".to_string(), "room".to_string());
        member.is_speaking = true;
        assert!(member.is_consistent());

        member.is_muted = true;
        assert!(!member.is_consistent());

        member.is_muted = false;
        member.can_speak = false;
        assert!(!member.is_consistent());
    }
}
