use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::room::types::MemberResponse;

/// Accepted changes to a room's membership or speaking state.
///
/// Each variant carries the member snapshots taken right after the change was
/// stored, so consumers never need to read the store again.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub enum RoomEvent {
    /// Full membership list after a join or leave
    MembersUpdated { members: Vec<MemberResponse> },

    SpeakingRequested {
        member: MemberResponse,
        request_id: String,
    },
    SpeakingApproved {
        member: MemberResponse,
        request_id: String,
    },
    SpeakingRejected {
        member: MemberResponse,
        request_id: String,
    },
    SpeakingRevoked { member: MemberResponse },

    UserMuted { member: MemberResponse },
    UserUnmuted { member: MemberResponse },

    UserStartedSpeaking { member: MemberResponse },
    UserStoppedSpeaking { member: MemberResponse },

    /// Camera state announced by the member; relayed, not stored
    VideoToggled {
        member: MemberResponse,
        video_enabled: bool,
    },
}

impl RoomEvent {
    /// Name used on the push channel
    pub fn event_type(&self) -> &'static str {
        match self {
            RoomEvent::MembersUpdated { .. } => "members_updated",
            RoomEvent::SpeakingRequested { .. } => "speaking_request",
            RoomEvent::SpeakingApproved { .. } => "speaking_approved",
            RoomEvent::SpeakingRejected { .. } => "speaking_rejected",
            RoomEvent::SpeakingRevoked { .. } => "speaking_revoked",
            RoomEvent::UserMuted { .. } => "user_muted",
            RoomEvent::UserUnmuted { .. } => "user_unmuted",
            RoomEvent::UserStartedSpeaking { .. } => "user_started_speaking",
            RoomEvent::UserStoppedSpeaking { .. } => "user_stopped_speaking",
            RoomEvent::VideoToggled { .. } => "user_video_toggled",
        }
    }
}

/// A room event stamped with its position in the room's stream.
/// `seq` starts at 1 and increases by one per event in that room.
#[derive(Debug, Clone, PartialEq)]
pub struct SequencedEvent {
    pub room_id: String,
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub event: RoomEvent,
}
