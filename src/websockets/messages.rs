use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::event::{RoomEvent, SequencedEvent};
use crate::room::types::MemberResponse;

/// Message types for WebSocket communication
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    // Client -> Server
    RequestSpeak,
    StartSpeaking,
    StopSpeaking,
    Leave,
    ToggleVideo,
    RefreshMembers,

    // Server -> Client
    MembersUpdated,
    SpeakingRequest,
    SpeakingApproved,
    SpeakingRejected,
    SpeakingRevoked,
    UserMuted,
    UserUnmuted,
    UserStartedSpeaking,
    UserStoppedSpeaking,
    UserVideoToggled,
    Error,
}

impl MessageType {
    fn for_event(event: &RoomEvent) -> Self {
        match event {
            RoomEvent::MembersUpdated { .. } => MessageType::MembersUpdated,
            RoomEvent::SpeakingRequested { .. } => MessageType::SpeakingRequest,
            RoomEvent::SpeakingApproved { .. } => MessageType::SpeakingApproved,
            RoomEvent::SpeakingRejected { .. } => MessageType::SpeakingRejected,
            RoomEvent::SpeakingRevoked { .. } => MessageType::SpeakingRevoked,
            RoomEvent::UserMuted { .. } => MessageType::UserMuted,
            RoomEvent::UserUnmuted { .. } => MessageType::UserUnmuted,
            RoomEvent::UserStartedSpeaking { .. } => MessageType::UserStartedSpeaking,
            RoomEvent::UserStoppedSpeaking { .. } => MessageType::UserStoppedSpeaking,
            RoomEvent::VideoToggled { .. } => MessageType::UserVideoToggled,
        }
    }
}

/// Metadata for WebSocket messages
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WebSocketMessageMeta {
    pub timestamp: DateTime<Utc>,
    /// Position in the room's event stream; absent on errors
    pub seq: Option<u64>,
}

/// Base structure for WebSocket messages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSocketMessage {
    #[serde(rename = "type")]
    pub message_type: MessageType,
    #[serde(default)]
    pub payload: serde_json::Value,
    #[serde(default)]
    pub meta: Option<WebSocketMessageMeta>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MembersUpdatedPayload {
    pub room_id: String,
    pub members: Vec<MemberResponse>,
}

/// Payload of every event about a single member
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberChangedPayload {
    pub room_id: String,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_enabled: Option<bool>,
    pub member: MemberResponse,
}

/// Payload a client sends with `toggle_video`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToggleVideoPayload {
    pub video_enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
}

impl WebSocketMessage {
    /// Push message for a room event
    pub fn from_event(event: &SequencedEvent) -> Result<Self, serde_json::Error> {
        let payload = match &event.event {
            RoomEvent::MembersUpdated { members } => serde_json::to_value(MembersUpdatedPayload {
                room_id: event.room_id.clone(),
                members: members.clone(),
            })?,
            RoomEvent::SpeakingRequested { member, request_id }
            | RoomEvent::SpeakingApproved { member, request_id }
            | RoomEvent::SpeakingRejected { member, request_id } => {
                let mut payload = member_changed(&event.room_id, member);
                payload.request_id = Some(request_id.clone());
                serde_json::to_value(payload)?
            }
            RoomEvent::SpeakingRevoked { member }
            | RoomEvent::UserMuted { member }
            | RoomEvent::UserUnmuted { member }
            | RoomEvent::UserStartedSpeaking { member }
            | RoomEvent::UserStoppedSpeaking { member } => {
                serde_json::to_value(member_changed(&event.room_id, member))?
            }
            RoomEvent::VideoToggled {
                member,
                video_enabled,
            } => {
                let mut payload = member_changed(&event.room_id, member);
                payload.video_enabled = Some(*video_enabled);
                serde_json::to_value(payload)?
            }
        };

        Ok(Self {
            message_type: MessageType::for_event(&event.event),
            payload,
            meta: Some(WebSocketMessageMeta {
                timestamp: event.timestamp,
                seq: Some(event.seq),
            }),
        })
    }

    /// Full `members_updated` for one socket, on connect or when it asks
    pub fn members_snapshot(
        room_id: &str,
        seq: u64,
        members: Vec<MemberResponse>,
    ) -> Result<Self, serde_json::Error> {
        let payload = serde_json::to_value(MembersUpdatedPayload {
            room_id: room_id.to_string(),
            members,
        })?;

        Ok(Self {
            message_type: MessageType::MembersUpdated,
            payload,
            meta: Some(WebSocketMessageMeta {
                timestamp: Utc::now(),
                seq: Some(seq),
            }),
        })
    }

    /// Create an ERROR message
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message_type: MessageType::Error,
            payload: json!({ "message": message.into() }),
            meta: Some(WebSocketMessageMeta {
                timestamp: Utc::now(),
                seq: None,
            }),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

fn member_changed(room_id: &str, member: &MemberResponse) -> MemberChangedPayload {
    MemberChangedPayload {
        room_id: room_id.to_string(),
        user_id: member.account_id.clone(),
        request_id: None,
        video_enabled: None,
        member: member.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::models::MembershipModel;

    fn member() -> MemberResponse {
        let mut membership = MembershipModel::listener("acc-1".to_string(), "room-1".to_string());
        membership.is_muted = true;
        MemberResponse::new(&membership, None)
    }

    fn sequenced(seq: u64, event: RoomEvent) -> SequencedEvent {
        SequencedEvent {
            room_id: "room-1".to_string(),
            seq,
            timestamp: Utc::now(),
            event,
        }
    }

    #[test]
    fn test_member_event_envelope() {
        let message =
            WebSocketMessage::from_event(&sequenced(7, RoomEvent::UserMuted { member: member() }))
                .unwrap();
        let value: serde_json::Value = serde_json::from_str(&message.to_json().unwrap()).unwrap();

        assert_eq!(value["type"], "user_muted");
        assert_eq!(value["payload"]["room_id"], "room-1");
        assert_eq!(value["payload"]["user_id"], "acc-1");
        assert_eq!(value["payload"]["member"]["is_muted"], true);
        assert!(value["payload"].get("request_id").is_none());
        assert_eq!(value["meta"]["seq"], 7);
        assert!(value["meta"]["timestamp"].is_string());
    }

    #[test]
    fn test_speaking_request_carries_request_id() {
        let event = RoomEvent::SpeakingRequested {
            member: member(),
            request_id: "req-1".to_string(),
        };
        let message = WebSocketMessage::from_event(&sequenced(1, event)).unwrap();

        assert_eq!(message.message_type, MessageType::SpeakingRequest);
        assert_eq!(message.payload["request_id"], "req-1");
    }

    #[test]
    fn test_snapshot_and_error_messages() {
        let snapshot = WebSocketMessage::members_snapshot("room-1", 3, vec![member()]).unwrap();
        assert_eq!(snapshot.message_type, MessageType::MembersUpdated);
        assert_eq!(snapshot.payload["members"].as_array().unwrap().len(), 1);
        assert_eq!(snapshot.meta.unwrap().seq, Some(3));

        let error = WebSocketMessage::error("Not a member of this room");
        let value: serde_json::Value = serde_json::from_str(&error.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(value["payload"]["message"], "Not a member of this room");
        assert!(value["meta"]["seq"].is_null());
    }

    #[test]
    fn test_video_toggle_envelope() {
        let event = RoomEvent::VideoToggled {
            member: member(),
            video_enabled: false,
        };
        let message = WebSocketMessage::from_event(&sequenced(4, event)).unwrap();

        assert_eq!(message.message_type, MessageType::UserVideoToggled);
        assert_eq!(message.payload["video_enabled"], false);
        assert_eq!(message.payload["user_id"], "acc-1");
        assert!(message.payload.get("request_id").is_none());

        let client: WebSocketMessage = serde_json::from_str(
            r#"{"type": "toggle_video", "payload": {"video_enabled": true}}"#,
        )
        .unwrap();
        assert_eq!(client.message_type, MessageType::ToggleVideo);
        let payload: ToggleVideoPayload = serde_json::from_value(client.payload).unwrap();
        assert!(payload.video_enabled);
    }

    #[test]
    fn test_client_message_without_payload_or_meta() {
        let message: WebSocketMessage =
            serde_json::from_str(r#"{"type": "start_speaking"}"#).unwrap();
        assert_eq!(message.message_type, MessageType::StartSpeaking);
        assert!(message.meta.is_none());

        assert!(serde_json::from_str::<WebSocketMessage>(r#"{"type": "dance"}"#).is_err());
    }
}
