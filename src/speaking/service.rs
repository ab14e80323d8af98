use std::sync::Arc;
use tracing::{debug, info, instrument};

use super::{
    models::SpeakingRequestModel,
    repository::SpeakingRequestRepository,
    types::{SpeakingDecisionResponse, SpeakingRequestResponse},
};
use crate::account::repository::AccountRepository;
use crate::event::{EventBus, RoomEvent};
use crate::room::{
    errors::RoomError,
    locks::RoomLocks,
    members::describe_member,
    models::MembershipModel,
    permissions,
    repository::{find_membership, find_room, RoomRepository},
    types::MemberResponse,
};
use crate::shared::AppError;
use crate::telephony::{BridgeCommand, TelephonyQueue};

/// Speaking requests, moderation and self-service speaking state.
///
/// Every mutating call holds the room's lock from the first read until the
/// resulting event has been emitted.
pub struct SpeakingService {
    rooms: Arc<dyn RoomRepository + Send + Sync>,
    requests: Arc<dyn SpeakingRequestRepository + Send + Sync>,
    accounts: Arc<dyn AccountRepository + Send + Sync>,
    locks: RoomLocks,
    event_bus: EventBus,
    telephony: TelephonyQueue,
}

impl SpeakingService {
    pub fn new(
        rooms: Arc<dyn RoomRepository + Send + Sync>,
        requests: Arc<dyn SpeakingRequestRepository + Send + Sync>,
        accounts: Arc<dyn AccountRepository + Send + Sync>,
        locks: RoomLocks,
        event_bus: EventBus,
        telephony: TelephonyQueue,
    ) -> Self {
        Self {
            rooms,
            requests,
            accounts,
            locks,
            event_bus,
            telephony,
        }
    }

    #[instrument(skip(self))]
    pub async fn request_to_speak(
        &self,
        actor_id: &str,
        room_id: &str,
    ) -> Result<SpeakingRequestResponse, AppError> {
        let _guard = self.locks.acquire(room_id).await;

        find_room(self.rooms.as_ref(), room_id).await?;
        let membership = find_membership(self.rooms.as_ref(), room_id, actor_id).await?;
        let pending = self.requests.get_pending_request(room_id, actor_id).await?;
        permissions::check_speak_request(&membership, pending.as_ref())?;

        let request = SpeakingRequestModel::new(actor_id.to_string(), room_id.to_string());
        self.requests.create_request(&request).await?;

        let member = self.describe(&membership).await?;
        let seq = self
            .event_bus
            .emit_to_room(
                room_id,
                RoomEvent::SpeakingRequested {
                    member,
                    request_id: request.id.clone(),
                },
            )
            .await;

        info!(request_id = %request.id, seq, "Speaking requested");
        Ok(request.into())
    }

    /// Pending requests of the room, oldest first. Owner only.
    #[instrument(skip(self))]
    pub async fn list_requests(
        &self,
        actor_id: &str,
        room_id: &str,
    ) -> Result<Vec<SpeakingRequestResponse>, AppError> {
        let room = find_room(self.rooms.as_ref(), room_id).await?;
        permissions::ensure_owner(&room, actor_id, "view speaking requests")?;

        let requests = self.requests.list_pending_requests(room_id).await?;
        Ok(requests.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    pub async fn approve(
        &self,
        actor_id: &str,
        room_id: &str,
        target_id: &str,
    ) -> Result<SpeakingDecisionResponse, AppError> {
        let _guard = self.locks.acquire(room_id).await;

        let room = find_room(self.rooms.as_ref(), room_id).await?;
        permissions::ensure_owner(&room, actor_id, "approve speaking requests")?;
        let mut request = self.pending_request(room_id, target_id).await?;
        let mut membership = find_membership(self.rooms.as_ref(), room_id, target_id).await?;

        permissions::approve(&mut request, &mut membership)?;
        self.requests.update_request(&request).await?;
        self.rooms.update_membership(&membership).await?;

        let member = self.describe(&membership).await?;
        let seq = self
            .event_bus
            .emit_to_room(
                room_id,
                RoomEvent::SpeakingApproved {
                    member: member.clone(),
                    request_id: request.id.clone(),
                },
            )
            .await;

        info!(target_id = %target_id, seq, "Speaking request approved");
        Ok(SpeakingDecisionResponse {
            request: request.into(),
            member,
        })
    }

    #[instrument(skip(self))]
    pub async fn reject(
        &self,
        actor_id: &str,
        room_id: &str,
        target_id: &str,
    ) -> Result<SpeakingDecisionResponse, AppError> {
        let _guard = self.locks.acquire(room_id).await;

        let room = find_room(self.rooms.as_ref(), room_id).await?;
        permissions::ensure_owner(&room, actor_id, "reject speaking requests")?;
        let mut request = self.pending_request(room_id, target_id).await?;
        let membership = find_membership(self.rooms.as_ref(), room_id, target_id).await?;

        permissions::reject(&mut request)?;
        self.requests.update_request(&request).await?;

        let member = self.describe(&membership).await?;
        let seq = self
            .event_bus
            .emit_to_room(
                room_id,
                RoomEvent::SpeakingRejected {
                    member: member.clone(),
                    request_id: request.id.clone(),
                },
            )
            .await;

        info!(target_id = %target_id, seq, "Speaking request rejected");
        Ok(SpeakingDecisionResponse {
            request: request.into(),
            member,
        })
    }

    /// Takes speaking permission away. Idempotent, no request needed.
    #[instrument(skip(self))]
    pub async fn revoke(
        &self,
        actor_id: &str,
        room_id: &str,
        target_id: &str,
    ) -> Result<MemberResponse, AppError> {
        let _guard = self.locks.acquire(room_id).await;

        let room = find_room(self.rooms.as_ref(), room_id).await?;
        permissions::ensure_owner(&room, actor_id, "revoke speaking permission")?;
        let mut membership = find_membership(self.rooms.as_ref(), room_id, target_id).await?;

        permissions::revoke(&mut membership);
        self.rooms.update_membership(&membership).await?;

        let member = self.describe(&membership).await?;
        let seq = self
            .event_bus
            .emit_to_room(room_id, RoomEvent::SpeakingRevoked { member: member.clone() })
            .await;

        info!(target_id = %target_id, seq, "Speaking permission revoked");
        Ok(member)
    }

    #[instrument(skip(self))]
    pub async fn mute(
        &self,
        actor_id: &str,
        room_id: &str,
        target_id: &str,
    ) -> Result<MemberResponse, AppError> {
        self.set_muted(actor_id, room_id, target_id, true).await
    }

    #[instrument(skip(self))]
    pub async fn unmute(
        &self,
        actor_id: &str,
        room_id: &str,
        target_id: &str,
    ) -> Result<MemberResponse, AppError> {
        self.set_muted(actor_id, room_id, target_id, false).await
    }

    async fn set_muted(
        &self,
        actor_id: &str,
        room_id: &str,
        target_id: &str,
        muted: bool,
    ) -> Result<MemberResponse, AppError> {
        let _guard = self.locks.acquire(room_id).await;

        let room = find_room(self.rooms.as_ref(), room_id).await?;
        let action = if muted { "mute members" } else { "unmute members" };
        permissions::ensure_owner(&room, actor_id, action)?;
        let mut membership = find_membership(self.rooms.as_ref(), room_id, target_id).await?;

        permissions::set_muted(&mut membership, muted);
        self.rooms.update_membership(&membership).await?;
        self.telephony
            .submit(
                room_id,
                BridgeCommand::SetMuted {
                    conference_id: room.conference_id.clone(),
                    account_id: target_id.to_string(),
                    muted,
                },
            )
            .await;

        let member = self.describe(&membership).await?;
        let event = if muted {
            RoomEvent::UserMuted {
                member: member.clone(),
            }
        } else {
            RoomEvent::UserUnmuted {
                member: member.clone(),
            }
        };
        let seq = self.event_bus.emit_to_room(room_id, event).await;

        info!(target_id = %target_id, muted, seq, "Mute state changed");
        Ok(member)
    }

    /// Marks the member as speaking. A member without permission, or muted,
    /// gets their unchanged state back and nothing is emitted.
    #[instrument(skip(self))]
    pub async fn start_speaking(
        &self,
        actor_id: &str,
        room_id: &str,
    ) -> Result<MemberResponse, AppError> {
        let _guard = self.locks.acquire(room_id).await;

        let mut membership = find_membership(self.rooms.as_ref(), room_id, actor_id).await?;
        if !permissions::start_speaking(&mut membership) {
            debug!(
                can_speak = membership.can_speak,
                is_muted = membership.is_muted,
                "Start speaking ignored"
            );
            return self.describe(&membership).await;
        }

        self.rooms.update_membership(&membership).await?;
        let member = self.describe(&membership).await?;
        let seq = self
            .event_bus
            .emit_to_room(room_id, RoomEvent::UserStartedSpeaking { member: member.clone() })
            .await;

        debug!(seq, "Member started speaking");
        Ok(member)
    }

    #[instrument(skip(self))]
    pub async fn stop_speaking(
        &self,
        actor_id: &str,
        room_id: &str,
    ) -> Result<MemberResponse, AppError> {
        let _guard = self.locks.acquire(room_id).await;

        let mut membership = find_membership(self.rooms.as_ref(), room_id, actor_id).await?;
        if !permissions::stop_speaking(&mut membership) {
            return self.describe(&membership).await;
        }

        self.rooms.update_membership(&membership).await?;
        let member = self.describe(&membership).await?;
        let seq = self
            .event_bus
            .emit_to_room(room_id, RoomEvent::UserStoppedSpeaking { member: member.clone() })
            .await;

        debug!(seq, "Member stopped speaking");
        Ok(member)
    }

    async fn pending_request(
        &self,
        room_id: &str,
        account_id: &str,
    ) -> Result<SpeakingRequestModel, AppError> {
        self.requests
            .get_pending_request(room_id, account_id)
            .await?
            .ok_or_else(|| RoomError::NoPendingRequest.into())
    }

    async fn describe(&self, membership: &MembershipModel) -> Result<MemberResponse, AppError> {
        describe_member(self.accounts.as_ref(), membership).await
    }
}
