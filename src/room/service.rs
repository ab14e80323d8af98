use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::{
    errors::RoomError,
    locks::RoomLocks,
    members::{describe_member, describe_members},
    models::{MembershipModel, RoomModel},
    permissions::{self, JoinGrant},
    repository::{find_membership, find_room, RoomRepository},
    types::{
        ConferenceInfoResponse, JoinRoomResponse, LeaveRoomResponse, MemberResponse,
        RoomCreateRequest, RoomResponse,
    },
};
use crate::account::repository::AccountRepository;
use crate::event::{EventBus, RoomEvent};
use crate::invite::{generator::is_well_formed, repository::InviteRepository};
use crate::shared::AppError;
use crate::speaking::repository::SpeakingRequestRepository;
use crate::telephony::{BridgeCommand, TelephonyQueue};
use crate::websockets::ConnectionManager;

pub const ROOM_NAME_MAX_LEN: usize = 100;

/// Room creation, discovery and the join/leave lifecycle
pub struct RoomService {
    rooms: Arc<dyn RoomRepository + Send + Sync>,
    accounts: Arc<dyn AccountRepository + Send + Sync>,
    invites: Arc<dyn InviteRepository + Send + Sync>,
    speaking_requests: Arc<dyn SpeakingRequestRepository + Send + Sync>,
    locks: RoomLocks,
    event_bus: EventBus,
    telephony: TelephonyQueue,
    connections: Arc<dyn ConnectionManager>,
    max_room_capacity: i32,
}

impl RoomService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        rooms: Arc<dyn RoomRepository + Send + Sync>,
        accounts: Arc<dyn AccountRepository + Send + Sync>,
        invites: Arc<dyn InviteRepository + Send + Sync>,
        speaking_requests: Arc<dyn SpeakingRequestRepository + Send + Sync>,
        locks: RoomLocks,
        event_bus: EventBus,
        telephony: TelephonyQueue,
        connections: Arc<dyn ConnectionManager>,
        max_room_capacity: i32,
    ) -> Self {
        Self {
            rooms,
            accounts,
            invites,
            speaking_requests,
            locks,
            event_bus,
            telephony,
            connections,
            max_room_capacity,
        }
    }

    /// Creates the room with its owner as the first member, then queues the
    /// conference setup on the daemon
    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_room(
        &self,
        actor_id: &str,
        request: RoomCreateRequest,
    ) -> Result<RoomResponse, AppError> {
        let name = request.name.trim();
        if name.is_empty() || name.chars().count() > ROOM_NAME_MAX_LEN {
            return Err(RoomError::Validation(format!(
                "Room name must be 1-{} characters",
                ROOM_NAME_MAX_LEN
            ))
            .into());
        }
        if !(1..=self.max_room_capacity).contains(&request.max_participants) {
            return Err(RoomError::Validation(format!(
                "Capacity must be between 1 and {}",
                self.max_room_capacity
            ))
            .into());
        }

        let description = request
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        let mut room = RoomModel::new(
            actor_id.to_string(),
            name.to_string(),
            description,
            request.is_public,
            request.max_participants,
        );
        room.occupy_seat();

        let owner = MembershipModel::owner(actor_id.to_string(), room.id.clone());
        self.rooms.create_room(&room, &owner).await?;

        self.telephony
            .submit(
                &room.id,
                BridgeCommand::Create {
                    conference_id: room.conference_id.clone(),
                    owner_id: actor_id.to_string(),
                },
            )
            .await;

        info!(
            room_id = %room.id,
            is_public = room.is_public,
            capacity = room.max_participants,
            "Room created"
        );
        Ok(room.into())
    }

    /// Active public rooms, newest first
    #[instrument(skip(self))]
    pub async fn list_rooms(&self) -> Result<Vec<RoomResponse>, AppError> {
        let rooms = self.rooms.list_public_active_rooms().await?;
        debug!(room_count = rooms.len(), "Rooms listed");
        Ok(rooms.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    pub async fn get_room(&self, room_id: &str) -> Result<RoomResponse, AppError> {
        Ok(find_room(self.rooms.as_ref(), room_id).await?.into())
    }

    #[instrument(skip(self))]
    pub async fn list_members(&self, room_id: &str) -> Result<Vec<MemberResponse>, AppError> {
        find_room(self.rooms.as_ref(), room_id).await?;
        self.member_snapshot(room_id).await
    }

    async fn member_snapshot(&self, room_id: &str) -> Result<Vec<MemberResponse>, AppError> {
        let memberships = self.rooms.list_memberships(room_id).await?;
        describe_members(self.accounts.as_ref(), &memberships).await
    }

    /// Membership snapshot together with the sequence number of the last
    /// event it already reflects. Taken under the room lock.
    #[instrument(skip(self))]
    pub async fn sequenced_snapshot(
        &self,
        room_id: &str,
    ) -> Result<(u64, Vec<MemberResponse>), AppError> {
        let _guard = self.locks.acquire(room_id).await;
        let members = self.member_snapshot(room_id).await?;
        Ok((self.event_bus.last_seq(room_id).await, members))
    }

    /// Whether the account currently belongs to the room
    pub async fn is_member(&self, room_id: &str, account_id: &str) -> Result<bool, AppError> {
        Ok(self
            .rooms
            .get_membership(room_id, account_id)
            .await?
            .is_some())
    }

    #[instrument(skip(self, invite_code))]
    pub async fn join_room(
        &self,
        actor_id: &str,
        room_id: &str,
        invite_code: Option<&str>,
    ) -> Result<JoinRoomResponse, AppError> {
        let _guard = self.locks.acquire(room_id).await;

        let mut room = find_room(self.rooms.as_ref(), room_id).await?;
        let existing = self.rooms.get_membership(room_id, actor_id).await?;

        let code = invite_code.map(str::trim).filter(|code| !code.is_empty());
        let mut invite = match code {
            // A code that could never have been issued is not looked up
            Some(code) if !room.is_public && is_well_formed(code) => {
                self.invites.get_invite_by_code(code).await?
            }
            _ => None,
        };

        let grant = permissions::check_join(&room, existing.as_ref(), code, invite.as_ref())?;

        let membership = MembershipModel::listener(actor_id.to_string(), room_id.to_string());
        room.occupy_seat();
        let consumed = match (grant, invite.as_mut()) {
            (JoinGrant::Invite, Some(invite)) => {
                invite.consume(actor_id);
                Some(&*invite)
            }
            _ => None,
        };
        self.rooms.admit_member(&room, &membership, consumed).await?;
        if let Some(invite) = consumed {
            debug!(invite_id = %invite.id, "Invite consumed");
        }

        let seq = self.emit_members_updated(room_id).await?;
        self.telephony
            .submit(
                room_id,
                BridgeCommand::Dial {
                    conference_id: room.conference_id.clone(),
                    account_id: actor_id.to_string(),
                },
            )
            .await;

        info!(
            occupancy = room.current_participants,
            capacity = room.max_participants,
            seq,
            "Member joined room"
        );

        let member = describe_member(self.accounts.as_ref(), &membership).await?;
        Ok(JoinRoomResponse {
            room: room.into(),
            member,
        })
    }

    /// Removes the membership and drops the member's socket. The owner leaving
    /// deactivates the room; a pending speaking request of the leaving member
    /// is closed. Once nobody is left, the room's event stream ends.
    #[instrument(skip(self))]
    pub async fn leave_room(
        &self,
        actor_id: &str,
        room_id: &str,
    ) -> Result<LeaveRoomResponse, AppError> {
        let guard = self.locks.acquire(room_id).await;

        let mut room = find_room(self.rooms.as_ref(), room_id).await?;
        let mut pending = self
            .speaking_requests
            .get_pending_request(room_id, actor_id)
            .await?;
        if let Some(request) = pending.as_mut() {
            permissions::reject(request)?;
        }

        room.vacate_seat();
        let room_deactivated = room.is_owned_by(actor_id);
        if room_deactivated {
            room.deactivate();
        }
        if !self
            .rooms
            .release_member(&room, actor_id, pending.as_ref())
            .await?
        {
            return Err(RoomError::NotMember.into());
        }
        if let Some(request) = &pending {
            debug!(request_id = %request.id, "Pending speaking request closed on leave");
        }

        self.connections.disconnect(room_id, actor_id).await;
        let seq = self.emit_members_updated(room_id).await?;
        self.telephony
            .submit(
                room_id,
                BridgeCommand::Kick {
                    conference_id: room.conference_id.clone(),
                    account_id: actor_id.to_string(),
                },
            )
            .await;

        let emptied = self.rooms.list_memberships(room_id).await?.is_empty();
        if emptied {
            self.close_room_streams(room_id).await;
        }

        info!(
            occupancy = room.current_participants,
            room_deactivated,
            seq,
            "Member left room"
        );

        drop(guard);
        if emptied {
            self.locks.release_if_idle(room_id).await;
        }

        Ok(LeaveRoomResponse {
            room_id: room.id,
            room_deactivated,
        })
    }

    /// Relays a member's camera state to the room
    #[instrument(skip(self))]
    pub async fn toggle_video(
        &self,
        actor_id: &str,
        room_id: &str,
        video_enabled: bool,
    ) -> Result<MemberResponse, AppError> {
        let _guard = self.locks.acquire(room_id).await;

        let membership = find_membership(self.rooms.as_ref(), room_id, actor_id).await?;
        let member = describe_member(self.accounts.as_ref(), &membership).await?;
        let seq = self
            .event_bus
            .emit_to_room(
                room_id,
                RoomEvent::VideoToggled {
                    member: member.clone(),
                    video_enabled,
                },
            )
            .await;

        debug!(video_enabled, seq, "Video state relayed");
        Ok(member)
    }

    /// Live conference state from the daemon
    #[instrument(skip(self))]
    pub async fn conference_info(&self, room_id: &str) -> Result<ConferenceInfoResponse, AppError> {
        let room = find_room(self.rooms.as_ref(), room_id).await?;

        let info = self
            .telephony
            .conference_info(&room.conference_id)
            .await
            .map_err(|e| {
                warn!(conference_id = %room.conference_id, error = %e, "Conference info failed");
                AppError::Upstream(e.to_string())
            })?;

        Ok(ConferenceInfoResponse {
            room_id: room.id,
            conference_id: info.conference_id,
            member_count: info.member_count,
            listing: info.listing,
        })
    }

    /// Drops the per-room channel, telephony worker and lock of every room
    /// that is gone, or inactive with nobody left in it. Returns how many
    /// rooms were released.
    #[instrument(skip(self))]
    pub async fn release_idle_rooms(&self) -> Result<usize, AppError> {
        let mut candidates: HashSet<String> = self.locks.room_ids().await.into_iter().collect();
        candidates.extend(self.event_bus.room_ids().await);
        candidates.extend(self.telephony.room_ids().await);

        let mut released = 0;
        for room_id in candidates {
            let guard = self.locks.acquire(&room_id).await;
            let idle = match self.rooms.get_room(&room_id).await? {
                None => true,
                Some(room) => {
                    !room.is_active && self.rooms.list_memberships(&room_id).await?.is_empty()
                }
            };
            if idle {
                self.close_room_streams(&room_id).await;
                released += 1;
            }
            drop(guard);
            if idle {
                self.locks.release_if_idle(&room_id).await;
            }
        }

        Ok(released)
    }

    async fn close_room_streams(&self, room_id: &str) {
        self.event_bus.close_room(room_id).await;
        self.telephony.close_room(room_id).await;
        debug!(room_id = %room_id, "Room streams closed");
    }

    async fn emit_members_updated(&self, room_id: &str) -> Result<u64, AppError> {
        let members = self.member_snapshot(room_id).await?;
        Ok(self
            .event_bus
            .emit_to_room(room_id, RoomEvent::MembersUpdated { members })
            .await)
    }
}
