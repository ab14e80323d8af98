//! Membership and speaking-permission rules.
//!
//! Pure functions over the stored records: each one decides whether an action
//! is legal and applies the resulting mutation to the records it is handed.
//! Loading and saving is left to the services.

use chrono::Utc;

use super::{
    errors::RoomError,
    models::{MembershipModel, RoomModel},
};
use crate::invite::models::InviteModel;
use crate::speaking::models::{SpeakingRequestModel, SpeakingRequestStatus};

/// How a join was admitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinGrant {
    /// Public room, nothing to consume
    Open,
    /// Private room, the presented invite must be marked used
    Invite,
}

pub fn ensure_owner(
    room: &RoomModel,
    actor_id: &str,
    action: &'static str,
) -> Result<(), RoomError> {
    if room.is_owned_by(actor_id) {
        Ok(())
    } else {
        Err(RoomError::Forbidden(action))
    }
}

/// Decides whether `actor_id` may join `room`.
///
/// `invite` is the stored invite looked up by `invite_code`, if any.
pub fn check_join(
    room: &RoomModel,
    existing: Option<&MembershipModel>,
    invite_code: Option<&str>,
    invite: Option<&InviteModel>,
) -> Result<JoinGrant, RoomError> {
    if !room.is_active {
        return Err(RoomError::RoomInactive);
    }
    if existing.is_some() {
        return Err(RoomError::AlreadyMember);
    }
    if room.is_full() {
        return Err(RoomError::RoomFull);
    }
    if room.is_public {
        return Ok(JoinGrant::Open);
    }

    match invite_code.map(str::trim).filter(|code| !code.is_empty()) {
        None => Err(RoomError::InviteRequired),
        Some(code) => match invite {
            Some(invite) if invite.code == code && invite.admits(&room.id) => {
                Ok(JoinGrant::Invite)
            }
            _ => Err(RoomError::InvalidInvite),
        },
    }
}

pub fn check_speak_request(
    membership: &MembershipModel,
    pending: Option<&SpeakingRequestModel>,
) -> Result<(), RoomError> {
    if pending.is_some() {
        return Err(RoomError::DuplicateRequest);
    }
    if membership.can_speak {
        return Err(RoomError::AlreadyCanSpeak);
    }
    Ok(())
}

/// Grants the request and the permission it asked for
pub fn approve(
    request: &mut SpeakingRequestModel,
    membership: &mut MembershipModel,
) -> Result<(), RoomError> {
    respond(request, SpeakingRequestStatus::Approved)?;
    membership.can_speak = true;
    Ok(())
}

/// Closes the request; the member's permission is left as it was
pub fn reject(request: &mut SpeakingRequestModel) -> Result<(), RoomError> {
    respond(request, SpeakingRequestStatus::Rejected)
}

fn respond(
    request: &mut SpeakingRequestModel,
    status: SpeakingRequestStatus,
) -> Result<(), RoomError> {
    if !request.is_pending() {
        return Err(RoomError::NoPendingRequest);
    }
    request.status = status;
    request.responded_at = Some(Utc::now());
    Ok(())
}

pub fn revoke(membership: &mut MembershipModel) {
    membership.can_speak = false;
    membership.is_speaking = false;
}

pub fn set_muted(membership: &mut MembershipModel, muted: bool) {
    membership.is_muted = muted;
    if muted {
        membership.is_speaking = false;
    }
}

/// Returns true when the member actually started speaking.
/// Members without permission or muted are silently left as they are.
pub fn start_speaking(membership: &mut MembershipModel) -> bool {
    if !membership.can_speak || membership.is_muted || membership.is_speaking {
        return false;
    }
    membership.is_speaking = true;
    true
}

/// Returns true when the member was speaking before the call
pub fn stop_speaking(membership: &mut MembershipModel) -> bool {
    std::mem::replace(&mut membership.is_speaking, false)
}
