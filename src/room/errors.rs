use axum::http::StatusCode;
use thiserror::Error;

/// Reasons a room, membership, speaking or invite operation is refused
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RoomError {
    #[error("Room not found: {0}")]
    RoomNotFound(String),

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Room is full")]
    RoomFull,

    #[error("Room is no longer active")]
    RoomInactive,

    #[error("Already a member of this room")]
    AlreadyMember,

    #[error("Not a member of this room")]
    NotMember,

    #[error("An invite code is required to join this room")]
    InviteRequired,

    #[error("Invite code is invalid or has already been used")]
    InvalidInvite,

    #[error("A speaking request is already pending")]
    DuplicateRequest,

    #[error("Member is already allowed to speak")]
    AlreadyCanSpeak,

    #[error("No pending speaking request")]
    NoPendingRequest,

    #[error("Only the room owner can {0}")]
    Forbidden(&'static str),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Could not generate a unique invite code")]
    InviteCodeExhausted,
}

impl RoomError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RoomError::Validation(_) | RoomError::InviteRequired => StatusCode::BAD_REQUEST,
            RoomError::Forbidden(_) => StatusCode::FORBIDDEN,
            RoomError::RoomNotFound(_)
            | RoomError::AccountNotFound(_)
            | RoomError::NotMember
            | RoomError::NoPendingRequest => StatusCode::NOT_FOUND,
            RoomError::RoomFull
            | RoomError::RoomInactive
            | RoomError::AlreadyMember
            | RoomError::InvalidInvite
            | RoomError::DuplicateRequest
            | RoomError::AlreadyCanSpeak
            | RoomError::InviteCodeExhausted => StatusCode::CONFLICT,
        }
    }
}
