use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::{info, instrument};

use super::types::{
    ConferenceInfoResponse, JoinRoomRequest, JoinRoomResponse, LeaveRoomResponse,
    MemberResponse, RoomCreateRequest, RoomResponse,
};
use crate::session::SessionClaims;
use crate::shared::{AppError, AppState};

/// HTTP handler for creating a new room
///
/// POST /rooms
/// The caller becomes the owner and first member
#[instrument(name = "create_room", skip(state, claims, request))]
pub async fn create_room(
    State(state): State<AppState>,
    claims: SessionClaims,
    Json(request): Json<RoomCreateRequest>,
) -> Result<(StatusCode, Json<RoomResponse>), AppError> {
    let room = state
        .room_service
        .create_room(&claims.account_id, request)
        .await?;

    info!(room_id = %room.id, owner_id = %room.owner_id, "Room created successfully");
    Ok((StatusCode::CREATED, Json(room)))
}

/// HTTP handler for listing rooms
///
/// GET /rooms
/// Returns active public rooms
#[instrument(name = "list_rooms", skip(state, _claims))]
pub async fn list_rooms(
    State(state): State<AppState>,
    _claims: SessionClaims,
) -> Result<Json<Vec<RoomResponse>>, AppError> {
    let rooms = state.room_service.list_rooms().await?;
    Ok(Json(rooms))
}

/// GET /rooms/:room_id
#[instrument(name = "get_room", skip(state, _claims))]
pub async fn get_room(
    State(state): State<AppState>,
    _claims: SessionClaims,
    Path(room_id): Path<String>,
) -> Result<Json<RoomResponse>, AppError> {
    Ok(Json(state.room_service.get_room(&room_id).await?))
}

/// GET /rooms/:room_id/members
#[instrument(name = "list_members", skip(state, _claims))]
pub async fn list_members(
    State(state): State<AppState>,
    _claims: SessionClaims,
    Path(room_id): Path<String>,
) -> Result<Json<Vec<MemberResponse>>, AppError> {
    Ok(Json(state.room_service.list_members(&room_id).await?))
}

/// POST /rooms/:room_id/join
/// The body is optional; private rooms need `invite_code` in it
#[instrument(name = "join_room", skip(state, claims, body))]
pub async fn join_room(
    State(state): State<AppState>,
    claims: SessionClaims,
    Path(room_id): Path<String>,
    body: Option<Json<JoinRoomRequest>>,
) -> Result<Json<JoinRoomResponse>, AppError> {
    let Json(request) = body.unwrap_or_default();
    let joined = state
        .room_service
        .join_room(&claims.account_id, &room_id, request.invite_code.as_deref())
        .await?;
    Ok(Json(joined))
}

/// POST /rooms/:room_id/leave
#[instrument(name = "leave_room", skip(state, claims))]
pub async fn leave_room(
    State(state): State<AppState>,
    claims: SessionClaims,
    Path(room_id): Path<String>,
) -> Result<Json<LeaveRoomResponse>, AppError> {
    Ok(Json(
        state
            .room_service
            .leave_room(&claims.account_id, &room_id)
            .await?,
    ))
}

/// GET /rooms/:room_id/conference
/// Live state from the conferencing daemon; 502 when it cannot be reached
#[instrument(name = "conference_info", skip(state, _claims))]
pub async fn conference_info(
    State(state): State<AppState>,
    _claims: SessionClaims,
    Path(room_id): Path<String>,
) -> Result<Json<ConferenceInfoResponse>, AppError> {
    Ok(Json(state.room_service.conference_info(&room_id).await?))
}
