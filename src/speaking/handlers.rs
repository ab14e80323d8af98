use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::instrument;

use super::types::{SpeakingDecisionResponse, SpeakingRequestResponse};
use crate::room::types::MemberResponse;
use crate::session::SessionClaims;
use crate::shared::{AppError, AppState};

/// POST /rooms/:room_id/speaking-requests
#[instrument(name = "request_to_speak", skip(state, claims))]
pub async fn request_to_speak(
    State(state): State<AppState>,
    claims: SessionClaims,
    Path(room_id): Path<String>,
) -> Result<(StatusCode, Json<SpeakingRequestResponse>), AppError> {
    let request = state
        .speaking_service
        .request_to_speak(&claims.account_id, &room_id)
        .await?;
    Ok((StatusCode::CREATED, Json(request)))
}

/// GET /rooms/:room_id/speaking-requests
#[instrument(name = "list_speaking_requests", skip(state, claims))]
pub async fn list_speaking_requests(
    State(state): State<AppState>,
    claims: SessionClaims,
    Path(room_id): Path<String>,
) -> Result<Json<Vec<SpeakingRequestResponse>>, AppError> {
    let requests = state
        .speaking_service
        .list_requests(&claims.account_id, &room_id)
        .await?;
    Ok(Json(requests))
}

/// POST /rooms/:room_id/members/:account_id/approve
#[instrument(name = "approve_speaking", skip(state, claims))]
pub async fn approve_speaking(
    State(state): State<AppState>,
    claims: SessionClaims,
    Path((room_id, account_id)): Path<(String, String)>,
) -> Result<Json<SpeakingDecisionResponse>, AppError> {
    let decision = state
        .speaking_service
        .approve(&claims.account_id, &room_id, &account_id)
        .await?;
    Ok(Json(decision))
}

/// POST /rooms/:room_id/members/:account_id/reject
#[instrument(name = "reject_speaking", skip(state, claims))]
pub async fn reject_speaking(
    State(state): State<AppState>,
    claims: SessionClaims,
    Path((room_id, account_id)): Path<(String, String)>,
) -> Result<Json<SpeakingDecisionResponse>, AppError> {
    let decision = state
        .speaking_service
        .reject(&claims.account_id, &room_id, &account_id)
        .await?;
    Ok(Json(decision))
}

/// POST /rooms/:room_id/members/:account_id/revoke
#[instrument(name = "revoke_speaking", skip(state, claims))]
pub async fn revoke_speaking(
    State(state): State<AppState>,
    claims: SessionClaims,
    Path((room_id, account_id)): Path<(String, String)>,
) -> Result<Json<MemberResponse>, AppError> {
    let member = state
        .speaking_service
        .revoke(&claims.account_id, &room_id, &account_id)
        .await?;
    Ok(Json(member))
}

/// POST /rooms/:room_id/members/:account_id/mute
#[instrument(name = "mute_member", skip(state, claims))]
pub async fn mute_member(
    State(state): State<AppState>,
    claims: SessionClaims,
    Path((room_id, account_id)): Path<(String, String)>,
) -> Result<Json<MemberResponse>, AppError> {
    let member = state
        .speaking_service
        .mute(&claims.account_id, &room_id, &account_id)
        .await?;
    Ok(Json(member))
}

/// POST /rooms/:room_id/members/:account_id/unmute
#[instrument(name = "unmute_member", skip(state, claims))]
pub async fn unmute_member(
    State(state): State<AppState>,
    claims: SessionClaims,
    Path((room_id, account_id)): Path<(String, String)>,
) -> Result<Json<MemberResponse>, AppError> {
    let member = state
        .speaking_service
        .unmute(&claims.account_id, &room_id, &account_id)
        .await?;
    Ok(Json(member))
}

/// POST /rooms/:room_id/speaking/start
#[instrument(name = "start_speaking", skip(state, claims))]
pub async fn start_speaking(
    State(state): State<AppState>,
    claims: SessionClaims,
    Path(room_id): Path<String>,
) -> Result<Json<MemberResponse>, AppError> {
    let member = state
        .speaking_service
        .start_speaking(&claims.account_id, &room_id)
        .await?;
    Ok(Json(member))
}

/// POST /rooms/:room_id/speaking/stop
#[instrument(name = "stop_speaking", skip(state, claims))]
pub async fn stop_speaking(
    State(state): State<AppState>,
    claims: SessionClaims,
    Path(room_id): Path<String>,
) -> Result<Json<MemberResponse>, AppError> {
    let member = state
        .speaking_service
        .stop_speaking(&claims.account_id, &room_id)
        .await?;
    Ok(Json(member))
}
