use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::instrument;

use super::types::InviteResponse;
use crate::session::SessionClaims;
use crate::shared::{AppError, AppState};

/// POST /rooms/:room_id/invites
#[instrument(name = "create_invite", skip(state, claims))]
pub async fn create_invite(
    State(state): State<AppState>,
    claims: SessionClaims,
    Path(room_id): Path<String>,
) -> Result<(StatusCode, Json<InviteResponse>), AppError> {
    let invite = state
        .invite_service
        .create_invite(&claims.account_id, &room_id)
        .await?;
    Ok((StatusCode::CREATED, Json(invite)))
}

/// GET /rooms/:room_id/invites
#[instrument(name = "list_invites", skip(state, claims))]
pub async fn list_invites(
    State(state): State<AppState>,
    claims: SessionClaims,
    Path(room_id): Path<String>,
) -> Result<Json<Vec<InviteResponse>>, AppError> {
    let invites = state
        .invite_service
        .list_invites(&claims.account_id, &room_id)
        .await?;
    Ok(Json(invites))
}
