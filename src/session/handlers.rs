use axum::{extract::State, http::StatusCode, Json};
use tracing::{info, instrument};

use super::types::SessionClaims;
use crate::account::types::{AuthResponse, LoginRequest};
use crate::shared::{AppError, AppState};

/// POST /session
/// Logs in by username and returns a bearer token
#[instrument(name = "login", skip(state, request))]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let auth = state.account_service.login(&request.username).await?;

    info!(
        account_id = %auth.account.id,
        token_length = auth.token.len(),
        "Session created successfully"
    );

    Ok(Json(auth))
}

/// DELETE /session
/// Revokes the caller's session
#[instrument(name = "logout", skip(state, claims))]
pub async fn logout(
    State(state): State<AppState>,
    claims: SessionClaims,
) -> Result<StatusCode, AppError> {
    state.account_service.logout(&claims).await?;
    Ok(StatusCode::NO_CONTENT)
}
