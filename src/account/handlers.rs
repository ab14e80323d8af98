use axum::{extract::State, http::StatusCode, Json};
use tracing::{info, instrument};

use super::types::{AccountResponse, AuthResponse, RegisterRequest};
use crate::session::SessionClaims;
use crate::shared::{AppError, AppState};

/// POST /accounts
#[instrument(name = "register", skip(state, request))]
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let auth = state.account_service.register(request).await?;
    info!(account_id = %auth.account.id, "Account registered");
    Ok((StatusCode::CREATED, Json(auth)))
}

/// GET /me
#[instrument(name = "me", skip(state, claims))]
pub async fn me(
    State(state): State<AppState>,
    claims: SessionClaims,
) -> Result<Json<AccountResponse>, AppError> {
    Ok(Json(state.account_service.me(&claims.account_id).await?))
}
