use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::{
    models::SessionModel, repository::SessionRepository, token::TokenConfig, types::SessionClaims,
};
use crate::shared::AppError;

/// A stored session and the token that proves it
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub session_id: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Issues, validates and revokes sessions
pub struct SessionService {
    token_config: TokenConfig,
    repository: Arc<dyn SessionRepository + Send + Sync>,
}

impl SessionService {
    pub fn new(
        repository: Arc<dyn SessionRepository + Send + Sync>,
        token_config: TokenConfig,
    ) -> Self {
        Self {
            token_config,
            repository,
        }
    }

    /// Stores a new session for the account and signs a token for it
    #[instrument(skip(self))]
    pub async fn start_session(
        &self,
        account_id: &str,
        username: &str,
    ) -> Result<IssuedSession, AppError> {
        let session = SessionModel::new(account_id.to_string(), self.token_config.expiration_days);
        self.repository.create_session(&session).await?;

        let token = self.token_config.create_token(
            session.id.clone(),
            account_id.to_string(),
            username.to_string(),
        )?;

        info!(session_id = %session.id, account_id = %account_id, "Session started");

        Ok(IssuedSession {
            session_id: session.id,
            token,
            expires_at: session.expires_at,
        })
    }

    /// Validates a session token and returns the claims if valid
    #[instrument(skip(self, token))]
    pub async fn validate_session(&self, token: &str) -> Result<SessionClaims, AppError> {
        // First validate JWT token structure and signature
        let claims = self.token_config.validate_token(token)?;

        // Then check the session still exists and hasn't been revoked
        match self.repository.get_session(&claims.session_id).await? {
            Some(session) if session.account_id != claims.account_id => {
                warn!(session_id = %claims.session_id, "Token account does not match session");
                Err(AppError::Unauthorized("Session does not match token".to_string()))
            }
            Some(session) if session.is_expired() => {
                warn!(session_id = %claims.session_id, "Session has expired");
                Err(AppError::Unauthorized("Session has expired".to_string()))
            }
            Some(_) => Ok(claims),
            None => {
                warn!(
                    session_id = %claims.session_id,
                    "Session not found in database - may have been revoked"
                );
                Err(AppError::Unauthorized(
                    "Session not found or has been revoked".to_string(),
                ))
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn revoke_session(&self, session_id: &str) -> Result<(), AppError> {
        self.repository.delete_session(session_id).await?;
        info!(session_id = %session_id, "Session revoked");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn cleanup_expired_sessions(&self) -> Result<u64, AppError> {
        let removed_count = self.repository.cleanup_expired_sessions().await?;

        info!(
            removed_sessions = removed_count,
            "Expired sessions cleanup completed"
        );
        Ok(removed_count)
    }
}
