use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::{
    models::AccountModel,
    repository::AccountRepository,
    types::{AccountResponse, AuthResponse, RegisterRequest},
};
use crate::session::{service::SessionService, SessionClaims};
use crate::shared::AppError;

const USERNAME_MIN_LEN: usize = 3;
const USERNAME_MAX_LEN: usize = 50;
const DISPLAY_NAME_MAX_LEN: usize = 100;

pub fn validate_username(username: &str) -> Result<(), AppError> {
    let len = username.chars().count();
    if !(USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&len) {
        return Err(AppError::BadRequest(format!(
            "Username must be {}-{} characters",
            USERNAME_MIN_LEN, USERNAME_MAX_LEN
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(AppError::BadRequest(
            "Username may only contain letters, digits, '_' and '-'".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), AppError> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(AppError::BadRequest("Email address is invalid".to_string())),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Registration, login and presence
pub struct AccountService {
    repository: Arc<dyn AccountRepository + Send + Sync>,
    session_service: Arc<SessionService>,
}

impl AccountService {
    pub fn new(
        repository: Arc<dyn AccountRepository + Send + Sync>,
        session_service: Arc<SessionService>,
    ) -> Self {
        Self {
            repository,
            session_service,
        }
    }

    #[instrument(skip(self, request), fields(username = %request.username))]
    pub async fn register(&self, request: RegisterRequest) -> Result<AuthResponse, AppError> {
        let username = request.username.trim().to_string();
        validate_username(&username)?;

        let email = non_empty(request.email);
        if let Some(email) = &email {
            validate_email(email)?;
        }

        let display_name = non_empty(request.display_name).unwrap_or_else(|| username.clone());
        if display_name.chars().count() > DISPLAY_NAME_MAX_LEN {
            return Err(AppError::BadRequest(format!(
                "Display name must be at most {} characters",
                DISPLAY_NAME_MAX_LEN
            )));
        }

        let account = AccountModel::new(username, display_name, email, non_empty(request.bio));
        self.repository.create_account(&account).await?;

        info!(account_id = %account.id, "Account registered");
        self.issue(account).await
    }

    #[instrument(skip(self))]
    pub async fn login(&self, username: &str) -> Result<AuthResponse, AppError> {
        let mut account = self
            .repository
            .get_account_by_username(username.trim())
            .await?
            .ok_or_else(|| {
                warn!("Login attempted for unknown username");
                AppError::NotFound("Account not found".to_string())
            })?;

        account.set_online(true);
        self.repository.update_account(&account).await?;

        info!(account_id = %account.id, "Account logged in");
        self.issue(account).await
    }

    #[instrument(skip(self, claims), fields(account_id = %claims.account_id))]
    pub async fn logout(&self, claims: &SessionClaims) -> Result<(), AppError> {
        self.session_service
            .revoke_session(&claims.session_id)
            .await?;

        if let Some(mut account) = self.repository.get_account(&claims.account_id).await? {
            account.set_online(false);
            self.repository.update_account(&account).await?;
        }

        info!("Account logged out");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn me(&self, account_id: &str) -> Result<AccountResponse, AppError> {
        self.repository
            .get_account(account_id)
            .await?
            .map(AccountResponse::from)
            .ok_or_else(|| AppError::NotFound("Account not found".to_string()))
    }

    async fn issue(&self, account: AccountModel) -> Result<AuthResponse, AppError> {
        let session = self
            .session_service
            .start_session(&account.id, &account.username)
            .await?;

        Ok(AuthResponse {
            token: session.token,
            expires_at: session.expires_at,
            account: account.into(),
        })
    }
}
