use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use super::models::AccountModel;
use crate::db::is_unique_violation;
use crate::shared::AppError;

#[async_trait]
pub trait AccountRepository {
    /// Fails with `AppError::Conflict` when the username is taken
    async fn create_account(&self, account: &AccountModel) -> Result<(), AppError>;
    async fn get_account(&self, account_id: &str) -> Result<Option<AccountModel>, AppError>;
    async fn get_account_by_username(
        &self,
        username: &str,
    ) -> Result<Option<AccountModel>, AppError>;

    /// Accounts for the given ids; unknown ids are skipped
    async fn get_accounts(&self, account_ids: &[String]) -> Result<Vec<AccountModel>, AppError>;
    async fn update_account(&self, account: &AccountModel) -> Result<(), AppError>;
}

/// In-memory implementation of AccountRepository for development and testing
pub struct InMemoryAccountRepository {
    accounts: RwLock<HashMap<String, AccountModel>>,
}

impl Default for InMemoryAccountRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryAccountRepository {
    pub fn new() -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl AccountRepository for InMemoryAccountRepository {
    #[instrument(skip(self, account))]
    async fn create_account(&self, account: &AccountModel) -> Result<(), AppError> {
        debug!(account_id = %account.id, username = %account.username, "Creating account in memory");

        let mut accounts = self.accounts.write().await;
        if accounts.values().any(|a| a.username == account.username) {
            return Err(AppError::Conflict("Username is already taken".to_string()));
        }
        if accounts.contains_key(&account.id) {
            warn!(account_id = %account.id, "Account already exists in memory");
            return Err(AppError::DatabaseError("Account already exists".to_string()));
        }
        accounts.insert(account.id.clone(), account.clone());

        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_account(&self, account_id: &str) -> Result<Option<AccountModel>, AppError> {
        Ok(self.accounts.read().await.get(account_id).cloned())
    }

    #[instrument(skip(self))]
    async fn get_account_by_username(
        &self,
        username: &str,
    ) -> Result<Option<AccountModel>, AppError> {
        let accounts = self.accounts.read().await;
        Ok(accounts.values().find(|a| a.username == username).cloned())
    }

    #[instrument(skip(self, account_ids))]
    async fn get_accounts(&self, account_ids: &[String]) -> Result<Vec<AccountModel>, AppError> {
        let accounts = self.accounts.read().await;
        Ok(account_ids
            .iter()
            .filter_map(|id| accounts.get(id).cloned())
            .collect())
    }

    #[instrument(skip(self, account))]
    async fn update_account(&self, account: &AccountModel) -> Result<(), AppError> {
        let mut accounts = self.accounts.write().await;
        match accounts.get_mut(&account.id) {
            Some(stored) => {
                *stored = account.clone();
                Ok(())
            }
            None => Err(AppError::NotFound("Account not found".to_string())),
        }
    }
}

/// PostgreSQL implementation of account repository
pub struct PostgresAccountRepository {
    pool: PgPool,
}

impl PostgresAccountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const ACCOUNT_COLUMNS: &str =
    "id, username, display_name, email, bio, is_online, last_seen, created_at";

#[async_trait]
impl AccountRepository for PostgresAccountRepository {
    #[instrument(skip(self, account))]
    async fn create_account(&self, account: &AccountModel) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO accounts (id, username, display_name, email, bio, is_online, last_seen, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(&account.id)
        .bind(&account.username)
        .bind(&account.display_name)
        .bind(&account.email)
        .bind(&account.bio)
        .bind(account.is_online)
        .bind(account.last_seen)
        .bind(account.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict("Username is already taken".to_string())
            } else {
                AppError::from(e)
            }
        })?;

        debug!(account_id = %account.id, "Account created in database");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_account(&self, account_id: &str) -> Result<Option<AccountModel>, AppError> {
        let account = sqlx::query_as::<_, AccountModel>(&format!(
            "SELECT {} FROM accounts WHERE id = $1",
            ACCOUNT_COLUMNS
        ))
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    #[instrument(skip(self))]
    async fn get_account_by_username(
        &self,
        username: &str,
    ) -> Result<Option<AccountModel>, AppError> {
        let account = sqlx::query_as::<_, AccountModel>(&format!(
            "SELECT {} FROM accounts WHERE username = $1",
            ACCOUNT_COLUMNS
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    #[instrument(skip(self, account_ids))]
    async fn get_accounts(&self, account_ids: &[String]) -> Result<Vec<AccountModel>, AppError> {
        if account_ids.is_empty() {
            return Ok(Vec::new());
        }

        let accounts = sqlx::query_as::<_, AccountModel>(&format!(
            "SELECT {} FROM accounts WHERE id = ANY($1)",
            ACCOUNT_COLUMNS
        ))
        .bind(account_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(accounts)
    }

    #[instrument(skip(self, account))]
    async fn update_account(&self, account: &AccountModel) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE accounts SET display_name = $2, email = $3, bio = $4, is_online = $5, \
             last_seen = $6 WHERE id = $1",
        )
        .bind(&account.id)
        .bind(&account.display_name)
        .bind(&account.email)
        .bind(&account.bio)
        .bind(account.is_online)
        .bind(account.last_seen)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Account not found".to_string()));
        }
        Ok(())
    }
}
