use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use super::models::InviteModel;
use crate::db::is_unique_violation;
use crate::shared::AppError;

/// Outcome of storing a new invite
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InviteInsert {
    Created,
    /// Another invite already uses the code
    CodeTaken,
}

#[async_trait]
pub trait InviteRepository {
    async fn create_invite(&self, invite: &InviteModel) -> Result<InviteInsert, AppError>;
    async fn get_invite_by_code(&self, code: &str) -> Result<Option<InviteModel>, AppError>;
    async fn update_invite(&self, invite: &InviteModel) -> Result<(), AppError>;

    /// Invites of a room, newest first
    async fn list_invites(&self, room_id: &str) -> Result<Vec<InviteModel>, AppError>;
}

/// In-memory implementation of InviteRepository for development and testing
pub struct InMemoryInviteRepository {
    // code -> invite
    invites: RwLock<HashMap<String, InviteModel>>,
}

impl Default for InMemoryInviteRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryInviteRepository {
    pub fn new() -> Self {
        Self {
            invites: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl InviteRepository for InMemoryInviteRepository {
    #[instrument(skip(self, invite))]
    async fn create_invite(&self, invite: &InviteModel) -> Result<InviteInsert, AppError> {
        let mut invites = self.invites.write().await;
        if invites.contains_key(&invite.code) {
            debug!(room_id = %invite.room_id, "Invite code collision in memory");
            return Ok(InviteInsert::CodeTaken);
        }
        invites.insert(invite.code.clone(), invite.clone());
        Ok(InviteInsert::Created)
    }

    #[instrument(skip(self, code))]
    async fn get_invite_by_code(&self, code: &str) -> Result<Option<InviteModel>, AppError> {
        Ok(self.invites.read().await.get(code).cloned())
    }

    #[instrument(skip(self, invite))]
    async fn update_invite(&self, invite: &InviteModel) -> Result<(), AppError> {
        let mut invites = self.invites.write().await;
        match invites.get_mut(&invite.code) {
            Some(stored) if stored.id == invite.id => {
                *stored = invite.clone();
                Ok(())
            }
            _ => Err(AppError::NotFound("Invite not found".to_string())),
        }
    }

    #[instrument(skip(self))]
    async fn list_invites(&self, room_id: &str) -> Result<Vec<InviteModel>, AppError> {
        let invites = self.invites.read().await;
        let mut listed: Vec<InviteModel> = invites
            .values()
            .filter(|invite| invite.room_id == room_id)
            .cloned()
            .collect();
        listed.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(listed)
    }
}

/// Writes the used state of an invite on an open connection or transaction
pub(crate) async fn store_invite_use(
    conn: &mut PgConnection,
    invite: &InviteModel,
) -> Result<(), AppError> {
    let result = sqlx::query(
        "UPDATE room_invites SET is_used = $2, used_by = $3, used_at = $4 WHERE id = $1",
    )
    .bind(&invite.id)
    .bind(invite.is_used)
    .bind(&invite.used_by)
    .bind(invite.used_at)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Invite not found".to_string()));
    }
    Ok(())
}

/// PostgreSQL implementation of invite repository
pub struct PostgresInviteRepository {
    pool: PgPool,
}

impl PostgresInviteRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const INVITE_COLUMNS: &str = "id, room_id, code, is_used, created_by, used_by, created_at, used_at";

#[async_trait]
impl InviteRepository for PostgresInviteRepository {
    #[instrument(skip(self, invite))]
    async fn create_invite(&self, invite: &InviteModel) -> Result<InviteInsert, AppError> {
        let result = sqlx::query(
            "INSERT INTO room_invites (id, room_id, code, is_used, created_by, used_by, created_at, used_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(&invite.id)
        .bind(&invite.room_id)
        .bind(&invite.code)
        .bind(invite.is_used)
        .bind(&invite.created_by)
        .bind(&invite.used_by)
        .bind(invite.created_at)
        .bind(invite.used_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(InviteInsert::Created),
            Err(e) if is_unique_violation(&e) => Ok(InviteInsert::CodeTaken),
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self, code))]
    async fn get_invite_by_code(&self, code: &str) -> Result<Option<InviteModel>, AppError> {
        let invite = sqlx::query_as::<_, InviteModel>(&format!(
            "SELECT {} FROM room_invites WHERE code = $1",
            INVITE_COLUMNS
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(invite)
    }

    #[instrument(skip(self, invite))]
    async fn update_invite(&self, invite: &InviteModel) -> Result<(), AppError> {
        let mut conn = self.pool.acquire().await?;
        store_invite_use(&mut conn, invite).await
    }

    #[instrument(skip(self))]
    async fn list_invites(&self, room_id: &str) -> Result<Vec<InviteModel>, AppError> {
        let invites = sqlx::query_as::<_, InviteModel>(&format!(
            "SELECT {} FROM room_invites WHERE room_id = $1 ORDER BY created_at DESC",
            INVITE_COLUMNS
        ))
        .bind(room_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(invites)
    }
}
