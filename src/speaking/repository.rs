use async_trait::async_trait;
use sqlx::{postgres::PgRow, PgConnection, PgPool, Row};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use super::models::{SpeakingRequestModel, SpeakingRequestStatus};
use crate::db::is_unique_violation;
use crate::shared::AppError;

#[async_trait]
pub trait SpeakingRequestRepository {
    /// Fails with `AppError::Conflict` if the member already has a pending request
    async fn create_request(&self, request: &SpeakingRequestModel) -> Result<(), AppError>;
    async fn get_pending_request(
        &self,
        room_id: &str,
        account_id: &str,
    ) -> Result<Option<SpeakingRequestModel>, AppError>;
    async fn update_request(&self, request: &SpeakingRequestModel) -> Result<(), AppError>;

    /// Pending requests of a room, oldest first
    async fn list_pending_requests(
        &self,
        room_id: &str,
    ) -> Result<Vec<SpeakingRequestModel>, AppError>;
}

/// In-memory implementation of SpeakingRequestRepository for development and testing
pub struct InMemorySpeakingRequestRepository {
    requests: RwLock<HashMap<String, SpeakingRequestModel>>,
}

impl Default for InMemorySpeakingRequestRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemorySpeakingRequestRepository {
    pub fn new() -> Self {
        Self {
            requests: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl SpeakingRequestRepository for InMemorySpeakingRequestRepository {
    #[instrument(skip(self, request))]
    async fn create_request(&self, request: &SpeakingRequestModel) -> Result<(), AppError> {
        let mut requests = self.requests.write().await;

        let duplicate = requests.values().any(|r| {
            r.is_pending() && r.room_id == request.room_id && r.account_id == request.account_id
        });
        if duplicate {
            return Err(AppError::Conflict(
                "A speaking request is already pending".to_string(),
            ));
        }

        requests.insert(request.id.clone(), request.clone());
        debug!(request_id = %request.id, "Speaking request stored in memory");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_pending_request(
        &self,
        room_id: &str,
        account_id: &str,
    ) -> Result<Option<SpeakingRequestModel>, AppError> {
        let requests = self.requests.read().await;
        Ok(requests
            .values()
            .find(|r| r.is_pending() && r.room_id == room_id && r.account_id == account_id)
            .cloned())
    }

    #[instrument(skip(self, request))]
    async fn update_request(&self, request: &SpeakingRequestModel) -> Result<(), AppError> {
        let mut requests = self.requests.write().await;
        match requests.get_mut(&request.id) {
            Some(stored) => {
                *stored = request.clone();
                Ok(())
            }
            None => {
                warn!(request_id = %request.id, "Speaking request not found for update");
                Err(AppError::NotFound("Speaking request not found".to_string()))
            }
        }
    }

    #[instrument(skip(self))]
    async fn list_pending_requests(
        &self,
        room_id: &str,
    ) -> Result<Vec<SpeakingRequestModel>, AppError> {
        let requests = self.requests.read().await;
        let mut pending: Vec<SpeakingRequestModel> = requests
            .values()
            .filter(|r| r.is_pending() && r.room_id == room_id)
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.requested_at.cmp(&b.requested_at));
        Ok(pending)
    }
}

/// Writes the status of a request on an open connection or transaction
pub(crate) async fn store_request_status(
    conn: &mut PgConnection,
    request: &SpeakingRequestModel,
) -> Result<(), AppError> {
    let result =
        sqlx::query("UPDATE speaking_requests SET status = $2, responded_at = $3 WHERE id = $1")
            .bind(&request.id)
            .bind(request.status.as_str())
            .bind(request.responded_at)
            .execute(&mut *conn)
            .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Speaking request not found".to_string()));
    }
    Ok(())
}

/// PostgreSQL implementation of speaking request repository
pub struct PostgresSpeakingRequestRepository {
    pool: PgPool,
}

impl PostgresSpeakingRequestRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const REQUEST_COLUMNS: &str = "id, account_id, room_id, status, requested_at, responded_at";

fn request_from_row(row: &PgRow) -> Result<SpeakingRequestModel, AppError> {
    let status: String = row.try_get("status")?;
    let status = status
        .parse::<SpeakingRequestStatus>()
        .map_err(AppError::DatabaseError)?;

    Ok(SpeakingRequestModel {
        id: row.try_get("id")?,
        account_id: row.try_get("account_id")?,
        room_id: row.try_get("room_id")?,
        status,
        requested_at: row.try_get("requested_at")?,
        responded_at: row.try_get("responded_at")?,
    })
}

#[async_trait]
impl SpeakingRequestRepository for PostgresSpeakingRequestRepository {
    #[instrument(skip(self, request))]
    async fn create_request(&self, request: &SpeakingRequestModel) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO speaking_requests (id, account_id, room_id, status, requested_at, responded_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&request.id)
        .bind(&request.account_id)
        .bind(&request.room_id)
        .bind(request.status.as_str())
        .bind(request.requested_at)
        .bind(request.responded_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict("A speaking request is already pending".to_string())
            } else {
                AppError::from(e)
            }
        })?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_pending_request(
        &self,
        room_id: &str,
        account_id: &str,
    ) -> Result<Option<SpeakingRequestModel>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM speaking_requests WHERE room_id = $1 AND account_id = $2 AND status = 'pending'",
            REQUEST_COLUMNS
        ))
        .bind(room_id)
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(request_from_row).transpose()
    }

    #[instrument(skip(self, request))]
    async fn update_request(&self, request: &SpeakingRequestModel) -> Result<(), AppError> {
        let mut conn = self.pool.acquire().await?;
        store_request_status(&mut conn, request).await
    }

    #[instrument(skip(self))]
    async fn list_pending_requests(
        &self,
        room_id: &str,
    ) -> Result<Vec<SpeakingRequestModel>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM speaking_requests WHERE room_id = $1 AND status = 'pending' \
             ORDER BY requested_at",
            REQUEST_COLUMNS
        ))
        .bind(room_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(request_from_row).collect()
    }
}
