use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

use crate::account::{
    repository::{AccountRepository, InMemoryAccountRepository, PostgresAccountRepository},
    service::AccountService,
};
use crate::config::AppConfig;
use crate::event::{EventBus, RoomSubscriptions};
use crate::invite::{
    generator::RandomInviteCodeGenerator,
    repository::{InMemoryInviteRepository, InviteRepository, PostgresInviteRepository},
    service::InviteService,
};
use crate::room::{
    errors::RoomError,
    locks::RoomLocks,
    repository::{InMemoryRoomRepository, PostgresRoomRepository, RoomRepository},
    service::RoomService,
};
use crate::session::{
    repository::{InMemorySessionRepository, PostgresSessionRepository, SessionRepository},
    service::SessionService,
    token::TokenConfig,
};
use crate::speaking::{
    repository::{
        InMemorySpeakingRequestRepository, PostgresSpeakingRequestRepository,
        SpeakingRequestRepository,
    },
    service::SpeakingService,
};
use crate::telephony::{TelephonyBridge, TelephonyQueue};
use crate::websockets::{ConnectionManager, WebSocketRoomSubscriber};

/// Every store the application reads and writes
#[derive(Clone)]
pub struct Stores {
    pub accounts: Arc<dyn AccountRepository + Send + Sync>,
    pub sessions: Arc<dyn SessionRepository + Send + Sync>,
    pub rooms: Arc<dyn RoomRepository + Send + Sync>,
    pub speaking_requests: Arc<dyn SpeakingRequestRepository + Send + Sync>,
    pub invites: Arc<dyn InviteRepository + Send + Sync>,
}

impl Stores {
    /// Stores that live for the lifetime of the process only
    pub fn in_memory() -> Self {
        let invites: Arc<dyn InviteRepository + Send + Sync> =
            Arc::new(InMemoryInviteRepository::new());
        let speaking_requests: Arc<dyn SpeakingRequestRepository + Send + Sync> =
            Arc::new(InMemorySpeakingRequestRepository::new());

        Self {
            accounts: Arc::new(InMemoryAccountRepository::new()),
            sessions: Arc::new(InMemorySessionRepository::new()),
            // Joins and leaves also write the linked invite and request
            rooms: Arc::new(InMemoryRoomRepository::new(
                Arc::clone(&invites),
                Arc::clone(&speaking_requests),
            )),
            speaking_requests,
            invites,
        }
    }

    /// Stores backed by a PostgreSQL pool with the schema already applied
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            accounts: Arc::new(PostgresAccountRepository::new(pool.clone())),
            sessions: Arc::new(PostgresSessionRepository::new(pool.clone())),
            rooms: Arc::new(PostgresRoomRepository::new(pool.clone())),
            speaking_requests: Arc::new(PostgresSpeakingRequestRepository::new(pool.clone())),
            invites: Arc::new(PostgresInviteRepository::new(pool)),
        }
    }
}

/// Shared application state containing all dependencies
#[derive(Clone)]
pub struct AppState {
    pub session_service: Arc<SessionService>,
    pub account_service: Arc<AccountService>,
    pub room_service: Arc<RoomService>,
    pub speaking_service: Arc<SpeakingService>,
    pub invite_service: Arc<InviteService>,
    pub connection_manager: Arc<dyn ConnectionManager>,
    pub subscriptions: RoomSubscriptions,
}

impl AppState {
    /// Wires services on top of the given stores, push channel and telephony bridge
    pub fn new(
        config: &AppConfig,
        stores: Stores,
        telephony: Arc<dyn TelephonyBridge>,
        connection_manager: Arc<dyn ConnectionManager>,
    ) -> Self {
        let event_bus = EventBus::new(config.event_channel_capacity);
        let locks = RoomLocks::new();
        let telephony = TelephonyQueue::new(telephony);

        let session_service = Arc::new(SessionService::new(
            Arc::clone(&stores.sessions),
            TokenConfig::new(config.jwt_secret.clone(), config.session_expiration_days),
        ));

        let account_service = Arc::new(AccountService::new(
            Arc::clone(&stores.accounts),
            Arc::clone(&session_service),
        ));

        let room_service = Arc::new(RoomService::new(
            Arc::clone(&stores.rooms),
            Arc::clone(&stores.accounts),
            Arc::clone(&stores.invites),
            Arc::clone(&stores.speaking_requests),
            locks.clone(),
            event_bus.clone(),
            telephony.clone(),
            Arc::clone(&connection_manager),
            config.max_room_capacity,
        ));

        let speaking_service = Arc::new(SpeakingService::new(
            Arc::clone(&stores.rooms),
            Arc::clone(&stores.speaking_requests),
            Arc::clone(&stores.accounts),
            locks.clone(),
            event_bus.clone(),
            telephony,
        ));

        let invite_service = Arc::new(InviteService::new(
            Arc::clone(&stores.rooms),
            Arc::clone(&stores.invites),
            locks,
            Arc::new(RandomInviteCodeGenerator),
        ));

        let subscriber = Arc::new(WebSocketRoomSubscriber::new(Arc::clone(
            &connection_manager,
        )));
        let subscriptions = RoomSubscriptions::new(event_bus.clone(), subscriber);

        Self {
            session_service,
            account_service,
            room_service,
            speaking_service,
            invite_service,
            connection_manager,
            subscriptions,
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("JWT error: {0}")]
    JwtError(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error(transparent)]
    Room(#[from] RoomError),

    #[error("Internal server error")]
    Internal,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::JwtError(_) | AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Room(err) => err.status_code(),
            AppError::DatabaseError(_) | AppError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        warn!(error = %err, "Database operation failed");
        AppError::DatabaseError(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_message = match &self {
            AppError::DatabaseError(_) | AppError::Internal => {
                "Internal server error".to_string()
            }
            AppError::JwtError(msg)
            | AppError::Unauthorized(msg)
            | AppError::Forbidden(msg)
            | AppError::BadRequest(msg)
            | AppError::Conflict(msg)
            | AppError::NotFound(msg)
            | AppError::Upstream(msg) => msg.clone(),
            AppError::Room(err) => err.to_string(),
        };

        let body = Json(json!({
            "error": error_message
        }));

        (status, body).into_response()
    }
}
