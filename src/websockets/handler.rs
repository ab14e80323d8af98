use async_trait::async_trait;
use axum::{
    extract::{ws::WebSocket, Path, State, WebSocketUpgrade},
    http::HeaderMap,
    response::Response,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{
    messages::{MessageType, ToggleVideoPayload, WebSocketMessage},
    socket::{Connection, HandlerOutcome, MessageHandler},
};
use crate::room::{errors::RoomError, service::RoomService};
use crate::session::SessionClaims;
use crate::shared::{AppError, AppState};
use crate::speaking::service::SpeakingService;

const PROTOCOL_HEADER: &str = "sec-websocket-protocol";

/// Message handler for receiving WebSocket messages from the client
pub struct WebsocketReceiveHandler {
    room_service: Arc<RoomService>,
    speaking_service: Arc<SpeakingService>,
}

impl WebsocketReceiveHandler {
    pub fn new(room_service: Arc<RoomService>, speaking_service: Arc<SpeakingService>) -> Self {
        Self {
            room_service,
            speaking_service,
        }
    }
}

#[async_trait]
impl MessageHandler for WebsocketReceiveHandler {
    async fn handle_message(
        &self,
        account_id: &str,
        room_id: &str,
        message: String,
    ) -> Result<HandlerOutcome, AppError> {
        let ws_message = serde_json::from_str::<WebSocketMessage>(&message).map_err(|e| {
            warn!(account_id = %account_id, room_id = %room_id, error = %e, "Unparseable message");
            AppError::BadRequest("Malformed message".to_string())
        })?;

        debug!(
            account_id = %account_id,
            room_id = %room_id,
            message_type = ?ws_message.message_type,
            "Received message"
        );

        match ws_message.message_type {
            MessageType::RequestSpeak => {
                self.speaking_service
                    .request_to_speak(account_id, room_id)
                    .await?;
            }
            MessageType::StartSpeaking => {
                self.speaking_service
                    .start_speaking(account_id, room_id)
                    .await?;
            }
            MessageType::StopSpeaking => {
                self.speaking_service
                    .stop_speaking(account_id, room_id)
                    .await?;
            }
            MessageType::Leave => {
                self.room_service.leave_room(account_id, room_id).await?;
                return Ok(HandlerOutcome::Close);
            }
            MessageType::ToggleVideo => {
                let payload = serde_json::from_value::<ToggleVideoPayload>(ws_message.payload)
                    .map_err(|_| AppError::BadRequest("video_enabled is required".to_string()))?;
                self.room_service
                    .toggle_video(account_id, room_id, payload.video_enabled)
                    .await?;
            }
            MessageType::RefreshMembers => {
                let (seq, members) = self.room_service.sequenced_snapshot(room_id).await?;
                let reply = WebSocketMessage::members_snapshot(room_id, seq, members)
                    .and_then(|message| message.to_json())
                    .map_err(|e| {
                        warn!(room_id = %room_id, error = %e, "Failed to encode snapshot");
                        AppError::Internal
                    })?;
                return Ok(HandlerOutcome::Reply(reply));
            }
            other => {
                return Err(AppError::BadRequest(format!(
                    "Unsupported message type: {:?}",
                    other
                )));
            }
        }

        Ok(HandlerOutcome::Continue)
    }
}

/// First protocol offered in `Sec-WebSocket-Protocol`, which carries the session token
pub fn protocol_token(headers: &HeaderMap) -> Result<&str, AppError> {
    headers
        .get(PROTOCOL_HEADER)
        .and_then(|h| h.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Missing authentication token".to_string()))
}

/// WebSocket endpoint that handles authentication via Sec-WebSocket-Protocol header
/// GET /ws/:room_id with JWT token in Sec-WebSocket-Protocol header
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Path(room_id): Path<String>,
    headers: HeaderMap,
    State(app_state): State<AppState>,
) -> Result<Response, AppError> {
    info!(room_id = %room_id, "WebSocket connection requested");

    let token = protocol_token(&headers).inspect_err(|_| {
        warn!("Missing or invalid Sec-WebSocket-Protocol header");
    })?;
    let claims = app_state.session_service.validate_session(token).await?;

    // Unknown room is 404, known room without membership is 403
    app_state.room_service.get_room(&room_id).await?;
    if !app_state
        .room_service
        .is_member(&room_id, &claims.account_id)
        .await?
    {
        warn!(
            room_id = %room_id,
            account_id = %claims.account_id,
            "Rejecting WebSocket connection from non-member"
        );
        return Err(AppError::Forbidden(
            "Only room members can connect".to_string(),
        ));
    }

    info!(
        room_id = %room_id,
        account_id = %claims.account_id,
        "Room membership verified, establishing WebSocket connection"
    );

    let token = token.to_string();
    Ok(ws
        .protocols([token])
        .on_upgrade(move |socket| handle_websocket_connection(socket, room_id, claims, app_state)))
}

/// Handle the upgraded WebSocket connection
async fn handle_websocket_connection(
    socket: WebSocket,
    room_id: String,
    claims: SessionClaims,
    app_state: AppState,
) {
    let account_id = claims.account_id;
    info!(room_id = %room_id, account_id = %account_id, "WebSocket connection established");

    // Create the outbound channel (app -> client)
    let (outbound_sender, outbound_receiver) = mpsc::unbounded_channel::<String>();

    app_state.subscriptions.ensure_started(&room_id).await;
    app_state
        .connection_manager
        .add_connection(&room_id, &account_id, outbound_sender.clone())
        .await;

    // Send the current member list to the newly connected socket
    match app_state.room_service.sequenced_snapshot(&room_id).await {
        Ok((seq, members)) => {
            match WebSocketMessage::members_snapshot(&room_id, seq, members)
                .and_then(|message| message.to_json())
            {
                Ok(json) => {
                    let _ = outbound_sender.send(json);
                    debug!(room_id = %room_id, seq, "Sent initial members_updated");
                }
                Err(e) => warn!(room_id = %room_id, error = %e, "Failed to encode snapshot"),
            }
        }
        Err(e) => warn!(room_id = %room_id, error = %e, "Failed to load member snapshot"),
    }
    drop(outbound_sender);

    let message_handler = Arc::new(WebsocketReceiveHandler::new(
        Arc::clone(&app_state.room_service),
        Arc::clone(&app_state.speaking_service),
    ));

    let connection = Connection::new(
        account_id.clone(),
        room_id.clone(),
        Box::new(socket),
        outbound_receiver,
        message_handler,
    );

    match connection.run().await {
        Ok(()) => {
            info!(
                room_id = %room_id,
                account_id = %account_id,
                "WebSocket connection closed cleanly"
            );
        }
        Err(e) => {
            warn!(
                room_id = %room_id,
                account_id = %account_id,
                error = ?e,
                "WebSocket connection error"
            );
        }
    }

    release_socket(&app_state, &room_id, &account_id).await;
}

/// Unregisters a closed socket. Disconnecting keeps the membership, but nobody
/// speaks through a closed socket unless a newer one of theirs is still open.
async fn release_socket(app_state: &AppState, room_id: &str, account_id: &str) {
    let last_socket = app_state
        .connection_manager
        .remove_connection(room_id, account_id)
        .await;
    if !last_socket {
        debug!(
            room_id = %room_id,
            account_id = %account_id,
            "Replaced socket closed, newer one keeps the speaking state"
        );
        return;
    }

    match app_state
        .speaking_service
        .stop_speaking(account_id, room_id)
        .await
    {
        Ok(_) | Err(AppError::Room(RoomError::NotMember)) => {}
        Err(e) => {
            warn!(
                room_id = %room_id,
                account_id = %account_id,
                error = %e,
                "Failed to stop speaking on disconnect"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::room::types::RoomCreateRequest;
    use crate::shared::Stores;
    use crate::telephony::DisabledTelephony;
    use crate::websockets::InMemoryConnectionManager;
    use axum::http::HeaderValue;

    #[test]
    fn test_protocol_token() {
        let mut headers = HeaderMap::new();
        assert!(matches!(
            protocol_token(&headers),
            Err(AppError::Unauthorized(_))
        ));

        headers.insert(PROTOCOL_HEADER, HeaderValue::from_static("abc.def.ghi"));
        assert_eq!(protocol_token(&headers).unwrap(), "abc.def.ghi");

        headers.insert(PROTOCOL_HEADER, HeaderValue::from_static("abc.def.ghi, json"));
        assert_eq!(protocol_token(&headers).unwrap(), "abc.def.ghi");

        headers.insert(PROTOCOL_HEADER, HeaderValue::from_static(" "));
        assert!(protocol_token(&headers).is_err());
    }

    #[tokio::test]
    async fn test_closing_a_replaced_socket_keeps_speaking_state() {
        let state = AppState::new(
            &AppConfig::default(),
            Stores::in_memory(),
            Arc::new(DisabledTelephony),
            Arc::new(InMemoryConnectionManager::new()),
        );
        let room = state
            .room_service
            .create_room(
                "alice",
                RoomCreateRequest {
                    name: "Standup".to_string(),
                    description: None,
                    is_public: true,
                    max_participants: 5,
                },
            )
            .await
            .unwrap();
        state
            .speaking_service
            .start_speaking("alice", &room.id)
            .await
            .unwrap();

        let (old_tx, old_rx) = mpsc::unbounded_channel();
        let (new_tx, new_rx) = mpsc::unbounded_channel();
        state
            .connection_manager
            .add_connection(&room.id, "alice", old_tx)
            .await;
        state
            .connection_manager
            .add_connection(&room.id, "alice", new_tx)
            .await;

        // The first socket goes away after the reconnect
        drop(old_rx);
        release_socket(&state, &room.id, "alice").await;
        let members = state.room_service.list_members(&room.id).await.unwrap();
        assert!(members[0].is_speaking);

        drop(new_rx);
        release_socket(&state, &room.id, "alice").await;
        let members = state.room_service.list_members(&room.id).await.unwrap();
        assert!(!members[0].is_speaking);
    }
}
