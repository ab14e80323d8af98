use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::stream::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

use super::messages::WebSocketMessage;
use crate::shared::AppError;

/// Simple WebSocket abstraction - all we care about is send/receive
#[async_trait]
pub trait SocketWrapper: Send {
    /// Send a text message to the client
    async fn send_message(&mut self, message: String) -> Result<(), SocketError>;

    /// Next text message from the client, None once the connection is closed.
    /// Control and binary frames are skipped.
    async fn receive_message(&mut self) -> Result<Option<String>, SocketError>;

    /// Close the connection
    async fn close(&mut self) -> Result<(), SocketError>;
}

/// What the connection does after a client message was handled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerOutcome {
    Continue,
    /// Sent to this socket only, outside the room's event stream
    Reply(String),
    Close,
}

/// Handler for incoming WebSocket messages
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Errors are reported back to the sending socket only
    async fn handle_message(
        &self,
        account_id: &str,
        room_id: &str,
        message: String,
    ) -> Result<HandlerOutcome, AppError>;
}

#[derive(Debug)]
pub enum SocketError {
    SendFailed(String),
    ReceiveFailed(String),
}

/// Direct implementation on axum's WebSocket
#[async_trait]
impl SocketWrapper for WebSocket {
    async fn send_message(&mut self, message: String) -> Result<(), SocketError> {
        self.send(Message::Text(message))
            .await
            .map_err(|e| SocketError::SendFailed(e.to_string()))
    }

    async fn receive_message(&mut self) -> Result<Option<String>, SocketError> {
        while let Some(frame) = self.next().await {
            match frame {
                Ok(Message::Text(text)) => return Ok(Some(text)),
                Ok(Message::Close(_)) => return Ok(None),
                Ok(_) => continue,
                Err(e) => return Err(SocketError::ReceiveFailed(e.to_string())),
            }
        }
        Ok(None)
    }

    async fn close(&mut self) -> Result<(), SocketError> {
        self.send(Message::Close(None))
            .await
            .map_err(|e| SocketError::SendFailed(e.to_string()))
    }
}

/// Connection represents a managed WebSocket connection
/// It is used to send and receive messages to and from the client
/// The outbound receiver is a channel that receives messages from the ConnectionManager's outbound sender
pub struct Connection {
    pub account_id: String,
    pub room_id: String,
    socket: Box<dyn SocketWrapper>,
    outbound_receiver: mpsc::UnboundedReceiver<String>,
    message_handler: Arc<dyn MessageHandler>,
}

impl Connection {
    pub fn new(
        account_id: String,
        room_id: String,
        socket: Box<dyn SocketWrapper>,
        outbound_receiver: mpsc::UnboundedReceiver<String>,
        message_handler: Arc<dyn MessageHandler>,
    ) -> Self {
        Self {
            account_id,
            room_id,
            socket,
            outbound_receiver,
            message_handler,
        }
    }

    /// Run the connection - handles both sending and receiving until disconnect
    pub async fn run(mut self) -> Result<(), SocketError> {
        loop {
            tokio::select! {
                // Handle outbound messages (from our app to client)
                msg = self.outbound_receiver.recv() => {
                    match msg {
                        Some(message) => self.socket.send_message(message).await?,
                        None => break, // Channel closed, disconnect
                    }
                }

                // Handle inbound messages (from client to our app)
                msg = self.socket.receive_message() => {
                    match msg? {
                        Some(message) => {
                            let outcome = self
                                .message_handler
                                .handle_message(&self.account_id, &self.room_id, message)
                                .await;
                            match outcome {
                                Ok(HandlerOutcome::Continue) => {}
                                Ok(HandlerOutcome::Reply(reply)) => {
                                    self.socket.send_message(reply).await?
                                }
                                Ok(HandlerOutcome::Close) => break,
                                Err(e) => self.reply_error(&e).await?,
                            }
                        }
                        None => break, // Client disconnected
                    }
                }
            }
        }

        // Clean disconnect
        let _ = self.socket.close().await;
        Ok(())
    }

    async fn reply_error(&mut self, error: &AppError) -> Result<(), SocketError> {
        debug!(
            account_id = %self.account_id,
            room_id = %self.room_id,
            error = %error,
            "Client message refused"
        );
        let message = WebSocketMessage::error(client_error_message(error));
        match message.to_json() {
            Ok(json) => self.socket.send_message(json).await,
            Err(e) => Err(SocketError::SendFailed(e.to_string())),
        }
    }
}

fn client_error_message(error: &AppError) -> String {
    match error {
        AppError::DatabaseError(_) | AppError::Internal => "Internal server error".to_string(),
        other => other.to_string(),
    }
}
