use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::bridge::{ConferenceInfo, TelephonyBridge, TelephonyError};
use super::protocol::{
    api_command, auth_command, classify_event, count_conference_members, is_ok_reply, read_frame,
    EventKind, Frame, CONTENT_TYPE_API_RESPONSE, CONTENT_TYPE_AUTH_REQUEST,
    CONTENT_TYPE_COMMAND_REPLY, CONTENT_TYPE_DISCONNECT,
};
use crate::config::TelephonyConfig;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REPLY_TIMEOUT: Duration = Duration::from_secs(10);

struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    conference_module_loaded: bool,
}

/// Client for the conferencing daemon's event socket.
///
/// Connects and authenticates on first use. A failed command drops the
/// connection; the next command opens a fresh one. Commands are never retried.
pub struct EventSocketClient {
    config: TelephonyConfig,
    connection: Mutex<Option<Connection>>,
}

impl EventSocketClient {
    pub fn new(config: TelephonyConfig) -> Self {
        Self {
            config,
            connection: Mutex::new(None),
        }
    }

    #[instrument(skip(self), fields(host = %self.config.host, port = self.config.port))]
    async fn connect(&self) -> Result<Connection, TelephonyError> {
        let address = format!("{}:{}", self.config.host, self.config.port);
        let stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(&address))
            .await
            .map_err(|_| TelephonyError::Timeout)??;

        let (read_half, write_half) = stream.into_split();
        let mut connection = Connection {
            reader: BufReader::new(read_half),
            writer: write_half,
            conference_module_loaded: false,
        };

        let greeting = next_frame(&mut connection).await?;
        if greeting.content_type() != Some(CONTENT_TYPE_AUTH_REQUEST) {
            return Err(TelephonyError::Protocol(format!(
                "expected auth request, got {:?}",
                greeting.content_type()
            )));
        }

        connection
            .writer
            .write_all(auth_command(&self.config.password).as_bytes())
            .await?;

        let reply = next_frame(&mut connection).await?;
        if reply.content_type() != Some(CONTENT_TYPE_COMMAND_REPLY) || !reply.is_ok() {
            warn!(reply = %reply.reply_text(), "Telephony daemon refused credentials");
            return Err(TelephonyError::AuthFailed(reply.reply_text().to_string()));
        }

        info!("Connected to telephony daemon");
        Ok(connection)
    }

    /// Sends `api <command>` and returns the reply text if it starts with `+OK`
    async fn api(&self, command: &str) -> Result<String, TelephonyError> {
        let mut guard = self.connection.lock().await;

        if guard.is_none() {
            *guard = Some(self.connect().await?);
        }
        let Some(connection) = guard.as_mut() else {
            return Err(TelephonyError::Unavailable);
        };

        let result = send_api(connection, command).await;
        if matches!(
            result,
            Err(TelephonyError::Io(_) | TelephonyError::Protocol(_) | TelephonyError::Timeout)
        ) {
            // The stream position is unknown after a failed exchange
            *guard = None;
        }

        let reply = result?;
        if is_ok_reply(&reply) {
            Ok(reply)
        } else {
            Err(TelephonyError::Rejected {
                command: command.to_string(),
                reply: reply.trim().to_string(),
            })
        }
    }

    async fn ensure_conference_module(&self) -> Result<(), TelephonyError> {
        {
            let guard = self.connection.lock().await;
            if guard.as_ref().is_some_and(|c| c.conference_module_loaded) {
                return Ok(());
            }
        }

        match self.api("load mod_conference").await {
            Ok(_) => {}
            Err(TelephonyError::Rejected { reply, .. }) if reply.contains("already loaded") => {
                debug!("Conference module already loaded");
            }
            Err(e) => return Err(e),
        }

        if let Some(connection) = self.connection.lock().await.as_mut() {
            connection.conference_module_loaded = true;
        }
        Ok(())
    }
}

async fn send_api(connection: &mut Connection, command: &str) -> Result<String, TelephonyError> {
    debug!(command = %command, "Sending telephony command");
    connection
        .writer
        .write_all(api_command(command).as_bytes())
        .await?;

    loop {
        let frame = next_frame(connection).await?;
        match frame.content_type() {
            Some(CONTENT_TYPE_API_RESPONSE) => {
                return Ok(frame.body.unwrap_or_default());
            }
            Some(CONTENT_TYPE_DISCONNECT) => {
                return Err(TelephonyError::Io(
                    "daemon closed the connection".to_string(),
                ));
            }
            _ => log_event(&frame),
        }
    }
}

async fn next_frame(connection: &mut Connection) -> Result<Frame, TelephonyError> {
    tokio::time::timeout(REPLY_TIMEOUT, read_frame(&mut connection.reader))
        .await
        .map_err(|_| TelephonyError::Timeout)??
        .ok_or_else(|| TelephonyError::Io("connection closed by daemon".to_string()))
}

fn log_event(frame: &Frame) {
    match classify_event(frame) {
        EventKind::CallAnswered => info!("Telephony call answered"),
        EventKind::CallEnded => info!("Telephony call ended"),
        EventKind::ConferenceChanged => info!("Telephony conference changed"),
        EventKind::Other => debug!(content_type = ?frame.content_type(), "Ignoring telephony frame"),
    }
}

#[async_trait]
impl TelephonyBridge for EventSocketClient {
    #[instrument(skip(self))]
    async fn create_conference(&self, conference_id: &str) -> Result<(), TelephonyError> {
        self.ensure_conference_module().await?;
        self.api(&format!("conference {} create", conference_id))
            .await?;
        info!(conference_id = %conference_id, "Conference created");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn join_conference(
        &self,
        conference_id: &str,
        account_id: &str,
    ) -> Result<(), TelephonyError> {
        self.api(&format!("conference {} dial user/{}", conference_id, account_id))
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn kick(&self, conference_id: &str, account_id: &str) -> Result<(), TelephonyError> {
        self.api(&format!("conference {} kick {}", conference_id, account_id))
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn set_muted(
        &self,
        conference_id: &str,
        account_id: &str,
        muted: bool,
    ) -> Result<(), TelephonyError> {
        let action = if muted { "mute" } else { "unmute" };
        self.api(&format!("conference {} {} {}", conference_id, action, account_id))
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn conference_info(&self, conference_id: &str) -> Result<ConferenceInfo, TelephonyError> {
        let listing = self
            .api(&format!("conference {} list", conference_id))
            .await?;

        Ok(ConferenceInfo {
            conference_id: conference_id.to_string(),
            member_count: count_conference_members(&listing),
            listing,
        })
    }
}
