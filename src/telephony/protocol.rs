//! Framing for the conferencing daemon's event socket.
//!
//! Every message is a block of `Name: value` header lines ended by an empty
//! line. When a `Content-Length` header is present, that many bytes of body
//! follow the blank line.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use super::bridge::TelephonyError;

pub const CONTENT_TYPE_AUTH_REQUEST: &str = "auth/request";
pub const CONTENT_TYPE_COMMAND_REPLY: &str = "command/reply";
pub const CONTENT_TYPE_API_RESPONSE: &str = "api/response";
pub const CONTENT_TYPE_DISCONNECT: &str = "text/disconnect-notice";

/// Largest body accepted from the daemon
const MAX_BODY_LEN: usize = 1024 * 1024;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl Frame {
    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("Content-Type")
    }

    /// Text that decides success: the `Reply-Text` header for command
    /// replies, the body for api responses.
    pub fn reply_text(&self) -> &str {
        self.header("Reply-Text")
            .or(self.body.as_deref())
            .unwrap_or_default()
            .trim()
    }

    pub fn is_ok(&self) -> bool {
        is_ok_reply(self.reply_text())
    }
}

pub fn is_ok_reply(text: &str) -> bool {
    text.trim_start().starts_with("+OK")
}

/// Reads one frame. Returns `Ok(None)` when the peer closed the connection
/// before sending anything.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Frame>, TelephonyError>
where
    R: AsyncBufRead + Unpin,
{
    let mut frame = Frame::default();
    let mut line = String::new();

    loop {
        line.clear();
        let read = reader.read_line(&mut line).await?;
        if read == 0 {
            if frame.headers.is_empty() {
                return Ok(None);
            }
            return Err(TelephonyError::Protocol(
                "connection closed in the middle of a frame".to_string(),
            ));
        }

        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            // Leading blank lines between frames are padding
            if frame.headers.is_empty() {
                continue;
            }
            break;
        }

        let (name, value) = trimmed.split_once(':').ok_or_else(|| {
            TelephonyError::Protocol(format!("malformed header line: {}", trimmed))
        })?;
        frame
            .headers
            .push((name.trim().to_string(), value.trim().to_string()));
    }

    if let Some(raw_len) = frame.header("Content-Length") {
        let len: usize = raw_len
            .parse()
            .map_err(|_| TelephonyError::Protocol(format!("bad Content-Length: {}", raw_len)))?;
        if len > MAX_BODY_LEN {
            return Err(TelephonyError::Protocol(format!(
                "body of {} bytes exceeds limit",
                len
            )));
        }

        let mut body = vec![0u8; len];
        reader.read_exact(&mut body).await?;
        frame.body = Some(String::from_utf8_lossy(&body).into_owned());
    }

    Ok(Some(frame))
}

pub fn auth_command(password: &str) -> String {
    format!("auth {}\n\n", password)
}

pub fn api_command(command: &str) -> String {
    format!("api {}\n\n", command)
}

/// Coarse classification of unsolicited events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    CallAnswered,
    CallEnded,
    ConferenceChanged,
    Other,
}

pub fn classify_event(frame: &Frame) -> EventKind {
    let name = frame
        .header("Event-Name")
        .map(str::to_string)
        .or_else(|| frame.body.as_deref().and_then(body_event_name));

    match name.as_deref() {
        Some("CHANNEL_ANSWER") => EventKind::CallAnswered,
        Some("CHANNEL_HANGUP") => EventKind::CallEnded,
        Some("CONFERENCE_MAINT") => EventKind::ConferenceChanged,
        _ => EventKind::Other,
    }
}

// Plain-text events carry their own header block in the body
fn body_event_name(body: &str) -> Option<String> {
    body.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        key.trim()
            .eq_ignore_ascii_case("Event-Name")
            .then(|| value.trim().to_string())
    })
}

/// Counts member lines in a `conference <id> list` reply
pub fn count_conference_members(listing: &str) -> usize {
    listing
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('+') && !line.starts_with('-'))
        .count()
}
