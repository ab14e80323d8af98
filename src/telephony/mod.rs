// Bridge to the external conferencing daemon

use std::sync::Arc;
use tracing::info;

use crate::config::TelephonyConfig;

pub use bridge::{ConferenceInfo, DisabledTelephony, TelephonyBridge, TelephonyError};
pub use client::EventSocketClient;
pub use queue::{BridgeCommand, TelephonyQueue};

mod bridge;
mod client;
pub mod protocol;
pub(crate) mod queue;

/// Picks the event socket client when a daemon is configured
pub fn from_config(config: Option<&TelephonyConfig>) -> Arc<dyn TelephonyBridge> {
    match config {
        Some(config) => {
            info!(host = %config.host, port = config.port, "Telephony enabled");
            Arc::new(EventSocketClient::new(config.clone()))
        }
        None => {
            info!("Telephony disabled");
            Arc::new(DisabledTelephony)
        }
    }
}
