use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{error, info, instrument};

use super::service::SessionService;

pub const DEFAULT_PURGE_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Periodically deletes expired sessions. Runs until the task is dropped.
#[instrument(skip(session_service))]
pub async fn start_session_purge_task(session_service: Arc<SessionService>, every: Duration) {
    info!(
        purge_interval_secs = every.as_secs(),
        "Starting session purge background task"
    );

    let mut ticker = interval(every);
    loop {
        ticker.tick().await;

        if let Err(e) = session_service.cleanup_expired_sessions().await {
            error!(error = %e, "Session purge failed");
        }
    }
}
