use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{error, info, instrument};

use super::service::RoomService;

pub const DEFAULT_RELEASE_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Periodically drops in-memory state held for rooms that have ended
#[instrument(skip(room_service))]
pub async fn start_room_cleanup_task(room_service: Arc<RoomService>, every: Duration) {
    info!(
        release_interval_secs = every.as_secs(),
        "Starting room cleanup background task"
    );

    let mut ticker = interval(every);
    loop {
        ticker.tick().await;

        match room_service.release_idle_rooms().await {
            Ok(0) => {}
            Ok(released) => info!(released, "Idle room state released"),
            Err(e) => error!(error = %e, "Room cleanup failed"),
        }
    }
}
