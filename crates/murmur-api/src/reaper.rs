use std::time::Duration;

use tracing::{info, warn};

use crate::{ApiError, AppState, blocking};

/// Background task that removes expired stories.
///
/// Runs on an interval, independent of request handling. Active queries
/// already filter on `expires_at`, so a late sweep never exposes an
/// expired story; it only bounds how long the rows linger.
pub async fn run_reaper_loop(state: AppState, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));

    loop {
        interval.tick().await;

        match reap_expired(&state).await {
            Ok(count) => {
                if count > 0 {
                    info!("Reaper: removed {} expired stories", count);
                }
            }
            Err(e) => {
                warn!("Reaper error: {}", e);
            }
        }
    }
}

pub async fn reap_expired(state: &AppState) -> Result<usize, ApiError> {
    blocking(state, "Error reaping stories", |db| {
        db.reap_expired_stories(chrono::Utc::now())
    })
    .await
}
