use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::app::AppState;

/// Starts the single background task this crate runs: a periodic sweep that
/// purges expired or used/revoked rows from all four repositories.
pub fn start_cleanup_task(state: AppState) -> JoinHandle<()> {
    let interval = Duration::from_secs(state.config.cleanup_interval_seconds);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let now = chrono::Utc::now();
            match state.repositories.purge_expired(now).await {
                Ok((codes, refresh, sessions)) => {
                    info!(
                        authorization_codes = codes,
                        refresh_tokens = refresh,
                        access_token_sessions = sessions,
                        "cleanup sweep completed"
                    );
                }
                Err(err) => error!(error = %err, "cleanup sweep failed"),
            }
        }
    })
}
