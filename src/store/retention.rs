//! Background cleanup task for expired rooms.
//!
//! Spawns a tokio task that periodically deletes rooms whose
//! `expires_at` timestamp has passed.

use std::sync::Arc;

use crate::store::RoomStore;

/// Spawn a background task that periodically purges expired rooms.
///
/// Runs `purge_expired` every `interval_secs` seconds (default 3600 = 1 hour).
/// Logs the number of purged rooms each cycle.
pub fn spawn_expiry_sweeper(store: Arc<dyn RoomStore>, interval_secs: u64) {
    let interval = std::time::Duration::from_secs(interval_secs);

    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;

            match store.purge_expired().await {
                Ok(count) => {
                    if count > 0 {
                        tracing::info!("Room expiry sweep: purged {} expired rooms", count);
                    } else {
                        tracing::debug!("Room expiry sweep: no expired rooms");
                    }
                }
                Err(e) => {
                    tracing::error!("Room expiry sweep error: {}", e);
                }
            }
        }
    });
}
