//! Cleanup Task
//!
//! Background task that periodically sweeps expired and unreadable cache
//! entries so the namespace does not grow without bound.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::sweep_expired;
use crate::storage::StorageAdapter;

/// Spawns the periodic cleanup task for one manager instance.
///
/// The task sleeps for the configured interval between sweeps. Each sweep
/// enumerates the namespace once at its start, so an entry written after a
/// sweep begins is not considered by that sweep. Storage failures during a
/// sweep are logged and skipped; the sweep is best-effort.
///
/// The returned handle is the cancellation primitive: aborting it stops
/// future sweeps without interrupting storage operations already issued.
pub fn spawn_cleanup_task(adapter: Arc<StorageAdapter>, interval_ms: u64) -> JoinHandle<()> {
    let interval = Duration::from_millis(interval_ms);

    tokio::spawn(async move {
        info!(interval_ms, "starting cache cleanup task");

        loop {
            tokio::time::sleep(interval).await;

            let removed = sweep_expired(&adapter).await;
            if removed > 0 {
                info!(removed, "cleanup sweep removed stale entries");
            } else {
                debug!("cleanup sweep found nothing to remove");
            }
        }
    })
}
