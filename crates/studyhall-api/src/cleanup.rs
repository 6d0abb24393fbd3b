use std::collections::HashSet;
use std::time::Duration;
use tracing::{info, warn};

use crate::AppState;

/// How long a file without a row may sit on disk before the sweep treats it
/// as dead. An in-flight upload is always younger than this.
const ORPHAN_GRACE: Duration = Duration::from_secs(3600);

/// Background task that prunes orphaned blobs.
///
/// The upload path deletes its own partial blobs, but a handler future
/// dropped mid-stream (client disconnect) never reaches that code. This
/// sweep is the backstop: any blob without a materials row past the grace
/// window gets deleted.
pub async fn run_sweep_loop(state: AppState, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        match sweep_once(&state, ORPHAN_GRACE).await {
            Ok(count) if count > 0 => info!("Sweep: removed {} orphaned blobs", count),
            Ok(_) => {}
            Err(e) => warn!("Sweep error: {}", e),
        }
    }
}

pub async fn sweep_once(state: &AppState, grace: Duration) -> anyhow::Result<usize> {
    let live: HashSet<String> = state.db.all_material_locations()?.into_iter().collect();
    state.store.sweep_orphans(&live, grace).await
}
