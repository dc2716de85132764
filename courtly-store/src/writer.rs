use courtly_core::SnapshotStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Drains the engine's snapshot channel and writes the newest document to
/// the backing store. The channel keeps only the latest value, so a burst
/// of mutations inside the debounce window collapses into a single write.
/// A failed write is logged and dropped; the next mutation publishes a
/// fresh snapshot and retries implicitly.
pub async fn run_snapshot_writer(
    mut rx: watch::Receiver<Option<String>>,
    store: Arc<dyn SnapshotStore>,
    debounce: Duration,
) {
    while rx.changed().await.is_ok() {
        tokio::time::sleep(debounce).await;
        let snapshot = rx.borrow_and_update().clone();
        let Some(snapshot) = snapshot else { continue };

        match store.save(&snapshot).await {
            Ok(()) => debug!(bytes = snapshot.len(), "state snapshot persisted"),
            Err(err) => warn!(%err, "state snapshot write failed; will retry on next change"),
        }
    }
}
