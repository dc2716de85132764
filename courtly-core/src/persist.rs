use async_trait::async_trait;
use tokio::sync::watch;

/// Durable storage for the serialized engine state. One logical document;
/// `save` overwrites, `load` returns the last overwrite if any.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn save(&self, snapshot: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
    async fn load(&self) -> Result<Option<String>, Box<dyn std::error::Error + Send + Sync>>;
}

/// Fire-and-forget side of snapshot persistence. Mutating operations
/// publish the full serialized state here and move on; a background
/// writer drains it. The channel keeps only the newest snapshot, so a
/// burst of mutations collapses into one write.
#[derive(Clone)]
pub struct PersistHandle {
    tx: watch::Sender<Option<String>>,
}

impl PersistHandle {
    pub fn new() -> (Self, watch::Receiver<Option<String>>) {
        let (tx, rx) = watch::channel(None);
        (Self { tx }, rx)
    }

    /// A handle with no writer behind it. Publishing is a no-op; used
    /// when the process runs without durable storage, and in tests.
    pub fn disabled() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Never blocks and never fails; an unread previous snapshot is
    /// simply replaced.
    pub fn publish(&self, snapshot: String) {
        self.tx.send_replace(Some(snapshot));
    }
}
