use courtly_core::Engine;
use std::sync::Arc;
use tokio::sync::RwLock;

/// All mutating handlers take the write half of this lock, which makes
/// each engine operation's check-then-write sequence atomic. Read-only
/// handlers share the read half.
pub type SharedEngine = Arc<RwLock<Engine>>;

#[derive(Clone)]
pub struct AppState {
    pub engine: SharedEngine,
    /// Whether a Postgres snapshot store is attached; surfaced by /health.
    pub postgres: bool,
}
