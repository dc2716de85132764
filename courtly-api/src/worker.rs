use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::info;

use crate::state::SharedEngine;

/// Background lifecycle tick. Expires lapsed holds and sends 24h
/// reminders on a fixed cadence; every mutating request also sweeps, so
/// this only bounds how stale an idle instance can get.
pub async fn start_sweeper(engine: SharedEngine, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let outcome = engine.write().await.run_sweep();
        if outcome.changed_anything() {
            info!(
                expired_holds = outcome.expired_holds,
                reminders_sent = outcome.reminders_sent,
                "lifecycle sweep applied changes"
            );
        }
    }
}
