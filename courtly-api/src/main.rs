use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use courtly_api::{app, worker, AppState};
use courtly_catalog::{CourtCatalog, OperatingHours, PricePolicy};
use courtly_core::engine::EngineConfig;
use courtly_core::notify::{Channel, MockChannelSink};
use courtly_core::verification::OtpPolicy;
use courtly_core::{
    Clock, DemoSettings, Engine, EngineStore, LifecycleRules, PersistHandle, SnapshotStore,
    SystemClock,
};
use courtly_store::{Config, DbClient, PgSnapshotStore};
use tokio::sync::RwLock;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "courtly_api=debug,tower_http=debug,axum::rejection=trace".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    info!("Starting Courtly API on port {}", config.server.port);

    let clock: Arc<dyn Clock> =
        Arc::new(SystemClock::with_offset_hours(config.timezone.offset_hours));
    let sink = Arc::new(MockChannelSink);
    let (persist, snapshot_rx) = PersistHandle::new();

    // Optional Postgres-backed snapshot persistence. Without a database
    // section the engine runs memory-only and snapshots are dropped.
    let mut snapshot_store: Option<Arc<dyn SnapshotStore>> = None;
    let mut initial_store = EngineStore::default();
    if let Some(db_config) = &config.database {
        let db = DbClient::new(&db_config.url).await?;
        db.migrate().await?;
        let repo: Arc<dyn SnapshotStore> = Arc::new(PgSnapshotStore::new(db.pool.clone()));
        match repo.load().await {
            Ok(Some(json)) => match serde_json::from_str(&json) {
                Ok(store) => {
                    initial_store = store;
                    info!("Restored state snapshot from postgres");
                }
                Err(err) => warn!(%err, "Stored snapshot did not deserialize; starting fresh"),
            },
            Ok(None) => info!("No stored snapshot; starting fresh"),
            Err(err) => warn!(%err, "Snapshot load failed; starting fresh"),
        }
        snapshot_store = Some(repo);
    }
    let postgres = snapshot_store.is_some();

    let fresh = initial_store.users.is_empty();
    let engine = Engine::with_store(
        initial_store,
        engine_config(&config),
        clock,
        sink,
        persist,
    );
    let shared = Arc::new(RwLock::new(engine));

    if fresh && config.demo.enabled {
        let (users, bookings) = shared.write().await.demo_reset()?;
        info!(users, bookings, "Seeded demo data");
    }

    if let Some(store) = snapshot_store {
        tokio::spawn(courtly_store::writer::run_snapshot_writer(
            snapshot_rx,
            store,
            Duration::from_millis(config.worker.persist_debounce_ms),
        ));
    }
    tokio::spawn(worker::start_sweeper(
        Arc::clone(&shared),
        Duration::from_secs(config.worker.sweep_interval_seconds),
    ));

    let state = AppState {
        engine: shared,
        postgres,
    };
    let app = app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn engine_config(config: &Config) -> EngineConfig {
    let pricing = PricePolicy {
        flat_rate: config.pricing.flat_rate,
        individual_rate: config.pricing.individual_rate,
        currency: config.pricing.currency.clone(),
        ..PricePolicy::default()
    };
    let channels: Vec<Channel> = config
        .notifications
        .channels
        .iter()
        .filter_map(|name| {
            let channel = Channel::from_name(name);
            if channel.is_none() {
                warn!(%name, "Unknown notification channel in config; skipping");
            }
            channel
        })
        .collect();

    EngineConfig {
        catalog: CourtCatalog::standard(pricing.flat_rate),
        hours: OperatingHours {
            opens_at: config.schedule.opens_at,
            closes_at: config.schedule.closes_at,
        },
        pricing,
        rules: LifecycleRules {
            hold_minutes: config.lifecycle.hold_minutes,
            cancellation_window_hours: config.lifecycle.cancellation_window_hours,
            reminder_hours: config.lifecycle.reminder_hours,
        },
        otp: OtpPolicy {
            ttl_minutes: config.verification.ttl_minutes,
            resend_cooldown_seconds: config.verification.resend_cooldown_seconds,
            max_attempts: config.verification.max_attempts,
        },
        demo: DemoSettings {
            enabled: config.demo.enabled,
            password: config.demo.password.clone(),
        },
        channels,
    }
}
