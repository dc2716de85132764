use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    /// Absent means memory-only operation; snapshots are dropped.
    pub database: Option<DatabaseConfig>,
    pub timezone: TimezoneConfig,
    pub schedule: ScheduleConfig,
    pub pricing: PricingConfig,
    pub lifecycle: LifecycleConfig,
    pub verification: VerificationConfig,
    pub demo: DemoConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TimezoneConfig {
    pub offset_hours: i32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScheduleConfig {
    pub opens_at: u32,
    pub closes_at: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PricingConfig {
    pub flat_rate: i64,
    pub individual_rate: i64,
    pub currency: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LifecycleConfig {
    pub hold_minutes: i64,
    pub cancellation_window_hours: i64,
    pub reminder_hours: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct VerificationConfig {
    pub ttl_minutes: i64,
    pub resend_cooldown_seconds: i64,
    pub max_attempts: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DemoConfig {
    pub enabled: bool,
    pub password: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotificationsConfig {
    #[serde(default = "default_channels")]
    pub channels: Vec<String>,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            channels: default_channels(),
        }
    }
}

fn default_channels() -> Vec<String> {
    vec!["whatsapp".to_string(), "telegram".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct WorkerConfig {
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
    #[serde(default = "default_persist_debounce")]
    pub persist_debounce_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            sweep_interval_seconds: default_sweep_interval(),
            persist_debounce_ms: default_persist_debounce(),
        }
    }
}

fn default_sweep_interval() -> u64 {
    30
}

fn default_persist_debounce() -> u64 {
    50
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(config::File::with_name("config/default"))
            // Add in the current environment file
            // Default to 'development' env
            // Note that this file is _optional_
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add in a local configuration file
            // This file shouldn't be checked in to git
            .add_source(config::File::with_name("config/local").required(false))
            // Add in settings from the environment (with a prefix of COURTLY)
            // Eg.. `COURTLY_SERVER__PORT=4000` would set the server port
            .add_source(config::Environment::with_prefix("COURTLY").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
