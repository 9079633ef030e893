//! Process-level configuration, loaded once behind a [`once_cell::sync::OnceCell`].
//!
//! Layering, in increasing priority: a bundled set of defaults, an optional
//! `config/<name>.yaml` file named by `REZCORE_ENV` (default `development`),
//! then `REZCORE_*` environment variables. Mirrors the teacher's
//! `config::settings()` call-site convention used throughout the codebase.

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

static SETTINGS: OnceCell<Settings> = OnceCell::new();

/// Returns the process-wide [`Settings`], loading them on first access.
///
/// # Panics
/// Panics if the configuration cannot be parsed. A missing config file is
/// not an error — defaults apply.
pub fn settings() -> &'static Settings {
    SETTINGS.get_or_init(|| Settings::load().expect("failed to load configuration"))
}

/// Installs an explicit [`Settings`] value, for tests that want full control
/// over configuration without touching the filesystem or environment.
///
/// Returns `Err` if settings were already initialized (first caller wins,
/// same as [`settings()`]).
pub fn set_for_test(settings: Settings) -> Result<(), Settings> {
    SETTINGS.set(settings)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database: DatabaseConfig,
    pub health: HealthConfig,
    pub fanout: FanoutConfig,
    pub poll: PollConfig,
    pub job_ttl_seconds: u64,
    pub offer_ttl_seconds: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            health: HealthConfig::default(),
            fanout: FanoutConfig::default(),
            poll: PollConfig::default(),
            job_ttl_seconds: 600,
            offer_ttl_seconds: 86_400,
        }
    }
}

impl Settings {
    fn load() -> Result<Self, config::ConfigError> {
        let env = std::env::var("REZCORE_ENV").unwrap_or_else(|_| "development".to_string());

        let builder = config::Config::builder()
            .add_source(config::Config::try_from(&Settings::default())?)
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(config::Environment::with_prefix("REZCORE").separator("__"));

        builder.build()?.try_deserialize()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub username: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub database_name: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            username: "rezcore".to_string(),
            password: "rezcore".to_string(),
            host: "localhost".to_string(),
            port: 5432,
            database_name: "rezcore".to_string(),
            max_connections: 10,
        }
    }
}

impl DatabaseConfig {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database_name
        )
    }
}

/// Source health / backoff knobs, spec.md §6 and §4.4.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    pub enabled: bool,
    pub slow_threshold_ms: u64,
    pub slow_rate_threshold: f64,
    pub min_samples_for_backoff: u64,
    pub max_backoff_hours: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            slow_threshold_ms: 3000,
            slow_rate_threshold: 0.2,
            min_samples_for_backoff: 100,
            max_backoff_hours: 24,
        }
    }
}

/// Fan-out dispatch knobs, spec.md §6 and §4.6.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct FanoutConfig {
    pub timeout_ms: u64,
    pub sla_ms: u64,
    pub concurrency: usize,
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            sla_ms: 120_000,
            concurrency: 10,
        }
    }
}

/// Long-poll knobs, spec.md §6 and §4.5.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub wait_ms_max: u64,
    pub step_ms: u64,
    pub batch: usize,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            wait_ms_max: 10_000,
            step_ms: 200,
            batch: 200,
        }
    }
}
