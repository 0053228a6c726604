pub use config::ConfigError;

use config::{Config, Environment, File};
use nutype::nutype;
use serde::Deserialize;
use sqlx::postgres::{PgConnectOptions, PgSslMode};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Flat environment variables that override the layered configuration.
///
/// These are the names operators already use in `.env` files, so they win
/// over both config files and `ALLMITOOLS__` prefixed variables.
const NAMED_OVERRIDES: &[(&str, &str)] = &[
    ("DB_HOST", "database.host"),
    ("DB_PORT", "database.port"),
    ("DB_USER", "database.user"),
    ("DB_PASSWORD", "database.password"),
    ("DB_NAME", "database.name"),
    ("DB_SSL_MODE", "database.ssl_mode"),
    ("REQUEST_LOGGING_ENABLED", "request_logging.enabled"),
    ("PORT", "application.port"),
];

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub database: DatabaseSettings,
    pub retry: RetrySettings,
    pub request_logging: RequestLoggingSettings,
    pub maintenance: MaintenanceSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub request_timeout_secs: u64,
    /// Mounts `/request-logs` and `/maintenance/cleanup`; these carry no
    /// authentication, so they stay off unless an operator opts in
    pub admin_routes: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    pub ssl_mode: String,
    pub max_connections: u32,
    pub max_lifetime_secs: u64,
    pub idle_timeout_secs: u64,
    pub acquire_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RequestLoggingSettings {
    pub enabled: bool,
    pub queue_capacity: usize,
    pub workers: usize,
    pub max_body_bytes: usize,
    #[serde(default = "default_skip_prefixes")]
    pub skip_prefixes: Vec<String>,
    #[serde(default = "default_redact_patterns")]
    pub redact_patterns: Vec<String>,
}

/// Seconds between scheduled cleanups
#[nutype(
    validate(predicate = |secs: &u64| *secs > 0),
    derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, AsRef, Display)
)]
pub struct CleanupIntervalSecs(u64);

/// Age after which unsaved text entries expire; must fit a `Duration` in seconds
#[nutype(
    validate(predicate = |hours: &u64| hours.checked_mul(60 * 60).is_some()),
    derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, AsRef, Display)
)]
pub struct RetentionHours(u64);

#[derive(Debug, Deserialize, Clone)]
pub struct MaintenanceSettings {
    pub interval_secs: CleanupIntervalSecs,
    pub text_retention_hours: RetentionHours,
    pub log_retention_days: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSettings {
    pub level: String,
    pub format: String,
}

fn default_skip_prefixes() -> Vec<String> {
    vec!["/health".to_string(), "/static/".to_string()]
}

fn default_redact_patterns() -> Vec<String> {
    vec!["/auth/".to_string(), "/login".to_string()]
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::load(|key| env::var(key).ok())
    }

    /// Build settings, resolving flat overrides through `lookup`
    pub fn load<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = lookup("ENVIRONMENT").unwrap_or_else(|| "development".to_string());

        let mut builder = Config::builder()
            .set_default("application.host", "0.0.0.0")?
            .set_default("application.port", 3000)?
            .set_default("application.environment", environment.clone())?
            .set_default("application.request_timeout_secs", 15)?
            .set_default("application.admin_routes", false)?
            .set_default("database.host", "localhost")?
            .set_default("database.port", 5432)?
            .set_default("database.user", "allmitools_user")?
            .set_default("database.password", "")?
            .set_default("database.name", "allmitools")?
            .set_default("database.ssl_mode", "disable")?
            .set_default("database.max_connections", 25)?
            .set_default("database.max_lifetime_secs", 300)?
            .set_default("database.idle_timeout_secs", 300)?
            .set_default("database.acquire_timeout_secs", 30)?
            .set_default("retry.max_attempts", 3)?
            .set_default("retry.base_delay_ms", 100)?
            .set_default("retry.max_delay_ms", 5_000)?
            .set_default("retry.jitter", true)?
            .set_default("request_logging.enabled", false)?
            .set_default("request_logging.queue_capacity", 1024)?
            .set_default("request_logging.workers", 4)?
            .set_default("request_logging.max_body_bytes", 64 * 1024)?
            .set_default("maintenance.interval_secs", 24 * 60 * 60)?
            .set_default("maintenance.text_retention_hours", 7 * 24)?
            .set_default("maintenance.log_retention_days", 7)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{environment}")).required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(Environment::with_prefix("ALLMITOOLS").separator("__"));

        for (variable, key) in NAMED_OVERRIDES {
            let value = lookup(variable).filter(|v| !v.is_empty());
            builder = builder.set_override_option(*key, value)?;
        }

        builder.build()?.try_deserialize()
    }
}

impl ApplicationSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl DatabaseSettings {
    /// Connection options for the pool; fails on an unknown TLS mode
    pub fn connect_options(&self) -> crate::Result<PgConnectOptions> {
        let ssl_mode = PgSslMode::from_str(&self.ssl_mode).map_err(|e| {
            crate::Error::Construction(format!("invalid ssl mode '{}': {e}", self.ssl_mode))
        })?;

        Ok(PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.name)
            .ssl_mode(ssl_mode)
            .application_name("allmitools"))
    }

    pub fn max_lifetime(&self) -> Duration {
        Duration::from_secs(self.max_lifetime_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }
}

impl MaintenanceSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(*self.interval_secs.as_ref())
    }

    pub fn text_retention(&self) -> Duration {
        Duration::from_secs(self.text_retention_hours.as_ref().saturating_mul(60 * 60))
    }
}
