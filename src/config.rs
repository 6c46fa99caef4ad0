use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError};

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const CONFIG_DIR: &str = "config";
const DEFAULT_PURCHASE_NUMBER_PREFIX: &str = "PO";

/// Runtime settings for the ledger engines and the CLI.
///
/// Built from layered sources by [`load_config`]; unknown keys are rejected.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[validate(length(min = 1))]
    pub database_url: String,

    /// Profile name; selects `config/<environment>.toml`.
    #[validate(length(min = 1))]
    pub environment: String,

    /// Default `retail_ledger` filter level when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_json: bool,

    /// Apply pending migrations before the CLI runs a command.
    #[serde(default)]
    pub auto_migrate: bool,

    #[serde(default = "default_db_max_connections")]
    #[validate(range(min = 1))]
    pub db_max_connections: u32,
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    // pool timeouts, in seconds
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Buffer of the post-commit event channel.
    #[serde(default = "default_event_channel_capacity")]
    #[validate(range(min = 1))]
    pub event_channel_capacity: usize,

    /// Prefix of generated purchase order numbers (`PO-20240101-0001`)
    #[serde(default = "default_purchase_number_prefix")]
    #[validate(length(min = 1, max = 16))]
    pub purchase_number_prefix: String,

    /// Low-stock threshold given to inventory rows the ledger creates on demand.
    #[serde(default)]
    #[validate(range(min = 0))]
    pub default_low_stock_threshold: i32,
}

impl AppConfig {
    /// Settings with built-in defaults for everything but the database and profile.
    pub fn new(database_url: String, environment: String) -> Self {
        Self {
            database_url,
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            event_channel_capacity: default_event_channel_capacity(),
            purchase_number_prefix: default_purchase_number_prefix(),
            default_low_stock_threshold: 0,
        }
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("could not read configuration: {0}")]
    Load(#[from] ConfigError),

    #[error("invalid configuration: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_db_max_connections() -> u32 {
    16
}
fn default_db_min_connections() -> u32 {
    2
}
fn default_db_connect_timeout_secs() -> u64 {
    30
}
fn default_db_idle_timeout_secs() -> u64 {
    600
}
fn default_db_acquire_timeout_secs() -> u64 {
    8
}

fn default_event_channel_capacity() -> usize {
    1024
}

fn default_purchase_number_prefix() -> String {
    DEFAULT_PURCHASE_NUMBER_PREFIX.to_string()
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    if LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
        return Ok(());
    }
    let mut err = ValidationError::new("log_level");
    err.message = Some(format!("expected one of {}", LOG_LEVELS.join(", ")).into());
    Err(err)
}

/// Installs the global `tracing` subscriber. `RUST_LOG` wins over `level`;
/// a second call is a no-op.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("retail_ledger={},sea_orm=warn", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .json()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .try_init();
    }
}

/// Loads settings for the profile named by `RUN_ENV` (or `APP_ENV`,
/// falling back to `development`) from `./config`.
///
/// Later sources win: built-in defaults, `default.toml`, `<profile>.toml`,
/// then `APP__*` environment variables.
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    load_config_from(Path::new(CONFIG_DIR), &run_env)
}

pub fn load_config_from(config_dir: &Path, run_env: &str) -> Result<AppConfig, AppConfigError> {
    info!(profile = run_env, "loading configuration");
    if !config_dir.exists() {
        info!(dir = %config_dir.display(), "no config directory, using defaults and environment");
    }

    let config = Config::builder()
        .set_default("database_url", "sqlite://retail_ledger.db?mode=rwc")?
        .set_default("environment", run_env)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::from(config_dir.join("default")).required(false))
        .add_source(File::from(config_dir.join(run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!(errors = %e, "configuration rejected");
        AppConfigError::Validation(e)
    })?;
    Ok(app_config)
}
