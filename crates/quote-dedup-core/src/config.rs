use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::Deserialize;

pub const DEFAULT_DB_PATH: &str = "quotes.db";
pub const DEFAULT_THRESHOLD: f64 = 0.8;
pub const DEFAULT_JOB_RETENTION_SECS: u64 = 3600;

/// Range user-facing surfaces clamp a requested threshold into.
pub const MIN_BOUNDARY_THRESHOLD: f64 = 0.1;
pub const MAX_BOUNDARY_THRESHOLD: f64 = 1.0;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub db_path: String,
    pub default_threshold: f64,
    pub job_retention_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: DEFAULT_DB_PATH.to_string(),
            default_threshold: DEFAULT_THRESHOLD,
            job_retention_secs: DEFAULT_JOB_RETENTION_SECS,
        }
    }
}

/// Defaults, then `Config.toml` (optional), then `QUOTE_DEDUP_*` environment variables.
pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .set_default("db_path", DEFAULT_DB_PATH)?
        .set_default("default_threshold", DEFAULT_THRESHOLD)?
        .set_default("job_retention_secs", DEFAULT_JOB_RETENTION_SECS)?
        .add_source(ConfigFile::with_name("Config").required(false))
        .add_source(Environment::with_prefix("QUOTE_DEDUP").try_parsing(true))
        .build()?;
    builder.try_deserialize::<AppConfig>()
}

/// Resolve a threshold coming from a user-facing surface.
///
/// Missing or NaN falls back to `default`; anything else is clamped into
/// `[MIN_BOUNDARY_THRESHOLD, MAX_BOUNDARY_THRESHOLD]`. The scanner itself
/// rejects out-of-range values instead of clamping them.
pub fn clamp_threshold(requested: Option<f64>, default: f64) -> f64 {
    let value = match requested {
        Some(t) if !t.is_nan() => t,
        _ => default,
    };
    value.clamp(MIN_BOUNDARY_THRESHOLD, MAX_BOUNDARY_THRESHOLD)
}
