use std::net::SocketAddr;
use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "BloodScan";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prediction service used when `PREDICTION_SERVICE_URL` is unset.
pub const DEFAULT_PREDICTION_URL: &str = "http://localhost:8000";

/// Bind address used when `BLOODSCAN_BIND_ADDR` is unset.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";

const ENV_PREDICTION_URL: &str = "PREDICTION_SERVICE_URL";
const ENV_DB_PATH: &str = "BLOODSCAN_DB_PATH";
const ENV_BIND_ADDR: &str = "BLOODSCAN_BIND_ADDR";

/// Log filter applied when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "bloodscan_lib=info,bloodscan=info,tower_http=warn"
}

/// Get the application data directory
/// ~/BloodScan/ on all platforms, falling back to the working directory
/// when no home directory can be determined.
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Default location of the SQLite database.
pub fn default_db_path() -> PathBuf {
    app_data_dir().join("bloodscan.db")
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid bind address '{value}': {reason}")]
    InvalidBindAddr { value: String, reason: String },
    #[error("Invalid prediction service URL '{0}'")]
    InvalidPredictionUrl(String),
}

/// Runtime configuration, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub prediction_url: String,
    pub db_path: PathBuf,
    pub bind_addr: SocketAddr,
}

impl Config {
    /// Resolve configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve configuration from an arbitrary key lookup.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let prediction_url = get(ENV_PREDICTION_URL)
            .unwrap_or_else(|| DEFAULT_PREDICTION_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        if !(prediction_url.starts_with("http://") || prediction_url.starts_with("https://")) {
            return Err(ConfigError::InvalidPredictionUrl(prediction_url));
        }

        let db_path = get(ENV_DB_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(default_db_path);

        let bind_raw = get(ENV_BIND_ADDR).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidBindAddr {
                value: bind_raw.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            prediction_url,
            db_path,
            bind_addr,
        })
    }
}
