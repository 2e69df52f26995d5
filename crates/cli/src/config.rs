use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use flux_sync::schedule::PollSchedule;
use flux_sync::SyncConfig;

/// Client configuration loaded from environment variables.
///
/// Every field has a default suitable for a service on the local
/// machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliConfig {
    /// Base URL of the generation service.
    pub api_url: String,
    /// Per-request gateway timeout.
    pub request_timeout: Duration,
    pub schedule: PollSchedule,
    /// Display time attached to notifications.
    pub notification_ttl: Duration,
    /// Directory downloads are written to.
    pub download_dir: PathBuf,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8000".to_string(),
            request_timeout: Duration::from_secs(10),
            schedule: PollSchedule::default(),
            notification_ttl: Duration::from_millis(2500),
            download_dir: PathBuf::from("./downloads"),
        }
    }
}

impl CliConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                 |
    /// |------------------------|-------------------------|
    /// | `FLUX_API_URL`         | `http://localhost:8000` |
    /// | `REQUEST_TIMEOUT_SECS` | `10`                    |
    /// | `HEALTH_INTERVAL_SECS` | `30`                    |
    /// | `IMAGES_INTERVAL_SECS` | `5`                     |
    /// | `QUEUE_INTERVAL_SECS`  | `10`                    |
    /// | `MODELS_INTERVAL_SECS` | `5` (`0` disables)      |
    /// | `NOTIFICATION_TTL_MS`  | `2500`                  |
    /// | `DOWNLOAD_DIR`         | `./downloads`           |
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env), reading values through
    /// `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let api_url = lookup("FLUX_API_URL")
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .unwrap_or(defaults.api_url);

        let schedule = PollSchedule {
            health: period(&lookup, "HEALTH_INTERVAL_SECS", defaults.schedule.health),
            images: period(&lookup, "IMAGES_INTERVAL_SECS", defaults.schedule.images),
            queue: period(&lookup, "QUEUE_INTERVAL_SECS", defaults.schedule.queue),
            models: match read_var::<u64>(&lookup, "MODELS_INTERVAL_SECS") {
                Some(0) => None,
                Some(secs) => Some(Duration::from_secs(secs)),
                None => defaults.schedule.models,
            },
        };

        let notification_ttl = read_var(&lookup, "NOTIFICATION_TTL_MS")
            .map_or(defaults.notification_ttl, Duration::from_millis);

        let download_dir = lookup("DOWNLOAD_DIR")
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.download_dir);

        Self {
            api_url,
            request_timeout: period(&lookup, "REQUEST_TIMEOUT_SECS", defaults.request_timeout),
            schedule,
            notification_ttl,
            download_dir,
        }
    }

    /// Settings handed to the orchestrator.
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            schedule: self.schedule.clone(),
            notification_ttl: self.notification_ttl,
            ..SyncConfig::default()
        }
    }
}

/// Parsed value of `key`, or `None` when unset or unparseable.
fn read_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Invalid value, using default");
            None
        }
    }
}

/// A positive number of seconds read from `key`.
fn period(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: Duration) -> Duration {
    match read_var::<u64>(lookup, key) {
        Some(0) => {
            tracing::warn!(key, "Period must be positive, using default");
            default
        }
        Some(secs) => Duration::from_secs(secs),
        None => default,
    }
}
