//! Application configuration structures.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP fetching behavior
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Notification channel toggles and limits
    #[serde(default)]
    pub notify: NotifyConfig,

    /// Run-level limits
    #[serde(default)]
    pub run: RunConfig,

    /// Locations of the database, targets and credentials
    #[serde(default)]
    pub paths: PathsConfig,

    /// Console logging
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration, or return defaults when the file does not exist.
    ///
    /// A file that exists but cannot be read or parsed is an error.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(AppError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
                log::warn!("Config file {path:?} not found. Using defaults.");
                Ok(Self::default())
            }
            Err(e) => Err(AppError::config(format!(
                "cannot load config {}: {e}",
                path.display()
            ))),
        }
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.fetch.user_agent.trim().is_empty() {
            return Err(AppError::validation("fetch.user_agent is empty"));
        }
        if self.fetch.timeout_secs == 0 {
            return Err(AppError::validation("fetch.timeout_secs must be > 0"));
        }
        if self.fetch.max_concurrent == 0 {
            return Err(AppError::validation("fetch.max_concurrent must be > 0"));
        }
        if self.notify.timeout_secs == 0 {
            return Err(AppError::validation("notify.timeout_secs must be > 0"));
        }
        if self.run.deadline_secs == Some(0) {
            return Err(AppError::validation("run.deadline_secs must be > 0 when set"));
        }
        Ok(())
    }

    /// Database path, resolved against `base_dir` when relative.
    pub fn database_path(&self, base_dir: &Path) -> PathBuf {
        resolve(base_dir, &self.paths.database)
    }

    /// Targets file path, resolved against `base_dir` when relative.
    pub fn targets_path(&self, base_dir: &Path) -> PathBuf {
        resolve(base_dir, &self.paths.targets)
    }

    /// Credentials file path, resolved against `base_dir` when relative.
    pub fn credentials_path(&self, base_dir: &Path) -> PathBuf {
        resolve(base_dir, &self.paths.credentials)
    }
}

fn resolve(base_dir: &Path, path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

/// HTTP client settings for target fetches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// User-Agent header sent with every fetch
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::fetch_timeout")]
    pub timeout_secs: u64,

    /// Maximum number of targets in flight at once
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// Fingerprint non-2xx bodies instead of failing the target
    #[serde(default = "defaults::fingerprint_error_pages")]
    pub fingerprint_error_pages: bool,
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::fetch_timeout(),
            max_concurrent: defaults::max_concurrent(),
            fingerprint_error_pages: defaults::fingerprint_error_pages(),
        }
    }
}

/// Notification channel settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default = "defaults::enabled")]
    pub mail_enabled: bool,

    #[serde(default = "defaults::enabled")]
    pub telegram_enabled: bool,

    /// Upper bound for a single delivery, in seconds
    #[serde(default = "defaults::notify_timeout")]
    pub timeout_secs: u64,
}

impl NotifyConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            mail_enabled: defaults::enabled(),
            telegram_enabled: defaults::enabled(),
            timeout_secs: defaults::notify_timeout(),
        }
    }
}

/// Run-level settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunConfig {
    /// Stop starting new targets after this many seconds
    #[serde(default)]
    pub deadline_secs: Option<u64>,
}

impl RunConfig {
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }
}

/// File locations. Relative paths are resolved against the config file's directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "defaults::database")]
    pub database: String,

    #[serde(default = "defaults::targets")]
    pub targets: String,

    #[serde(default = "defaults::credentials")]
    pub credentials: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            database: defaults::database(),
            targets: defaults::targets(),
            credentials: defaults::credentials(),
        }
    }
}

/// Console logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    // Some sites block unknown clients, so identify as a desktop browser.
    pub fn user_agent() -> String {
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:97.0) Gecko/20100101 Firefox/97.0".into()
    }
    pub fn fetch_timeout() -> u64 {
        30
    }
    pub fn max_concurrent() -> usize {
        4
    }
    pub fn fingerprint_error_pages() -> bool {
        true
    }

    pub fn enabled() -> bool {
        true
    }
    pub fn notify_timeout() -> u64 {
        15
    }

    pub fn database() -> String {
        "sitemon.db".into()
    }
    pub fn targets() -> String {
        "targets.yml".into()
    }
    pub fn credentials() -> String {
        "credentials.toml".into()
    }

    pub fn log_level() -> String {
        "info".into()
    }
}
