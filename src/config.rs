// src/config.rs

//! Configuration loading utilities.
//!
//! Loads the config file, then the targets and credentials it points to.
//! Everything is validated here, so a run never starts on bad input.

use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};
use crate::models::{Config, Credentials, Target};

/// Validated inputs for a run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub config: Config,
    /// Directory relative paths in the config resolve against
    pub base_dir: PathBuf,
    pub targets: Vec<Target>,
    pub credentials: Credentials,
}

impl Settings {
    pub fn database_path(&self) -> PathBuf {
        self.config.database_path(&self.base_dir)
    }
}

/// Load configuration from a TOML file.
///
/// Falls back to defaults only if the file is missing.
pub fn load_config(path: &Path) -> Result<Config> {
    let config = Config::load_or_default(path)?;
    config
        .validate()
        .map_err(|e| AppError::config(format!("Invalid config {}: {e}", path.display())))?;
    Ok(config)
}

/// Load the target list named by `config`.
pub fn load_targets(config: &Config, base_dir: &Path) -> Result<Vec<Target>> {
    let path = config.targets_path(base_dir);
    let targets = Target::load_all(&path)
        .map_err(|e| AppError::config(format!("Cannot load targets {}: {e}", path.display())))?;
    log::info!("Loaded {} targets from {}", targets.len(), path.display());
    Ok(targets)
}

/// Load channel credentials.
///
/// The file may only be absent when every channel is disabled.
pub fn load_credentials(config: &Config, base_dir: &Path) -> Result<Credentials> {
    let path = config.credentials_path(base_dir);
    let any_enabled = config.notify.mail_enabled || config.notify.telegram_enabled;

    if !path.exists() && !any_enabled {
        log::debug!("No credentials file and all channels disabled");
        return Ok(Credentials::default());
    }

    let credentials = Credentials::load(&path)?;
    if credentials.is_empty() {
        log::warn!("{} configures no channels", path.display());
    }
    Ok(credentials)
}

/// Directory of the config file; relative paths resolve against it.
pub fn base_dir(config_path: &Path) -> PathBuf {
    config_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default()
}

/// Resolve the database location from the config alone.
///
/// Targets and credentials are not read.
pub fn database_path(config_path: &Path) -> Result<PathBuf> {
    let config = load_config(config_path)?;
    Ok(config.database_path(&base_dir(config_path)))
}

/// Load and validate config, targets and credentials.
pub fn load_all(config_path: &Path) -> Result<Settings> {
    let base_dir = base_dir(config_path);

    let config = load_config(config_path)?;
    let targets = load_targets(&config, &base_dir)?;
    let credentials = load_credentials(&config, &base_dir)?;

    Ok(Settings {
        config,
        base_dir,
        targets,
        credentials,
    })
}
