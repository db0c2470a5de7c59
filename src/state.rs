//! On-disk locations and config I/O.
//!
//! Everything lives under ~/.obsidian-planner/. Conversation state is never
//! written here; it exists only for the life of the process.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::types::Config;

/// Root directory for planner files.
pub fn app_dir() -> Result<PathBuf, ConfigError> {
    let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
    Ok(home.join(".obsidian-planner"))
}

pub fn config_path() -> Result<PathBuf, ConfigError> {
    Ok(app_dir()?.join("config.json"))
}

pub fn log_path() -> Result<PathBuf, ConfigError> {
    Ok(app_dir()?.join("planner.log"))
}

/// Load config from the default location.
///
/// A missing file is reported as `ConfigError::NotFound` so callers can
/// decide whether to fall back to defaults.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path()?)
}

pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }
    let content = fs::read_to_string(path)?;
    let config: Config = serde_json::from_str(&content)?;
    Ok(config)
}

/// Write config to the default location, creating the directory if needed.
pub fn write_config(config: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path()?;
    write_config_to(&path, config)?;
    Ok(path)
}

/// Pretty-printed JSON (two-space indent). The file holds a Jira token, so it
/// is restricted to the owner on unix.
pub fn write_config_to(path: &Path, config: &Config) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }

    let data = serde_json::to_string_pretty(config)?;
    fs::write(path, data)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }

    Ok(())
}

/// Load the config, falling back to defaults when the file does not exist.
///
/// Parse errors are still returned: a broken file should not be silently
/// replaced by defaults.
pub fn load_config_or_default() -> Result<Config, ConfigError> {
    match load_config() {
        Ok(config) => Ok(config),
        Err(ConfigError::NotFound(path)) => {
            log::warn!(
                "No config at {}; using defaults. Run 'obsidian-planner configure' to create one.",
                path.display()
            );
            Ok(Config::default())
        }
        Err(e) => Err(e),
    }
}
