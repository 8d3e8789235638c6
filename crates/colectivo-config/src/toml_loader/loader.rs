//! Core TOML config loading: read from path or platform default.

use crate::schema::ColectivoConfig;
use colectivo_common::ConfigError;
use std::path::Path;
use tracing::info;

use super::paths::{create_default_config, default_config_path};

/// Load config from a specific TOML file path.
///
/// Missing fields take their serde defaults. The result is not validated
/// here; see [`crate::validation::validate`].
pub fn load_from_path(path: &Path) -> Result<ColectivoConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::ParseError(format!("failed to read {}: {e}", path.display())))?;

    let config: ColectivoConfig = toml::from_str(&content)
        .map_err(|e| ConfigError::ParseError(format!("failed to parse TOML: {e}")))?;

    info!(path = %path.display(), "loaded config");
    Ok(config)
}

/// Load config from the platform-specific default path.
///
/// On macOS: `~/Library/Application Support/colectivo/config.toml`
/// On Linux: `~/.config/colectivo/config.toml`
///
/// If the file does not exist, creates a default config file and returns defaults.
pub fn load_default() -> Result<ColectivoConfig, ConfigError> {
    let path = default_config_path()?;

    match load_from_path(&path) {
        Ok(config) => Ok(config),
        Err(ConfigError::FileNotFound(_)) => {
            info!(path = %path.display(), "no config found, creating default");
            create_default_config(&path)?;
            Ok(ColectivoConfig::default())
        }
        Err(e) => Err(e),
    }
}
