//! Colectivo configuration system.
//!
//! TOML-based configuration with validation. Every section has defaults,
//! so an empty or partial file is a valid config.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use colectivo_config::{config_to_json, load_config};
//!
//! let config = load_config(None).expect("failed to load config");
//! println!("{}", config_to_json(&config));
//! ```

pub mod schema;
pub mod toml_loader;
pub mod validation;

pub use schema::{ColectivoConfig, CONFIG_SCHEMA_VERSION};

use std::path::Path;

use colectivo_common::ConfigError;

/// Load and validate the config.
///
/// With `path`, that file must exist. Without it, the platform default
/// path is used and a commented template is created there if missing.
pub fn load_config(path: Option<&Path>) -> Result<ColectivoConfig, ConfigError> {
    let config = match path {
        Some(path) => toml_loader::load_from_path(path)?,
        None => toml_loader::load_default()?,
    };
    validation::validate(&config)?;
    Ok(config)
}

/// Serialize a config to a pretty-printed JSON string.
pub fn config_to_json(config: &ColectivoConfig) -> String {
    serde_json::to_string_pretty(config)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize config: {e}\"}}"))
}
