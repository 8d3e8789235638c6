//! Full configuration validation.
//!
//! Validates numeric ranges, endpoint schemes, and coordinates. Each
//! section has its own submodule; this orchestrator calls them all and
//! collects errors into a single `ConfigError`.

mod helpers;
mod network;
mod route;


use crate::schema::ColectivoConfig;
use colectivo_common::ConfigError;

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &ColectivoConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    network::validate_realtime(&mut errors, config);
    network::validate_api(&mut errors, config);
    route::validate_route(&mut errors, config);
    route::validate_driver(&mut errors, config);
    route::validate_notifications(&mut errors, config);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}
