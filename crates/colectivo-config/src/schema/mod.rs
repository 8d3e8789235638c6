//! Configuration schema types for Colectivo.
//!
//! All structs use `serde(default)` so partial configs work correctly.

mod realtime;
mod route;
mod system;

pub use realtime::*;
pub use route::*;
pub use system::*;

use serde::{Deserialize, Serialize};

/// Current config schema version.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Root configuration for Colectivo.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct ColectivoConfig {
    pub realtime: RealtimeConfig,
    pub api: ApiConfig,
    pub route: RouteConfig,
    pub driver: DriverConfig,
    pub notifications: NotificationsConfig,
    pub logging: LoggingConfig,
}

// =============================================================================
// Tests
// =============================================================================
