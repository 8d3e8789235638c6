//! Route corridor and driver defaults.

use serde::{Deserialize, Serialize};

/// A WGS84 coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// A named stop along the route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteStop {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl RouteStop {
    fn new(name: &str, latitude: f64, longitude: f64) -> Self {
        Self {
            name: name.to_string(),
            latitude,
            longitude,
        }
    }

    pub fn point(&self) -> GeoPoint {
        GeoPoint {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

/// The single route the service runs on.
///
/// `center` doubles as the fallback position when no location fix is given.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteConfig {
    pub code: String,
    pub name: String,
    pub description: String,
    pub center: GeoPoint,
    pub stops: Vec<RouteStop>,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            code: "501".to_string(),
            name: "Alameda - San Bernardo".to_string(),
            description: "Alameda, Gran Avenida, La Cisterna, San Bernardo".to_string(),
            center: GeoPoint {
                latitude: -33.5180,
                longitude: -70.6693,
            },
            stops: vec![
                RouteStop::new("Alameda - Amunátegui", -33.4489, -70.6693),
                RouteStop::new("Santo Domingo / Catedral", -33.4420, -70.6650),
                RouteStop::new("Manuel Rodríguez", -33.4650, -70.6600),
                RouteStop::new("La Cisterna", -33.5320, -70.6620),
                RouteStop::new("San Bernardo Centro", -33.5920, -70.7000),
            ],
        }
    }
}

impl RouteConfig {
    /// Case-insensitive lookup of a stop by name prefix.
    pub fn find_stop(&self, query: &str) -> Option<&RouteStop> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return None;
        }
        self.stops
            .iter()
            .find(|s| s.name.to_lowercase().starts_with(&query))
    }
}

/// Seat limits for drivers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    pub default_seats: u32,
    pub max_seats: u32,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            default_seats: 4,
            max_seats: 4,
        }
    }
}
