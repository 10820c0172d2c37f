use geo::Coord;

use crate::config::GeofenceConfig;
use crate::geodesy;

/// Decides whether routing is allowed from a position.
pub trait Geofence {
    fn contains(&self, position: Coord<f64>) -> bool;

    /// Distance to the fence centre, for user-facing messages.
    fn distance_to_center(&self, _position: Coord<f64>) -> Option<f64> {
        None
    }
}

/// Circle around the campus centre. Disabled fences admit everything.
#[derive(Clone, Debug)]
pub struct CircularGeofence {
    center: Coord<f64>,
    radius_m: f64,
    enabled: bool,
}

impl CircularGeofence {
    pub fn new(center: Coord<f64>, radius_m: f64) -> Self {
        CircularGeofence {
            center,
            radius_m,
            enabled: true,
        }
    }

    pub fn from_config(config: &GeofenceConfig) -> Self {
        CircularGeofence {
            center: Coord {
                x: config.center.0,
                y: config.center.1,
            },
            radius_m: config.radius_m,
            enabled: config.enabled,
        }
    }

    /// A fence that admits every position.
    pub fn disabled() -> Self {
        CircularGeofence {
            center: Coord { x: 0.0, y: 0.0 },
            radius_m: 0.0,
            enabled: false,
        }
    }
}

impl Geofence for CircularGeofence {
    fn contains(&self, position: Coord<f64>) -> bool {
        if !self.enabled {
            return true;
        }
        let distance = geodesy::distance_m(position, self.center);
        log::debug!("Geofence: {:.0} m from centre (radius {:.0} m)", distance, self.radius_m);
        distance <= self.radius_m
    }

    fn distance_to_center(&self, position: Coord<f64>) -> Option<f64> {
        Some(geodesy::distance_m(position, self.center))
    }
}
