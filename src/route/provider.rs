use geo::Coord;
use serde::{Deserialize, Serialize};

use crate::error::{NavError, NavResult};

/// A directions-service answer: the walking polyline and its totals.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RouteResponse {
    /// `(lon, lat)` vertices from origin to destination.
    pub coordinates: Vec<Coord<f64>>,
    #[serde(default)]
    pub distance_m: Option<f64>,
    #[serde(default)]
    pub duration_s: Option<f64>,
}

/// Fetches walking routes. Implemented by the host for its directions service.
pub trait RouteProvider {
    fn fetch_route(&mut self, origin: Coord<f64>, destination: Coord<f64>) -> NavResult<RouteResponse>;
}

impl<F> RouteProvider for F
where
    F: FnMut(Coord<f64>, Coord<f64>) -> NavResult<RouteResponse>,
{
    fn fetch_route(&mut self, origin: Coord<f64>, destination: Coord<f64>) -> NavResult<RouteResponse> {
        self(origin, destination)
    }
}

/// Serves a pre-recorded route regardless of origin, e.g. for trace replay.
#[derive(Clone, Debug, Default)]
pub struct FixedRouteProvider {
    response: Option<RouteResponse>,
    requests: u32,
}

impl FixedRouteProvider {
    pub fn new(response: RouteResponse) -> Self {
        FixedRouteProvider {
            response: Some(response),
            requests: 0,
        }
    }

    /// A provider that always reports "no route found".
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> u32 {
        self.requests
    }
}

impl RouteProvider for FixedRouteProvider {
    fn fetch_route(&mut self, _origin: Coord<f64>, _destination: Coord<f64>) -> NavResult<RouteResponse> {
        self.requests += 1;
        self.response
            .clone()
            .ok_or_else(|| NavError::RouteProvider("no route found".to_string()))
    }
}
