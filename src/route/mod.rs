pub mod projector;
pub mod provider;
pub mod turns;

pub use projector::{RouteProjection, RouteProjector};
pub use provider::{FixedRouteProvider, RouteProvider, RouteResponse};
pub use turns::{TurnDecision, TurnDetector, TurnDirection};

use geo::{Coord, LineString};
use serde::{Deserialize, Serialize};

use crate::error::{NavError, NavResult};
use crate::geodesy;

/// Segments shorter than this have no meaningful bearing.
pub(crate) const MIN_SEGMENT_M: f64 = 0.05;

/// An immutable walking route: the ordered polyline plus precomputed
/// cumulative distances.
#[derive(Clone, Debug)]
pub struct Route {
    geometry: LineString<f64>,
    /// `cumulative_m[i]` = distance along the route from the start to vertex `i`.
    cumulative_m: Vec<f64>,
    summary: RouteSummary,
}

/// Provider-reported totals, with the geometric length as a fallback.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RouteSummary {
    pub distance_m: f64,
    pub duration_s: Option<f64>,
}

/// Axis-aligned lon/lat bounds of a route, for fitting the map camera.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: (f64, f64),
    pub max: (f64, f64),
}

impl Route {
    /// Build a route from `(lon, lat)` coordinates.
    ///
    /// Fails for fewer than two points or any non-finite coordinate.
    /// Consecutive points closer than [`MIN_SEGMENT_M`] are merged, so every
    /// segment carries a bearing.
    pub fn new(mut coords: Vec<Coord<f64>>) -> NavResult<Self> {
        if coords.len() < 2 {
            return Err(NavError::InvalidRoute(format!(
                "need at least 2 points, got {}",
                coords.len()
            )));
        }
        if let Some(bad) = coords.iter().position(|c| !geodesy::is_valid_coord(*c)) {
            return Err(NavError::InvalidRoute(format!(
                "coordinate {} is not a valid lon/lat",
                bad
            )));
        }
        coords.dedup_by(|next, kept| geodesy::distance_m(*kept, *next) < MIN_SEGMENT_M);
        if coords.len() < 2 {
            return Err(NavError::InvalidRoute("all points coincide".to_string()));
        }

        let mut cumulative_m = Vec::with_capacity(coords.len());
        let mut total = 0.0;
        cumulative_m.push(0.0);
        for pair in coords.windows(2) {
            total += geodesy::distance_m(pair[0], pair[1]);
            cumulative_m.push(total);
        }

        Ok(Route {
            geometry: LineString::new(coords),
            cumulative_m,
            summary: RouteSummary {
                distance_m: total,
                duration_s: None,
            },
        })
    }

    /// Build from a provider response, keeping its distance/duration totals.
    pub fn from_response(response: RouteResponse) -> NavResult<Self> {
        let mut route = Route::new(response.coordinates)?;
        if let Some(distance) = response.distance_m.filter(|d| d.is_finite() && *d >= 0.0) {
            route.summary.distance_m = distance;
        }
        route.summary.duration_s = response.duration_s.filter(|d| d.is_finite() && *d >= 0.0);
        Ok(route)
    }

    pub fn coords(&self) -> &[Coord<f64>] {
        &self.geometry.0
    }

    pub fn geometry(&self) -> &LineString<f64> {
        &self.geometry
    }

    pub fn len(&self) -> usize {
        self.geometry.0.len()
    }

    /// Always false: a route holds at least two points.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn cumulative_distance(&self, index: usize) -> f64 {
        self.cumulative_m[index.min(self.cumulative_m.len() - 1)]
    }

    /// Geometric length along the polyline (m).
    pub fn length_m(&self) -> f64 {
        self.cumulative_m[self.cumulative_m.len() - 1]
    }

    pub fn destination(&self) -> Coord<f64> {
        self.geometry.0[self.geometry.0.len() - 1]
    }

    pub fn summary(&self) -> &RouteSummary {
        &self.summary
    }

    pub fn bounds(&self) -> Bounds {
        let first = self.geometry.0[0];
        let (mut min, mut max) = ((first.x, first.y), (first.x, first.y));
        for c in self.coords() {
            min.0 = min.0.min(c.x);
            min.1 = min.1.min(c.y);
            max.0 = max.0.max(c.x);
            max.1 = max.1.max(c.y);
        }
        Bounds { min, max }
    }
}

/// Human-readable distance: whole tens of meters below 1 km, one decimal above.
pub fn format_distance(meters: f64) -> String {
    if meters >= 1000.0 {
        format!("{:.1} km", meters / 1000.0)
    } else if meters >= 10.0 {
        format!("{} m", (meters / 10.0).round() as i64 * 10)
    } else {
        format!("{} m", meters.max(0.0).round() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn c(x: f64, y: f64) -> Coord<f64> {
        Coord { x, y }
    }

    #[test]
    fn test_rejects_short_routes() {
        assert!(matches!(Route::new(vec![]), Err(NavError::InvalidRoute(_))));
        assert!(matches!(
            Route::new(vec![c(0.0, 0.0)]),
            Err(NavError::InvalidRoute(_))
        ));
    }

    #[test]
    fn test_rejects_non_finite() {
        let err = Route::new(vec![c(0.0, 0.0), c(f64::NAN, 0.0)]).unwrap_err();
        assert!(err.to_string().contains("coordinate 1"));
    }

    #[test]
    fn test_repeated_points_are_merged() {
        let route = Route::new(vec![
            c(0.0, 0.0),
            c(0.0, 0.001),
            c(0.0, 0.001),
            c(0.0, 0.0010001),
            c(0.002, 0.001),
        ])
        .unwrap();
        assert_eq!(route.len(), 3);
        assert_eq!(route.coords()[1], c(0.0, 0.001));
        assert_abs_diff_eq!(route.cumulative_distance(1), 111.2, epsilon = 0.5);
        assert_abs_diff_eq!(route.length_m(), 111.2 + 222.4, epsilon = 1.0);

        let err = Route::new(vec![c(1.0, 1.0), c(1.0, 1.0)]).unwrap_err();
        assert!(matches!(err, NavError::InvalidRoute(_)));
    }

    #[test]
    fn test_cumulative_distances() {
        let route = Route::new(vec![c(0.0, 0.0), c(0.0, 0.001), c(0.002, 0.001)]).unwrap();
        assert_eq!(route.cumulative_distance(0), 0.0);
        assert_abs_diff_eq!(route.cumulative_distance(1), 111.2, epsilon = 0.5);
        assert_abs_diff_eq!(route.length_m(), 111.2 + 222.4, epsilon = 1.0);
        assert_eq!(route.destination(), c(0.002, 0.001));
    }

    #[test]
    fn test_response_totals_override_geometry() {
        let route = Route::from_response(RouteResponse {
            coordinates: vec![c(0.0, 0.0), c(0.0, 0.001)],
            distance_m: Some(120.0),
            duration_s: Some(90.0),
        })
        .unwrap();
        assert_eq!(route.summary().distance_m, 120.0);
        assert_eq!(route.summary().duration_s, Some(90.0));
    }

    #[test]
    fn test_bounds() {
        let route = Route::new(vec![c(1.0, 5.0), c(-2.0, 3.0), c(0.5, 7.0)]).unwrap();
        let b = route.bounds();
        assert_eq!(b.min, (-2.0, 3.0));
        assert_eq!(b.max, (1.0, 7.0));
    }

    #[test]
    fn test_format_distance() {
        assert_eq!(format_distance(150.0), "150 m");
        assert_eq!(format_distance(154.0), "150 m");
        assert_eq!(format_distance(7.4), "7 m");
        assert_eq!(format_distance(2500.0), "2.5 km");
    }
}
