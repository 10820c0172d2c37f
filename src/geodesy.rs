//! Spherical geometry helpers shared by the route and guidance modules.
//!
//! Coordinates are `geo::Coord<f64>` with `x = longitude`, `y = latitude`
//! (degrees), matching the GeoJSON order routes arrive in.

use geo::{Coord, HaversineBearing, HaversineDistance, Point};

/// Mean Earth radius used for local tangent-plane conversions (meters).
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance between two coordinates in meters.
pub fn distance_m(a: Coord<f64>, b: Coord<f64>) -> f64 {
    Point::from(a).haversine_distance(&Point::from(b))
}

/// Initial bearing from `from` to `to`, degrees in [0, 360), 0 = north.
pub fn bearing_deg(from: Coord<f64>, to: Coord<f64>) -> f64 {
    normalize_degrees(Point::from(from).haversine_bearing(Point::from(to)))
}

/// Wrap any angle into [0, 360).
pub fn normalize_degrees(deg: f64) -> f64 {
    let wrapped = deg.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Signed shortest rotation from `from` to `to` in degrees, in [-180, 180].
///
/// Positive values are clockwise (a right turn on a compass rose).
pub fn signed_angle_diff(from: f64, to: f64) -> f64 {
    let mut diff = (to - from).rem_euclid(360.0);
    if diff > 180.0 {
        diff -= 360.0;
    }
    diff
}

/// Project `point` into a local east/north plane (meters) centred on `origin`.
///
/// Equirectangular approximation; accurate to well under a meter at
/// pedestrian scale.
pub fn to_local_meters(point: Coord<f64>, origin: Coord<f64>) -> (f64, f64) {
    let d_lat = (point.y - origin.y).to_radians();
    let d_lon = (point.x - origin.x).to_radians();
    let east = EARTH_RADIUS_M * d_lon * origin.y.to_radians().cos();
    let north = EARTH_RADIUS_M * d_lat;
    (east, north)
}

/// Inverse of [`to_local_meters`].
pub fn from_local_meters(east: f64, north: f64, origin: Coord<f64>) -> Coord<f64> {
    let d_lat = north / EARTH_RADIUS_M;
    let d_lon = east / (EARTH_RADIUS_M * origin.y.to_radians().cos());
    Coord {
        x: origin.x + d_lon.to_degrees(),
        y: origin.y + d_lat.to_degrees(),
    }
}

/// True when both components are finite and within geographic bounds.
pub fn is_valid_coord(c: Coord<f64>) -> bool {
    c.x.is_finite() && c.y.is_finite() && c.x.abs() <= 180.0 && c.y.abs() <= 90.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_bearing_cardinal() {
        let origin = Coord { x: 0.0, y: 0.0 };
        assert_abs_diff_eq!(bearing_deg(origin, Coord { x: 0.0, y: 1.0 }), 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(bearing_deg(origin, Coord { x: 1.0, y: 0.0 }), 90.0, epsilon = 1e-6);
        assert_abs_diff_eq!(bearing_deg(origin, Coord { x: 0.0, y: -1.0 }), 180.0, epsilon = 1e-6);
        assert_abs_diff_eq!(bearing_deg(origin, Coord { x: -1.0, y: 0.0 }), 270.0, epsilon = 1e-6);
    }

    #[test]
    fn test_distance_small_delta() {
        // 0.0005° of latitude ≈ 55.6 m
        let d = distance_m(Coord { x: 0.0, y: 0.0005 }, Coord { x: 0.0, y: 0.001 });
        assert!((d - 55.6).abs() < 0.5, "got {d}");
    }

    #[test]
    fn test_signed_angle_diff_wraps() {
        assert_abs_diff_eq!(signed_angle_diff(350.0, 10.0), 20.0, epsilon = 1e-9);
        assert_abs_diff_eq!(signed_angle_diff(10.0, 350.0), -20.0, epsilon = 1e-9);
        assert_abs_diff_eq!(signed_angle_diff(0.0, 90.0), 90.0, epsilon = 1e-9);
        assert_abs_diff_eq!(signed_angle_diff(90.0, 0.0), -90.0, epsilon = 1e-9);
        assert_abs_diff_eq!(signed_angle_diff(0.0, 180.0).abs(), 180.0, epsilon = 1e-9);
    }

    #[test]
    fn test_normalize_degrees() {
        assert_abs_diff_eq!(normalize_degrees(-10.0), 350.0, epsilon = 1e-9);
        assert_abs_diff_eq!(normalize_degrees(360.0), 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(normalize_degrees(725.0), 5.0, epsilon = 1e-9);
        assert!(normalize_degrees(-1e-15) < 360.0);
    }

    #[test]
    fn test_local_meters_round_trip() {
        let origin = Coord { x: 110.7711, y: -7.5567 };
        let p = Coord { x: 110.7720, y: -7.5560 };
        let (e, n) = to_local_meters(p, origin);
        let back = from_local_meters(e, n, origin);
        assert_abs_diff_eq!(back.x, p.x, epsilon = 1e-9);
        assert_abs_diff_eq!(back.y, p.y, epsilon = 1e-9);
    }
}
