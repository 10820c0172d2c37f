use geo::Coord;
use serde::{Deserialize, Serialize};

use super::Route;
use crate::geodesy;

/// Where a point lands on a route.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RouteProjection {
    /// Index of the start vertex of the segment holding the projection.
    pub nearest_index: usize,
    /// Distance from the route start to the projected point (m).
    pub distance_along_route: f64,
    /// Signed perpendicular distance from the route (m, + right, - left).
    pub lateral_offset: f64,
    /// The projected point itself, used for snap-to-road.
    pub snapped: Coord<f64>,
}

/// Projects arbitrary points onto a route polyline.
///
/// Each segment is evaluated in a local tangent plane centred on the query
/// point; the segment with the smallest perpendicular distance wins, ties
/// going to the earlier segment so forward travel stays monotonic.
/// Self-intersecting routes may project onto the wrong pass of the crossing.
pub struct RouteProjector;

impl RouteProjector {
    pub fn project(route: &Route, point: Coord<f64>) -> Option<RouteProjection> {
        let (index, snapped, lateral_offset) = Self::nearest_on_segments(route.coords(), point)?;
        let seg_start = route.cumulative_distance(index);
        let seg_len = route.cumulative_distance(index + 1) - seg_start;
        let along_segment = geodesy::distance_m(route.coords()[index], snapped);
        Some(RouteProjection {
            nearest_index: index,
            distance_along_route: seg_start + along_segment.min(seg_len),
            lateral_offset,
            snapped,
        })
    }

    /// Returns (segment index, projected point, signed lateral offset).
    fn nearest_on_segments(
        coords: &[Coord<f64>],
        point: Coord<f64>,
    ) -> Option<(usize, Coord<f64>, f64)> {
        if coords.len() < 2 || !geodesy::is_valid_coord(point) {
            return None;
        }

        let mut best: Option<(usize, f64, (f64, f64), f64)> = None; // (idx, dist, closest, cross)
        for (i, pair) in coords.windows(2).enumerate() {
            let (ax, ay) = geodesy::to_local_meters(pair[0], point);
            let (bx, by) = geodesy::to_local_meters(pair[1], point);
            let (dx, dy) = (bx - ax, by - ay);
            let len_sq = dx * dx + dy * dy;

            // Query point is the origin, so (P - A) = -A.
            let t = if len_sq < 1e-12 {
                0.0
            } else {
                ((-ax) * dx + (-ay) * dy) / len_sq
            }
            .clamp(0.0, 1.0);

            let closest = (ax + dx * t, ay + dy * t);
            let dist = (closest.0 * closest.0 + closest.1 * closest.1).sqrt();
            let cross = (-ax) * dy - (-ay) * dx;

            if best.map_or(true, |(_, best_dist, ..)| dist < best_dist - 1e-9) {
                best = Some((i, dist, closest, cross));
            }
        }

        let (index, dist, closest, cross) = best?;
        let snapped = geodesy::from_local_meters(closest.0, closest.1, point);
        let lateral_offset = if cross < 0.0 { -dist } else { dist };
        Some((index, snapped, lateral_offset))
    }
}
