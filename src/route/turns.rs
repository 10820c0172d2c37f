//! Upcoming-turn detection along a route.
//!
//! A turn is a vertex where the bearing of the outgoing segment differs
//! from the incoming one by more than a threshold. Direction follows the
//! sign of the clockwise bearing change: positive is `Right`, negative is
//! `Left`.

use geo::Coord;
use serde::{Deserialize, Serialize};

use super::{Route, RouteProjection, MIN_SEGMENT_M};
use crate::config::TurnConfig;
use crate::geodesy;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnDirection {
    Left,
    Right,
    Straight,
}

impl TurnDirection {
    pub fn from_signed_angle(angle_deg: f64) -> Self {
        if angle_deg > 0.0 {
            TurnDirection::Right
        } else if angle_deg < 0.0 {
            TurnDirection::Left
        } else {
            TurnDirection::Straight
        }
    }

    pub fn instruction(&self) -> &'static str {
        match self {
            TurnDirection::Left => "turn left",
            TurnDirection::Right => "turn right",
            TurnDirection::Straight => "continue straight",
        }
    }
}

/// The nearest upcoming direction change ahead of the user.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TurnDecision {
    pub has_turn: bool,
    pub direction: TurnDirection,
    /// Great-circle distance from the user to the turn vertex (or route end).
    pub distance_to_turn: f64,
    /// Bearing of the segment leaving the turn (or user → route end when straight).
    pub turn_bearing: f64,
    /// Vertex index of the turn; identifies one turn occurrence.
    pub turn_index: Option<usize>,
    /// Signed bearing change at the turn vertex (degrees).
    pub turn_angle: f64,
}

impl TurnDecision {
    pub fn straight_to(distance_to_end: f64, bearing: f64) -> Self {
        TurnDecision {
            has_turn: false,
            direction: TurnDirection::Straight,
            distance_to_turn: distance_to_end,
            turn_bearing: bearing,
            turn_index: None,
            turn_angle: 0.0,
        }
    }

    /// E.g. "In 50 m, turn right".
    pub fn describe(&self) -> String {
        let distance = super::format_distance(self.distance_to_turn);
        if self.has_turn {
            format!("In {}, {}", distance, self.direction.instruction())
        } else {
            format!("Continue straight for {}", distance)
        }
    }
}

/// Scans the route ahead of the user's projection for turns.
#[derive(Clone, Debug)]
pub struct TurnDetector {
    config: TurnConfig,
}

impl TurnDetector {
    pub fn new(config: TurnConfig) -> Self {
        TurnDetector { config }
    }

    pub fn config(&self) -> &TurnConfig {
        &self.config
    }

    /// Signed bearing change at interior vertex `i` plus the outgoing bearing,
    /// or `None` for endpoints and degenerate segments.
    fn vertex_turn(coords: &[Coord<f64>], i: usize) -> Option<(f64, f64)> {
        if i == 0 || i + 1 >= coords.len() {
            return None;
        }
        let (a, b, c) = (coords[i - 1], coords[i], coords[i + 1]);
        if geodesy::distance_m(a, b) < MIN_SEGMENT_M || geodesy::distance_m(b, c) < MIN_SEGMENT_M {
            return None;
        }
        let incoming = geodesy::bearing_deg(a, b);
        let outgoing = geodesy::bearing_deg(b, c);
        Some((geodesy::signed_angle_diff(incoming, outgoing), outgoing))
    }

    /// Find the first vertex ahead of `projection` whose turn angle exceeds
    /// the configured threshold.
    ///
    /// Walks triples `(p[i], p[i+1], p[i+2])` from `projection.nearest_index`;
    /// the final two vertices never form a turn. Linear in route length.
    pub fn detect_next_turn(
        &self,
        route: &Route,
        user: Coord<f64>,
        projection: &RouteProjection,
    ) -> TurnDecision {
        let coords = route.coords();
        let start = projection.nearest_index;
        let mut end = coords.len().saturating_sub(2);
        if let Some(limit) = self.config.lookahead_vertices {
            end = end.min(start.saturating_add(limit));
        }

        for i in start..end {
            let Some((angle, outgoing)) = Self::vertex_turn(coords, i + 1) else {
                continue;
            };
            if angle.abs() > self.config.turn_angle_threshold_deg {
                let vertex = coords[i + 1];
                return TurnDecision {
                    has_turn: true,
                    direction: TurnDirection::from_signed_angle(angle),
                    distance_to_turn: geodesy::distance_m(user, vertex),
                    turn_bearing: outgoing,
                    turn_index: Some(i + 1),
                    turn_angle: angle,
                };
            }
        }

        let end_point = route.destination();
        TurnDecision::straight_to(
            geodesy::distance_m(user, end_point),
            geodesy::bearing_deg(user, end_point),
        )
    }

    /// Bearing the compass should point along: toward the first vertex at
    /// least `compass_min_ahead_m` further along the route whose bend exceeds
    /// the looser compass threshold, else toward the route's end.
    ///
    /// Reacts to smaller bends than [`detect_next_turn`](Self::detect_next_turn)
    /// so the compass anticipates direction changes. `None` when the target
    /// coincides with the user.
    pub fn general_direction(
        &self,
        route: &Route,
        user: Coord<f64>,
        projection: &RouteProjection,
    ) -> Option<f64> {
        let coords = route.coords();
        let min_along = projection.distance_along_route + self.config.compass_min_ahead_m;

        let target = (projection.nearest_index + 1..coords.len().saturating_sub(1))
            .filter(|&j| route.cumulative_distance(j) >= min_along)
            .find(|&j| {
                Self::vertex_turn(coords, j)
                    .map_or(false, |(angle, _)| angle.abs() > self.config.compass_angle_threshold_deg)
            })
            .map(|j| coords[j])
            .unwrap_or_else(|| route.destination());

        if geodesy::distance_m(user, target) < MIN_SEGMENT_M {
            return None;
        }
        Some(geodesy::bearing_deg(user, target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::RouteProjector;
    use approx::assert_abs_diff_eq;

    fn c(x: f64, y: f64) -> Coord<f64> {
        Coord { x, y }
    }

    fn detector() -> TurnDetector {
        TurnDetector::new(TurnConfig::default())
    }

    fn decide(route: &Route, user: Coord<f64>) -> TurnDecision {
        let projection = RouteProjector::project(route, user).unwrap();
        detector().detect_next_turn(route, user, &projection)
    }

    #[test]
    fn test_right_angle_reference_scenario() {
        let route = Route::new(vec![c(0.0, 0.0), c(0.0, 0.001), c(0.002, 0.001)]).unwrap();
        let decision = decide(&route, c(0.0, 0.0005));
        assert!(decision.has_turn);
        // North then east is a clockwise bearing change.
        assert_eq!(decision.direction, TurnDirection::Right);
        assert_eq!(decision.turn_index, Some(1));
        assert_abs_diff_eq!(decision.distance_to_turn, 55.6, epsilon = 0.5);
        assert_abs_diff_eq!(decision.turn_bearing, 90.0, epsilon = 0.1);
        assert_abs_diff_eq!(decision.turn_angle, 90.0, epsilon = 0.1);
    }

    #[test]
    fn test_left_turn() {
        let route = Route::new(vec![c(0.0, 0.0), c(0.0, 0.001), c(-0.002, 0.001)]).unwrap();
        let decision = decide(&route, c(0.0, 0.0002));
        assert_eq!(decision.direction, TurnDirection::Left);
        assert_abs_diff_eq!(decision.turn_bearing, 270.0, epsilon = 0.1);
    }

    #[test]
    fn test_distance_decreases_toward_bend() {
        let route = Route::new(vec![
            c(0.0, 0.0),
            c(0.0, 0.0005),
            c(0.0, 0.001),
            c(0.001, 0.001),
        ])
        .unwrap();
        let mut last = f64::INFINITY;
        for step in 0..20 {
            let user = c(0.0, 0.001 * step as f64 / 20.0);
            let decision = decide(&route, user);
            assert!(decision.has_turn, "step {step}");
            assert_eq!(decision.turn_index, Some(2));
            assert!(decision.distance_to_turn < last, "step {step}");
            last = decision.distance_to_turn;
        }
    }

    #[test]
    fn test_gentle_bend_is_straight() {
        // ~11° bend stays under the 30° threshold.
        let route = Route::new(vec![c(0.0, 0.0), c(0.0, 0.001), c(0.0002, 0.002)]).unwrap();
        let decision = decide(&route, c(0.0, 0.0001));
        assert!(!decision.has_turn);
        assert_eq!(decision.direction, TurnDirection::Straight);
        assert_eq!(decision.turn_index, None);
        let to_end = geodesy::distance_m(c(0.0, 0.0001), c(0.0002, 0.002));
        assert_abs_diff_eq!(decision.distance_to_turn, to_end, epsilon = 1e-6);
    }

    #[test]
    fn test_two_point_route_has_no_turn() {
        let route = Route::new(vec![c(0.0, 0.0), c(0.0, 0.001)]).unwrap();
        let decision = decide(&route, c(0.0, 0.0));
        assert!(!decision.has_turn);
        assert_abs_diff_eq!(decision.distance_to_turn, 111.2, epsilon = 0.5);
    }

    #[test]
    fn test_turns_behind_are_ignored() {
        let route = Route::new(vec![c(0.0, 0.0), c(0.0, 0.001), c(0.002, 0.001), c(0.004, 0.001)])
            .unwrap();
        let decision = decide(&route, c(0.001, 0.001));
        assert!(!decision.has_turn);
    }

    #[test]
    fn test_lookahead_limit() {
        let route = Route::new(vec![
            c(0.0, 0.0),
            c(0.0, 0.001),
            c(0.0, 0.002),
            c(0.0, 0.003),
            c(0.001, 0.003),
        ])
        .unwrap();
        let limited = TurnDetector::new(TurnConfig {
            lookahead_vertices: Some(1),
            ..TurnConfig::default()
        });
        let user = c(0.0, 0.0001);
        let projection = RouteProjector::project(&route, user).unwrap();
        assert!(!limited.detect_next_turn(&route, user, &projection).has_turn);
        assert!(detector().detect_next_turn(&route, user, &projection).has_turn);
    }

    #[test]
    fn test_duplicate_vertices_do_not_fake_turns() {
        let route = Route::new(vec![c(0.0, 0.0), c(0.0, 0.001), c(0.0, 0.001), c(0.0, 0.002)])
            .unwrap();
        assert!(!decide(&route, c(0.0, 0.0001)).has_turn);
    }

    #[test]
    fn test_repeated_corner_still_turns() {
        let route = Route::new(vec![c(0.0, 0.0), c(0.0, 0.001), c(0.0, 0.001), c(0.002, 0.001)])
            .unwrap();
        let decision = decide(&route, c(0.0, 0.0005));
        assert!(decision.has_turn);
        assert_eq!(decision.direction, TurnDirection::Right);
        assert_eq!(decision.turn_index, Some(1));
        assert_abs_diff_eq!(decision.distance_to_turn, 55.6, epsilon = 0.5);
    }

    #[test]
    fn test_general_direction_anticipates_gentle_bend() {
        // 20° bend: below the turn threshold, above the compass threshold.
        let bend = c(0.0, 0.001);
        let route = Route::new(vec![c(0.0, 0.0), bend, c(0.000364, 0.002)]).unwrap();
        let user = c(0.0, 0.0002);
        let projection = RouteProjector::project(&route, user).unwrap();
        let det = detector();
        assert!(!det.detect_next_turn(&route, user, &projection).has_turn);
        let bearing = det.general_direction(&route, user, &projection).unwrap();
        assert_abs_diff_eq!(bearing, geodesy::bearing_deg(user, bend), epsilon = 1e-9);
    }

    #[test]
    fn test_general_direction_skips_close_vertices() {
        let route = Route::new(vec![c(0.0, 0.0), c(0.0, 0.001), c(0.002, 0.001)]).unwrap();
        // 5 m before the corner, closer than compass_min_ahead_m: aim at the end.
        let user = c(0.0, 0.001 - 0.000045);
        let projection = RouteProjector::project(&route, user).unwrap();
        let bearing = detector().general_direction(&route, user, &projection).unwrap();
        let to_end = geodesy::bearing_deg(user, c(0.002, 0.001));
        assert_abs_diff_eq!(bearing, to_end, epsilon = 1e-9);
    }

    #[test]
    fn test_describe() {
        let decision = TurnDecision {
            has_turn: true,
            direction: TurnDirection::Left,
            distance_to_turn: 48.0,
            turn_bearing: 270.0,
            turn_index: Some(3),
            turn_angle: -90.0,
        };
        assert_eq!(decision.describe(), "In 50 m, turn left");
        assert_eq!(
            TurnDecision::straight_to(230.0, 0.0).describe(),
            "Continue straight for 230 m"
        );
    }
}
