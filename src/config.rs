//! Tunable thresholds for the guidance engine.
//!
//! Every section is `#[serde(default)]`, so a JSON file only needs the
//! fields it wants to override.

use std::path::Path;

use geo::Coord;
use serde::{Deserialize, Serialize};

use crate::error::{NavError, NavResult};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NavConfig {
    pub heading: HeadingConfig,
    pub turns: TurnConfig,
    pub session: SessionConfig,
    pub guidance: GuidanceConfig,
    pub camera: CameraConfig,
    pub geofence: GeofenceConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadingConfig {
    /// Fraction of the angular error applied per sample, in (0, 1).
    pub smoothing_factor: f64,
}

impl Default for HeadingConfig {
    fn default() -> Self {
        Self {
            smoothing_factor: 0.1,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TurnConfig {
    /// Minimum bearing change at a vertex to count as a turn.
    pub turn_angle_threshold_deg: f64,
    /// Limit the forward scan to this many vertex triples (`None` = route end).
    pub lookahead_vertices: Option<usize>,
    /// Looser threshold used by the compass general-direction query.
    pub compass_angle_threshold_deg: f64,
    /// Vertices closer than this (along the route) are skipped by the compass query.
    pub compass_min_ahead_m: f64,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            turn_angle_threshold_deg: 30.0,
            lookahead_vertices: None,
            compass_angle_threshold_deg: 15.0,
            compass_min_ahead_m: 10.0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Dwell time after the last camera manipulation before guidance resumes.
    pub resume_delay_secs: f64,
    pub arrival_radius_m: f64,
    /// Distance the user must retreat to before arrival can fire again.
    pub arrival_rearm_radius_m: f64,
    /// End the session (→ Idle) when arrival fires.
    pub stop_on_arrival: bool,
    /// Position fixes with a worse reported accuracy are dropped.
    pub max_position_accuracy_m: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            resume_delay_secs: 4.0,
            arrival_radius_m: 15.0,
            arrival_rearm_radius_m: 25.0,
            stop_on_arrival: true,
            max_position_accuracy_m: 100.0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GuidanceConfig {
    /// A turn closer than this activates the ground marker.
    pub turn_proximity_m: f64,
    pub wrong_way_threshold_deg: f64,
    /// Maximum tilt of a surface normal from vertical-up to accept it as floor.
    pub surface_tolerance_deg: f32,
    /// Forward distance from the viewer at which the ground marker is placed.
    pub ground_spawn_distance_m: f32,
    pub compass_max_tilt_deg: f64,
    pub compass_min_tilt_deg: f64,
    /// Model alignment offsets (the arrow meshes are not authored facing -Z).
    pub compass_yaw_offset_deg: f64,
    pub ground_yaw_offset_deg: f64,
    /// Approximate settle time of the compass damping.
    pub compass_smooth_time_s: f64,
}

impl Default for GuidanceConfig {
    fn default() -> Self {
        Self {
            turn_proximity_m: 15.0,
            wrong_way_threshold_deg: 100.0,
            surface_tolerance_deg: 10.0,
            ground_spawn_distance_m: 4.0,
            compass_max_tilt_deg: 40.0,
            compass_min_tilt_deg: 10.0,
            compass_yaw_offset_deg: -15.0,
            ground_yaw_offset_deg: 15.0,
            compass_smooth_time_s: 0.25,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub follow_zoom: f64,
    pub follow_pitch_deg: f64,
    /// (lon, lat) of the overview camera shown when not navigating.
    pub home_center: (f64, f64),
    pub home_zoom: f64,
    pub home_pitch_deg: f64,
    pub home_bearing_deg: f64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            follow_zoom: 19.0,
            follow_pitch_deg: 60.0,
            home_center: (110.7711, -7.5567),
            home_zoom: 16.5,
            home_pitch_deg: 45.0,
            home_bearing_deg: -17.6,
        }
    }
}

impl CameraConfig {
    pub fn home_coord(&self) -> Coord<f64> {
        Coord {
            x: self.home_center.0,
            y: self.home_center.1,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GeofenceConfig {
    /// (lon, lat) of the campus centre.
    pub center: (f64, f64),
    pub radius_m: f64,
    /// When false every position is admitted.
    pub enabled: bool,
}

impl Default for GeofenceConfig {
    fn default() -> Self {
        Self {
            center: (110.7711, -7.5567),
            radius_m: 800.0,
            enabled: false,
        }
    }
}

impl NavConfig {
    pub fn from_json_str(json: &str) -> NavResult<Self> {
        let config: NavConfig = serde_json::from_str(json)
            .map_err(|e| NavError::Config(format!("Failed to parse config JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> NavResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| NavError::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        let config = Self::from_json_str(&contents)?;
        log::info!("Loaded navigation config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> NavResult<()> {
        let alpha = self.heading.smoothing_factor;
        if !(alpha > 0.0 && alpha < 1.0) {
            return Err(NavError::Config(format!(
                "heading.smoothing_factor must be in (0, 1), got {}",
                alpha
            )));
        }
        let t = &self.turns;
        if !(0.0..180.0).contains(&t.turn_angle_threshold_deg)
            || !(0.0..180.0).contains(&t.compass_angle_threshold_deg)
        {
            return Err(NavError::Config(
                "turn angle thresholds must be in [0, 180)".to_string(),
            ));
        }
        if t.compass_min_ahead_m < 0.0 {
            return Err(NavError::Config(
                "turns.compass_min_ahead_m must not be negative".to_string(),
            ));
        }
        let s = &self.session;
        if s.resume_delay_secs < 0.0 || !s.resume_delay_secs.is_finite() {
            return Err(NavError::Config(
                "session.resume_delay_secs must be a non-negative number".to_string(),
            ));
        }
        if s.arrival_radius_m <= 0.0 || s.arrival_rearm_radius_m <= s.arrival_radius_m {
            return Err(NavError::Config(format!(
                "arrival radii must satisfy 0 < arrival ({}) < rearm ({})",
                s.arrival_radius_m, s.arrival_rearm_radius_m
            )));
        }
        let g = &self.guidance;
        if g.turn_proximity_m <= 0.0 || g.ground_spawn_distance_m <= 0.0 {
            return Err(NavError::Config(
                "guidance distances must be positive".to_string(),
            ));
        }
        if g.compass_min_tilt_deg > g.compass_max_tilt_deg {
            return Err(NavError::Config(
                "guidance.compass_min_tilt_deg exceeds compass_max_tilt_deg".to_string(),
            ));
        }
        if g.compass_smooth_time_s <= 0.0 {
            return Err(NavError::Config(
                "guidance.compass_smooth_time_s must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(NavConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config =
            NavConfig::from_json_str(r#"{ "session": { "resume_delay_secs": 2.5 } }"#).unwrap();
        assert_eq!(config.session.resume_delay_secs, 2.5);
        assert_eq!(config.session.arrival_radius_m, 15.0);
        assert_eq!(config.turns.turn_angle_threshold_deg, 30.0);
        assert_eq!(config.heading.smoothing_factor, 0.1);
    }

    #[test]
    fn test_rejects_bad_smoothing_factor() {
        let err = NavConfig::from_json_str(r#"{ "heading": { "smoothing_factor": 1.5 } }"#)
            .unwrap_err();
        assert!(matches!(err, NavError::Config(_)));
    }

    #[test]
    fn test_rejects_inverted_arrival_radii() {
        let err = NavConfig::from_json_str(
            r#"{ "session": { "arrival_radius_m": 30.0, "arrival_rearm_radius_m": 20.0 } }"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("arrival radii"));
    }

    #[test]
    fn test_rejects_malformed_json() {
        assert!(NavConfig::from_json_str("{ not json").is_err());
    }
}
