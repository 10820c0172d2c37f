//! Screen-relative compass arrow.
//!
//! The arrow yaws by the signed difference between the route's general
//! direction and the user's heading, and tilts forward more the better the
//! user is aligned. Both angles chase their targets through a critically
//! damped spring so sensor noise does not make the arrow shake.

use glam::{EulerRot, Quat};
use serde::{Deserialize, Serialize};

use crate::config::GuidanceConfig;
use crate::geodesy;

/// Presentation state of the compass anchor.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompassView {
    pub visible: bool,
    /// Signed bearing-minus-heading difference (deg, + = target to the right).
    pub heading_offset_deg: f64,
    /// Damped yaw applied to the model (deg).
    pub yaw_deg: f64,
    /// Damped forward tilt (deg).
    pub tilt_deg: f64,
    pub rotation: Quat,
    pub wrong_way: bool,
}

/// Critically damped approach of `current` toward `target`.
///
/// Mirrors the usual game-engine `SmoothDamp`: `velocity` carries state
/// between calls and the result never overshoots the target.
pub fn smooth_damp(current: f64, target: f64, velocity: &mut f64, smooth_time: f64, dt: f64) -> f64 {
    if dt <= 0.0 {
        return current;
    }
    let smooth_time = smooth_time.max(1e-4);
    let omega = 2.0 / smooth_time;
    let x = omega * dt;
    let exp = 1.0 / (1.0 + x + 0.48 * x * x + 0.235 * x * x * x);

    let change = current - target;
    let temp = (*velocity + omega * change) * dt;
    *velocity = (*velocity - omega * temp) * exp;
    let mut output = target + (change + temp) * exp;

    if (target - current > 0.0) == (output > target) {
        output = target;
        *velocity = 0.0;
    }
    output
}

/// Compass anchor state: targets, damped values and the wrong-way flag.
#[derive(Clone, Debug)]
pub struct CompassAnchor {
    max_tilt_deg: f64,
    min_tilt_deg: f64,
    yaw_offset_deg: f64,
    wrong_way_threshold_deg: f64,
    smooth_time_s: f64,

    offset_deg: Option<f64>,
    target_yaw: f64,
    target_tilt: f64,
    /// Damped values; `None` until the first target so it can snap in.
    yaw: Option<f64>,
    tilt: f64,
    yaw_velocity: f64,
    tilt_velocity: f64,
    wrong_way: bool,
}

impl CompassAnchor {
    pub fn new(config: &GuidanceConfig) -> Self {
        CompassAnchor {
            max_tilt_deg: config.compass_max_tilt_deg,
            min_tilt_deg: config.compass_min_tilt_deg,
            yaw_offset_deg: config.compass_yaw_offset_deg,
            wrong_way_threshold_deg: config.wrong_way_threshold_deg,
            smooth_time_s: config.compass_smooth_time_s,
            offset_deg: None,
            target_yaw: 0.0,
            target_tilt: 0.0,
            yaw: None,
            tilt: 0.0,
            yaw_velocity: 0.0,
            tilt_velocity: 0.0,
            wrong_way: false,
        }
    }

    /// Tilt for a given bearing offset: steep when aligned, floored when
    /// facing away.
    pub fn tilt_for_offset(&self, offset_deg: f64) -> f64 {
        let aligned = (offset_deg.to_radians() / 2.0).cos().abs();
        (self.max_tilt_deg * aligned).max(self.min_tilt_deg)
    }

    /// Feed the latest general-direction bearing and smoothed heading.
    ///
    /// Either being unknown hides the arrow. Returns the new wrong-way flag
    /// when it changed.
    pub fn set_target(&mut self, bearing: Option<f64>, heading: Option<f64>) -> Option<bool> {
        let was_wrong_way = self.wrong_way;

        match (bearing, heading) {
            (Some(bearing), Some(heading)) => {
                let offset = geodesy::signed_angle_diff(heading, bearing);
                self.offset_deg = Some(offset);
                self.target_yaw = -offset + self.yaw_offset_deg;
                self.target_tilt = self.tilt_for_offset(offset);
                // No hysteresis band: flips exactly at the threshold.
                self.wrong_way = offset.abs() > self.wrong_way_threshold_deg;
                if self.yaw.is_none() {
                    self.yaw = Some(self.target_yaw);
                    self.tilt = self.target_tilt;
                }
            }
            _ => {
                self.offset_deg = None;
                self.wrong_way = false;
            }
        }

        (self.wrong_way != was_wrong_way).then_some(self.wrong_way)
    }

    /// Advance the damping by one frame.
    pub fn advance(&mut self, dt: f64) {
        let Some(yaw) = self.yaw else {
            return;
        };
        // Chase the target the short way around.
        let target = yaw + geodesy::signed_angle_diff(yaw, self.target_yaw);
        let yaw = smooth_damp(yaw, target, &mut self.yaw_velocity, self.smooth_time_s, dt);
        self.yaw = Some(geodesy::signed_angle_diff(0.0, yaw));
        self.tilt = smooth_damp(
            self.tilt,
            self.target_tilt,
            &mut self.tilt_velocity,
            self.smooth_time_s,
            dt,
        );
    }

    pub fn is_visible(&self) -> bool {
        self.offset_deg.is_some()
    }

    pub fn is_wrong_way(&self) -> bool {
        self.wrong_way
    }

    pub fn view(&self) -> CompassView {
        let yaw_deg = self.yaw.unwrap_or(0.0);
        CompassView {
            visible: self.is_visible(),
            heading_offset_deg: self.offset_deg.unwrap_or(0.0),
            yaw_deg,
            tilt_deg: self.tilt,
            rotation: Quat::from_euler(
                EulerRot::YXZ,
                yaw_deg.to_radians() as f32,
                self.tilt.to_radians() as f32,
                0.0,
            ),
            wrong_way: self.wrong_way,
        }
    }

    pub fn reset(&mut self) {
        self.offset_deg = None;
        self.yaw = None;
        self.tilt = 0.0;
        self.yaw_velocity = 0.0;
        self.tilt_velocity = 0.0;
        self.wrong_way = false;
    }
}
