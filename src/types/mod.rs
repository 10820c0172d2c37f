use geo::Coord;
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::geodesy;

/// A fix from the device position sensor.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    pub timestamp: f64,
    pub longitude: f64,
    pub latitude: f64,
    /// Reported horizontal accuracy radius (m).
    pub accuracy: f64,
}

impl PositionSample {
    pub fn new(timestamp: f64, longitude: f64, latitude: f64, accuracy: f64) -> Self {
        Self {
            timestamp,
            longitude,
            latitude,
            accuracy,
        }
    }

    pub fn coord(&self) -> Coord<f64> {
        Coord {
            x: self.longitude,
            y: self.latitude,
        }
    }
}

/// Why the position sensor failed to deliver a fix.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionErrorKind {
    PermissionDenied,
    Unavailable,
    Timeout,
}

/// A raw orientation reading.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", content = "degrees", rename_all = "snake_case")]
pub enum HeadingSample {
    /// Clockwise compass heading (0 = north), e.g. `webkitCompassHeading`.
    Compass(f64),
    /// Counter-clockwise device `alpha` angle from an absolute orientation event.
    DeviceAlpha(f64),
}

impl HeadingSample {
    /// Compass heading in [0, 360), or `None` when the reading is not a number.
    pub fn compass_degrees(&self) -> Option<f64> {
        let raw = match *self {
            HeadingSample::Compass(deg) => deg,
            HeadingSample::DeviceAlpha(alpha) => 360.0 - alpha,
        };
        raw.is_finite().then(|| geodesy::normalize_degrees(raw))
    }
}

/// Pose in the AR session's local reference frame (Y up, -Z forward).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vec3,
    pub orientation: Quat,
}

impl Pose {
    pub fn new(position: Vec3, orientation: Quat) -> Self {
        Self {
            position,
            orientation,
        }
    }

    /// Viewing direction flattened onto the horizontal plane.
    ///
    /// `None` when looking straight up or down.
    pub fn horizontal_forward(&self) -> Option<Vec3> {
        let mut forward = self.orientation * Vec3::NEG_Z;
        forward.y = 0.0;
        if forward.length_squared() < 1e-6 {
            return None;
        }
        forward.try_normalize()
    }

    /// Direction of the pose's local +Y axis (a surface normal for hit-test poses).
    pub fn up(&self) -> Vec3 {
        self.orientation * Vec3::Y
    }

    /// Rotation about the vertical axis, radians (counter-clockwise seen from above).
    pub fn yaw(&self) -> f32 {
        let (yaw, _, _) = self.orientation.to_euler(glam::EulerRot::YXZ);
        yaw
    }
}

/// Per-rendered-frame input from the AR collaborator.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameInput {
    /// Seconds since the previous frame.
    pub dt: f64,
    pub viewer: Pose,
    /// Best hit-test candidate this frame, if any.
    pub surface: Option<Pose>,
}

/// A place the user asked to be routed to.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Destination {
    pub name: String,
    pub longitude: f64,
    pub latitude: f64,
}

impl Destination {
    pub fn new(name: impl Into<String>, longitude: f64, latitude: f64) -> Self {
        Self {
            name: name.into(),
            longitude,
            latitude,
        }
    }

    pub fn coord(&self) -> Coord<f64> {
        Coord {
            x: self.longitude,
            y: self.latitude,
        }
    }
}
