use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::config::GuidanceConfig;
use crate::geodesy;
use crate::route::TurnDecision;
use crate::types::{FrameInput, Pose};

/// World-anchored turn arrow.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum GroundMarkerState {
    /// No turn nearby.
    Inactive,
    /// A turn is close; waiting for a walkable surface.
    Scanning { turn_index: usize, turn_bearing: f64 },
    /// Latched for this turn occurrence; surfaces are no longer consulted.
    Placed { turn_index: usize, pose: Pose },
}

/// What changed on the ground marker.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GroundMarkerEvent {
    Scanning { turn_index: usize },
    Placed { turn_index: usize, pose: Pose },
    Cleared,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroundMarkerView {
    pub visible: bool,
    /// Scanning without a surface: show the "searching" hint.
    pub searching: bool,
    pub pose: Option<Pose>,
    pub turn_index: Option<usize>,
}

#[derive(Clone, Debug)]
pub struct GroundMarker {
    turn_proximity_m: f64,
    surface_tolerance_deg: f32,
    spawn_distance_m: f32,
    yaw_offset_deg: f64,
    state: GroundMarkerState,
}

impl GroundMarker {
    pub fn new(config: &GuidanceConfig) -> Self {
        GroundMarker {
            turn_proximity_m: config.turn_proximity_m,
            surface_tolerance_deg: config.surface_tolerance_deg,
            spawn_distance_m: config.ground_spawn_distance_m,
            yaw_offset_deg: config.ground_yaw_offset_deg,
            state: GroundMarkerState::Inactive,
        }
    }

    pub fn state(&self) -> GroundMarkerState {
        self.state
    }

    /// Track the current turn decision.
    ///
    /// A turn within proximity starts scanning unless the marker is already
    /// placed for that same turn; anything else clears the marker.
    pub fn update_turn(&mut self, decision: Option<&TurnDecision>) -> Vec<GroundMarkerEvent> {
        let imminent = decision
            .filter(|d| d.has_turn && d.distance_to_turn <= self.turn_proximity_m)
            .and_then(|d| d.turn_index.map(|idx| (idx, d.turn_bearing)));

        let mut events = Vec::new();
        match (imminent, self.state) {
            (Some((idx, _)), GroundMarkerState::Placed { turn_index, .. }) if idx == turn_index => {}
            (Some((idx, bearing)), GroundMarkerState::Scanning { turn_index, .. }) if idx == turn_index => {
                self.state = GroundMarkerState::Scanning {
                    turn_index,
                    turn_bearing: bearing,
                };
            }
            (Some((idx, bearing)), previous) => {
                if previous != GroundMarkerState::Inactive {
                    events.push(GroundMarkerEvent::Cleared);
                }
                log::debug!("Turn {} within range, scanning for surface", idx);
                self.state = GroundMarkerState::Scanning {
                    turn_index: idx,
                    turn_bearing: bearing,
                };
                events.push(GroundMarkerEvent::Scanning { turn_index: idx });
            }
            (None, GroundMarkerState::Inactive) => {}
            (None, _) => {
                log::debug!("Turn cleared, hiding ground marker");
                self.state = GroundMarkerState::Inactive;
                events.push(GroundMarkerEvent::Cleared);
            }
        }
        events
    }

    fn is_walkable(&self, surface: &Pose) -> bool {
        let up = surface.up();
        up.length_squared() > 0.0 && up.angle_between(Vec3::Y).to_degrees() <= self.surface_tolerance_deg
    }

    /// Try to place the marker from this frame's surface candidate.
    ///
    /// Only consulted while scanning; needs a horizontal surface, a viewer
    /// not looking straight up/down, and a known heading.
    pub fn on_frame(&mut self, frame: &FrameInput, heading: Option<f64>) -> Option<GroundMarkerEvent> {
        let GroundMarkerState::Scanning {
            turn_index,
            turn_bearing,
        } = self.state
        else {
            return None;
        };
        let heading = heading?;
        let surface = frame.surface.filter(|s| self.is_walkable(s))?;
        let forward = frame.viewer.horizontal_forward()?;

        let mut position = frame.viewer.position + forward * self.spawn_distance_m;
        position.y = surface.position.y;

        // Viewer yaw is counter-clockwise; bearings are clockwise.
        let turn_offset = geodesy::signed_angle_diff(heading, turn_bearing);
        let yaw = frame.viewer.yaw() as f64 - turn_offset.to_radians() + self.yaw_offset_deg.to_radians();
        let pose = Pose::new(position, Quat::from_rotation_y(yaw as f32));

        log::info!(
            "Ground marker placed for turn {} at ({:.2}, {:.2}, {:.2})",
            turn_index,
            position.x,
            position.y,
            position.z
        );
        self.state = GroundMarkerState::Placed { turn_index, pose };
        Some(GroundMarkerEvent::Placed { turn_index, pose })
    }

    pub fn view(&self) -> GroundMarkerView {
        match self.state {
            GroundMarkerState::Inactive => GroundMarkerView {
                visible: false,
                searching: false,
                pose: None,
                turn_index: None,
            },
            GroundMarkerState::Scanning { turn_index, .. } => GroundMarkerView {
                visible: false,
                searching: true,
                pose: None,
                turn_index: Some(turn_index),
            },
            GroundMarkerState::Placed { turn_index, pose } => GroundMarkerView {
                visible: true,
                searching: false,
                pose: Some(pose),
                turn_index: Some(turn_index),
            },
        }
    }

    pub fn reset(&mut self) {
        self.state = GroundMarkerState::Inactive;
    }
}
