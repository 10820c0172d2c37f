//! AR guidance anchors: the camera-relative compass and the world-anchored
//! ground marker, fed from one heading/turn-decision stream.

pub mod compass;
pub mod ground;

pub use compass::{smooth_damp, CompassAnchor, CompassView};
pub use ground::{GroundMarker, GroundMarkerEvent, GroundMarkerState, GroundMarkerView};

use serde::{Deserialize, Serialize};

use crate::config::GuidanceConfig;
use crate::route::TurnDecision;
use crate::types::FrameInput;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GuidanceEvent {
    WrongWayChanged { wrong_way: bool },
    GroundMarker(GroundMarkerEvent),
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GuidanceView {
    pub compass: CompassView,
    pub ground: GroundMarkerView,
}

pub struct GuidanceMarkerController {
    compass: CompassAnchor,
    ground: GroundMarker,
}

impl GuidanceMarkerController {
    pub fn new(config: &GuidanceConfig) -> Self {
        GuidanceMarkerController {
            compass: CompassAnchor::new(config),
            ground: GroundMarker::new(config),
        }
    }

    /// Recompute targets after a position or heading update.
    pub fn update(
        &mut self,
        general_bearing: Option<f64>,
        heading: Option<f64>,
        decision: Option<&TurnDecision>,
    ) -> Vec<GuidanceEvent> {
        let mut events = Vec::new();
        if let Some(wrong_way) = self.compass.set_target(general_bearing, heading) {
            log::info!("Wrong way: {}", wrong_way);
            events.push(GuidanceEvent::WrongWayChanged { wrong_way });
        }
        events.extend(
            self.ground
                .update_turn(decision)
                .into_iter()
                .map(GuidanceEvent::GroundMarker),
        );
        events
    }

    /// Per rendered frame: advance compass damping and try ground placement.
    pub fn on_frame(&mut self, frame: &FrameInput, heading: Option<f64>) -> Vec<GuidanceEvent> {
        self.compass.advance(frame.dt);
        self.ground
            .on_frame(frame, heading)
            .map(GuidanceEvent::GroundMarker)
            .into_iter()
            .collect()
    }

    pub fn compass(&self) -> &CompassAnchor {
        &self.compass
    }

    pub fn ground(&self) -> &GroundMarker {
        &self.ground
    }

    pub fn view(&self) -> GuidanceView {
        GuidanceView {
            compass: self.compass.view(),
            ground: self.ground.view(),
        }
    }

    /// Back to initial state (AR overlay closed or session ended).
    pub fn reset(&mut self) {
        self.compass.reset();
        self.ground.reset();
    }
}
