//! The reactive navigation core.
//!
//! `NavigationEngine` owns every stateful component and exposes one entry
//! point per input source. Each entry point recomputes all derived values
//! (projection, turn decision, guidance) from the same input before it
//! returns the events that input produced, so the presentation layer never
//! sees an old position mixed with a new heading.

use geo::Coord;
use serde::{Deserialize, Serialize};

use crate::config::NavConfig;
use crate::error::{NavError, NavResult};
use crate::geofence::{CircularGeofence, Geofence};
use crate::guidance::{GuidanceEvent, GuidanceMarkerController, GuidanceView};
use crate::heading::HeadingFilter;
use crate::route::{
    format_distance, Bounds, RouteProjection, RouteProjector, RouteProvider, TurnDecision, TurnDetector,
};
use crate::session::{NavigationSession, SessionEvent, SessionState};
use crate::types::{Destination, FrameInput, HeadingSample, PositionErrorKind, PositionSample};

/// Instruction for the map collaborator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CameraDirective {
    /// Frame the whole route (preview).
    FitRoute { bounds: Bounds },
    /// Heading-up follow while navigating.
    Follow {
        center: (f64, f64),
        bearing: Option<f64>,
        zoom: f64,
        pitch: f64,
    },
    /// Campus overview after the session ends.
    Home {
        center: (f64, f64),
        zoom: f64,
        pitch: f64,
        bearing: f64,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum NavEvent {
    Session(SessionEvent),
    Guidance(GuidanceEvent),
    Camera(CameraDirective),
    /// The upcoming turn changed (new turn, direction, or none).
    TurnChanged(TurnDecision),
    PositionUnavailable(PositionErrorKind),
    RouteFailed { message: String },
}

/// Everything the presentation layer renders.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NavSnapshot {
    pub state: SessionState,
    pub heading: Option<f64>,
    /// Position after snap-to-road correction, `(lon, lat)`.
    pub position: Option<(f64, f64)>,
    pub snap_to_road: bool,
    pub destination: Option<String>,
    pub turn: Option<TurnDecision>,
    pub instruction: Option<String>,
    pub remaining_m: Option<f64>,
    pub remaining_text: Option<String>,
    pub guidance: GuidanceView,
}

pub struct NavigationEngine {
    config: NavConfig,
    heading: HeadingFilter,
    session: NavigationSession,
    turns: TurnDetector,
    guidance: GuidanceMarkerController,
    geofence: Box<dyn Geofence + Send>,
    provider: Box<dyn RouteProvider + Send>,
    ar_active: bool,
    last_fix_time: Option<f64>,
    projection: Option<RouteProjection>,
    turn: Option<TurnDecision>,
    general_bearing: Option<f64>,
}

impl NavigationEngine {
    pub fn new(config: NavConfig, provider: Box<dyn RouteProvider + Send>) -> Self {
        NavigationEngine {
            heading: HeadingFilter::new(config.heading.smoothing_factor),
            session: NavigationSession::new(config.session.clone()),
            turns: TurnDetector::new(config.turns.clone()),
            guidance: GuidanceMarkerController::new(&config.guidance),
            geofence: Box::new(CircularGeofence::from_config(&config.geofence)),
            provider,
            ar_active: true,
            last_fix_time: None,
            projection: None,
            turn: None,
            general_bearing: None,
            config,
        }
    }

    pub fn with_geofence(mut self, geofence: Box<dyn Geofence + Send>) -> Self {
        self.geofence = geofence;
        self
    }

    pub fn config(&self) -> &NavConfig {
        &self.config
    }

    pub fn session(&self) -> &NavigationSession {
        &self.session
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn heading(&self) -> Option<f64> {
        self.heading.heading()
    }

    pub fn turn(&self) -> Option<&TurnDecision> {
        self.turn.as_ref()
    }

    /// When [`poll_timers`](Self::poll_timers) next needs to run.
    pub fn next_deadline(&self) -> Option<f64> {
        self.session.resume_deadline()
    }

    // ---- commands ----

    pub fn request_route(&mut self, destination: Destination) -> NavResult<Vec<NavEvent>> {
        let was_guiding = self.session.is_guiding();
        let result = self.session.request_route(
            destination,
            self.geofence.as_ref(),
            self.provider.as_mut(),
        );

        // A rejected request leaves the session guiding; keep its guidance.
        let mut events = Vec::new();
        if was_guiding && !self.session.is_guiding() {
            events.extend(self.clear_guidance());
        }
        result?;

        events.extend(self.drain_session_events());
        if let Some(route) = self.session.route() {
            events.push(NavEvent::Camera(CameraDirective::FitRoute {
                bounds: route.bounds(),
            }));
        }
        Ok(events)
    }

    pub fn start_navigating(&mut self) -> NavResult<Vec<NavEvent>> {
        self.session.start_navigating()?;
        let mut events = self.drain_session_events();
        events.extend(self.refresh_guidance());
        events.extend(self.follow_directive());
        Ok(events)
    }

    pub fn cancel(&mut self) -> Vec<NavEvent> {
        self.session.cancel();
        self.drain_session_events()
    }

    pub fn toggle_snap_to_road(&mut self) -> bool {
        self.session.toggle_snap_to_road()
    }

    pub fn start_ar(&mut self) -> Vec<NavEvent> {
        self.ar_active = true;
        self.refresh_guidance()
    }

    /// The AR overlay closed: hide and reset both anchors.
    pub fn end_ar(&mut self) -> Vec<NavEvent> {
        let events = self.clear_guidance();
        self.ar_active = false;
        events
    }

    // ---- inputs ----

    pub fn on_position(&mut self, sample: PositionSample, now: f64) -> Vec<NavEvent> {
        if let Err(e) = self.validate_sample(&sample) {
            log::debug!("{}", e);
            return Vec::new();
        }
        self.last_fix_time = Some(sample.timestamp);

        let mut events = self.poll_timers(now);

        let position = self.session.correct_position(sample.coord());
        self.session.update_position(position);
        events.extend(self.drain_session_events());

        if self.session.is_guiding() {
            events.extend(self.refresh_guidance());
            events.extend(self.follow_directive());
        }
        events
    }

    pub fn on_position_error(&mut self, kind: PositionErrorKind) -> Vec<NavEvent> {
        log::warn!("Position unavailable: {:?}", kind);
        vec![NavEvent::PositionUnavailable(kind)]
    }

    pub fn on_heading(&mut self, sample: HeadingSample) -> Vec<NavEvent> {
        let Some(degrees) = sample.compass_degrees() else {
            log::debug!("Ignoring non-finite heading sample");
            return Vec::new();
        };
        self.heading.update(degrees);

        let mut events = Vec::new();
        if self.session.is_guiding() && self.ar_active {
            events.extend(
                self.guidance
                    .update(self.general_bearing, self.heading.heading(), self.turn.as_ref())
                    .into_iter()
                    .map(NavEvent::Guidance),
            );
        }
        events.extend(self.follow_directive());
        events
    }

    pub fn on_frame(&mut self, frame: FrameInput) -> Vec<NavEvent> {
        if !(self.ar_active && self.session.is_guiding()) {
            return Vec::new();
        }
        self.guidance
            .on_frame(&frame, self.heading.heading())
            .into_iter()
            .map(NavEvent::Guidance)
            .collect()
    }

    pub fn on_camera_interaction_start(&mut self, now: f64) -> Vec<NavEvent> {
        self.session.camera_interaction_started(now);
        self.drain_session_events()
    }

    pub fn on_camera_interaction_end(&mut self, now: f64) -> Vec<NavEvent> {
        self.session.camera_interaction_ended(now);
        self.drain_session_events()
    }

    pub fn poll_timers(&mut self, now: f64) -> Vec<NavEvent> {
        if !self.session.poll_timer(now) {
            return Vec::new();
        }
        let mut events = self.drain_session_events();
        events.extend(self.follow_directive());
        events
    }

    pub fn snapshot(&self) -> NavSnapshot {
        let remaining_m = self
            .session
            .route()
            .zip(self.projection.as_ref())
            .map(|(route, p)| (route.length_m() - p.distance_along_route).max(0.0));

        NavSnapshot {
            state: self.session.state(),
            heading: self.heading.heading(),
            position: self.session.user_position().map(|c| (c.x, c.y)),
            snap_to_road: self.session.snap_to_road(),
            destination: self.session.destination().map(|d| d.name.clone()),
            turn: self.turn,
            instruction: self.turn.map(|t| t.describe()),
            remaining_m,
            remaining_text: remaining_m.map(format_distance),
            guidance: self.guidance.view(),
        }
    }

    // ---- internals ----

    fn validate_sample(&self, sample: &PositionSample) -> NavResult<()> {
        let coord = Coord {
            x: sample.longitude,
            y: sample.latitude,
        };
        if !sample.timestamp.is_finite() || !crate::geodesy::is_valid_coord(coord) {
            return Err(NavError::InvalidSample("non-finite position".to_string()));
        }
        if !sample.accuracy.is_finite()
            || sample.accuracy < 0.0
            || sample.accuracy > self.config.session.max_position_accuracy_m
        {
            return Err(NavError::InvalidSample(format!(
                "accuracy {:.1} m rejected",
                sample.accuracy
            )));
        }
        if let Some(last) = self.last_fix_time {
            if sample.timestamp < last {
                return Err(NavError::InvalidSample(format!(
                    "stale fix ({:.3} < {:.3})",
                    sample.timestamp, last
                )));
            }
        }
        Ok(())
    }

    /// Translate session events, tearing down guidance and homing the camera
    /// when the session ended.
    fn drain_session_events(&mut self) -> Vec<NavEvent> {
        let session_events = self.session.take_events();
        let mut events = Vec::new();
        let mut ended = false;
        for event in session_events {
            ended |= matches!(event, SessionEvent::Cancelled)
                || (matches!(event, SessionEvent::Arrived { .. })
                    && self.session.state() == SessionState::Idle);
            events.push(NavEvent::Session(event));
        }
        if ended {
            events.extend(self.clear_guidance());
            events.push(NavEvent::Camera(self.home_directive()));
        }
        events
    }

    /// Recompute projection, turn decision and guidance from the current
    /// position and heading.
    fn refresh_guidance(&mut self) -> Vec<NavEvent> {
        let (Some(route), Some(user)) = (self.session.route(), self.session.user_position()) else {
            return Vec::new();
        };
        if !self.session.is_guiding() {
            return Vec::new();
        }

        self.projection = RouteProjector::project(route, user);
        let decision = self
            .projection
            .map(|p| self.turns.detect_next_turn(route, user, &p));
        self.general_bearing = self
            .projection
            .and_then(|p| self.turns.general_direction(route, user, &p));

        let mut events = Vec::new();
        let changed = match (&self.turn, &decision) {
            (Some(old), Some(new)) => {
                old.has_turn != new.has_turn
                    || old.turn_index != new.turn_index
                    || old.direction != new.direction
            }
            (None, Some(_)) => true,
            _ => false,
        };
        self.turn = decision;
        if let (true, Some(decision)) = (changed, decision) {
            log::info!("{}", decision.describe());
            events.push(NavEvent::TurnChanged(decision));
        }

        if self.ar_active {
            events.extend(
                self.guidance
                    .update(self.general_bearing, self.heading.heading(), self.turn.as_ref())
                    .into_iter()
                    .map(NavEvent::Guidance),
            );
        }
        events
    }

    fn clear_guidance(&mut self) -> Vec<NavEvent> {
        let events = self
            .guidance
            .update(None, None, None)
            .into_iter()
            .map(NavEvent::Guidance)
            .collect();
        self.guidance.reset();
        self.projection = None;
        self.turn = None;
        self.general_bearing = None;
        events
    }

    fn follow_directive(&self) -> Option<NavEvent> {
        if self.session.state() != SessionState::Navigating {
            return None;
        }
        let position = self.session.user_position()?;
        Some(NavEvent::Camera(CameraDirective::Follow {
            center: (position.x, position.y),
            bearing: self.heading.heading(),
            zoom: self.config.camera.follow_zoom,
            pitch: self.config.camera.follow_pitch_deg,
        }))
    }

    fn home_directive(&self) -> CameraDirective {
        let camera = &self.config.camera;
        let center = camera.home_coord();
        CameraDirective::Home {
            center: (center.x, center.y),
            zoom: camera.home_zoom,
            pitch: camera.home_pitch_deg,
            bearing: camera.home_bearing_deg,
        }
    }
}
