use geo::Coord;
use serde::{Deserialize, Serialize};

use crate::config::SessionConfig;
use crate::error::{NavError, NavResult};
use crate::geodesy;
use crate::geofence::Geofence;
use crate::route::{Route, RouteProjector, RouteProvider, RouteSummary};
use crate::types::Destination;

/// Navigation session state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// Browsing the map, no route
    Idle,
    /// Route fetched and shown, waiting for the user to start
    PreviewingRoute,
    /// Actively guiding: camera follows the user, heading-up
    Navigating,
    /// User took manual control of the camera; resumes after a dwell
    Interrupted,
}

/// Transition notifications for the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    RoutePreviewed {
        destination: Destination,
        summary: RouteSummary,
    },
    NavigationStarted,
    Interrupted,
    Resumed,
    Arrived {
        destination: Destination,
    },
    Cancelled,
}

/// Fires once when the user comes within `arrival_radius_m` of the
/// destination, and re-arms only after they retreat beyond
/// `rearm_radius_m`.
#[derive(Clone, Debug)]
pub struct ArrivalDetector {
    arrival_radius_m: f64,
    rearm_radius_m: f64,
    armed: bool,
}

impl ArrivalDetector {
    pub fn new(arrival_radius_m: f64, rearm_radius_m: f64) -> Self {
        ArrivalDetector {
            arrival_radius_m,
            rearm_radius_m: rearm_radius_m.max(arrival_radius_m),
            armed: true,
        }
    }

    /// Returns true exactly once per approach.
    pub fn update(&mut self, distance_to_destination: f64) -> bool {
        if self.armed {
            if distance_to_destination < self.arrival_radius_m {
                self.armed = false;
                return true;
            }
        } else if distance_to_destination > self.rearm_radius_m {
            self.armed = true;
        }
        false
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn reset(&mut self) {
        self.armed = true;
    }
}

/// Owns the route and the session lifecycle.
///
/// All transitions go through the methods below; events produced by them
/// accumulate until [`take_events`](Self::take_events). Time is passed in
/// as monotonic seconds so the resume timer is a plain deadline.
pub struct NavigationSession {
    config: SessionConfig,
    state: SessionState,
    route: Option<Route>,
    destination: Option<Destination>,
    user_position: Option<Coord<f64>>,
    snap_to_road: bool,
    resume_deadline: Option<f64>,
    arrival: ArrivalDetector,
    events: Vec<SessionEvent>,
}

impl NavigationSession {
    pub fn new(config: SessionConfig) -> Self {
        let arrival = ArrivalDetector::new(config.arrival_radius_m, config.arrival_rearm_radius_m);
        NavigationSession {
            config,
            state: SessionState::Idle,
            route: None,
            destination: None,
            user_position: None,
            snap_to_road: false,
            resume_deadline: None,
            arrival,
            events: Vec::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn route(&self) -> Option<&Route> {
        self.route.as_ref()
    }

    pub fn destination(&self) -> Option<&Destination> {
        self.destination.as_ref()
    }

    pub fn user_position(&self) -> Option<Coord<f64>> {
        self.user_position
    }

    pub fn snap_to_road(&self) -> bool {
        self.snap_to_road
    }

    /// True while the user is being guided, including a paused camera.
    pub fn is_guiding(&self) -> bool {
        matches!(self.state, SessionState::Navigating | SessionState::Interrupted)
    }

    /// When the pending resume timer fires, if one is armed.
    pub fn resume_deadline(&self) -> Option<f64> {
        self.resume_deadline
    }

    pub fn take_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    /// Fetch a route to `destination` and show it for preview.
    ///
    /// Any existing route is discarded first. Policy and provider failures
    /// leave the session `Idle`.
    pub fn request_route(
        &mut self,
        destination: Destination,
        geofence: &dyn Geofence,
        provider: &mut dyn RouteProvider,
    ) -> NavResult<RouteSummary> {
        let origin = self.user_position.ok_or(NavError::PositionUnknown)?;
        if !geofence.contains(origin) {
            let distance_m = geofence.distance_to_center(origin).unwrap_or(f64::NAN);
            log::info!("Route request rejected: outside geofence");
            return Err(NavError::OutsideGeofence { distance_m });
        }

        if self.state != SessionState::Idle {
            log::info!("Replacing active route ({:?})", self.state);
            self.teardown();
        }

        let route = match provider
            .fetch_route(origin, destination.coord())
            .and_then(Route::from_response)
        {
            Ok(route) => route,
            Err(e) => {
                log::warn!("Route to {} failed: {}", destination.name, e);
                self.teardown();
                return Err(e);
            }
        };

        let summary = route.summary().clone();
        log::info!(
            "Route to {}: {} points, {:.0} m",
            destination.name,
            route.len(),
            summary.distance_m
        );
        self.route = Some(route);
        self.destination = Some(destination.clone());
        self.state = SessionState::PreviewingRoute;
        self.events.push(SessionEvent::RoutePreviewed {
            destination,
            summary: summary.clone(),
        });
        Ok(summary)
    }

    /// PreviewingRoute → Navigating
    pub fn start_navigating(&mut self) -> NavResult<()> {
        match self.state {
            SessionState::PreviewingRoute => {
                self.state = SessionState::Navigating;
                self.arrival.reset();
                log::info!("Navigation started");
                self.events.push(SessionEvent::NavigationStarted);
                Ok(())
            }
            from => Err(NavError::InvalidTransition {
                from,
                action: "start navigating",
            }),
        }
    }

    /// Any state → Idle, dropping the route.
    pub fn cancel(&mut self) {
        if self.state == SessionState::Idle && self.route.is_none() {
            return;
        }
        self.teardown();
        log::info!("Navigation cancelled");
        self.events.push(SessionEvent::Cancelled);
    }

    pub fn set_snap_to_road(&mut self, enabled: bool) {
        self.snap_to_road = enabled;
        log::info!("Snap to road: {}", if enabled { "on" } else { "off" });
    }

    pub fn toggle_snap_to_road(&mut self) -> bool {
        self.set_snap_to_road(!self.snap_to_road);
        self.snap_to_road
    }

    /// The user grabbed the map (drag/zoom start).
    pub fn camera_interaction_started(&mut self, _now: f64) {
        match self.state {
            SessionState::Navigating => {
                self.state = SessionState::Interrupted;
                self.resume_deadline = None;
                log::info!("Navigation interrupted by camera interaction");
                self.events.push(SessionEvent::Interrupted);
            }
            SessionState::Interrupted => {
                self.resume_deadline = None;
            }
            _ => {}
        }
    }

    /// The camera settled; start (or restart) the resume dwell.
    pub fn camera_interaction_ended(&mut self, now: f64) {
        if self.state == SessionState::Interrupted {
            self.resume_deadline = Some(now + self.config.resume_delay_secs);
            log::debug!("Resume timer armed for {:.1}s", self.config.resume_delay_secs);
        }
    }

    /// Fire the resume timer if it is due. Returns true on resume.
    pub fn poll_timer(&mut self, now: f64) -> bool {
        match (self.state, self.resume_deadline) {
            (SessionState::Interrupted, Some(deadline)) if now >= deadline => {
                self.resume_deadline = None;
                self.state = SessionState::Navigating;
                log::info!("Navigation resumed");
                self.events.push(SessionEvent::Resumed);
                true
            }
            _ => false,
        }
    }

    /// Apply snap-to-road when it is enabled and the user is being guided.
    pub fn correct_position(&self, raw: Coord<f64>) -> Coord<f64> {
        if !(self.snap_to_road && self.is_guiding()) {
            return raw;
        }
        self.route
            .as_ref()
            .and_then(|route| RouteProjector::project(route, raw))
            .map(|p| p.snapped)
            .unwrap_or(raw)
    }

    /// Record the (already corrected) user position and check for arrival.
    pub fn update_position(&mut self, position: Coord<f64>) {
        self.user_position = Some(position);

        if self.state != SessionState::Navigating {
            return;
        }
        let Some(route) = self.route.as_ref() else {
            return;
        };
        let remaining = geodesy::distance_m(position, route.destination());
        if self.arrival.update(remaining) {
            let destination = self
                .destination
                .clone()
                .unwrap_or_else(|| Destination::new("destination", route.destination().x, route.destination().y));
            log::info!("Arrived at {} ({:.1} m)", destination.name, remaining);
            self.events.push(SessionEvent::Arrived { destination });
            if self.config.stop_on_arrival {
                self.teardown();
            }
        }
    }

    fn teardown(&mut self) {
        self.state = SessionState::Idle;
        self.route = None;
        self.destination = None;
        self.snap_to_road = false;
        self.resume_deadline = None;
        self.arrival.reset();
    }
}
