//! Single-task tokio driver around [`NavigationEngine`].
//!
//! Sensor feeds, the AR frame callback and UI commands all post
//! [`NavInput`] messages to one channel; the driver applies them in arrival
//! order and publishes a [`NavOutput`] per input. The resume dwell timer is
//! a `sleep_until` branch that only exists while the session holds a
//! deadline, so cancelling the session cancels the timer.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Duration, Instant};

use crate::engine::{NavEvent, NavSnapshot, NavigationEngine};
use crate::error::NavError;
use crate::types::{Destination, FrameInput, HeadingSample, PositionErrorKind, PositionSample};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "input", rename_all = "snake_case")]
pub enum NavInput {
    Position { sample: PositionSample },
    PositionError { kind: PositionErrorKind },
    Heading { sample: HeadingSample },
    Frame { frame: FrameInput },
    CameraInteractionStart,
    CameraInteractionEnd,
    RequestRoute { destination: Destination },
    StartNavigating,
    Cancel,
    ToggleSnapToRoad,
    StartAr,
    EndAr,
    Shutdown,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NavOutput {
    /// Seconds since the driver started.
    pub time: f64,
    pub events: Vec<NavEvent>,
    pub snapshot: NavSnapshot,
}

pub struct NavigationDriver {
    engine: NavigationEngine,
    inputs: mpsc::Receiver<NavInput>,
    outputs: mpsc::Sender<NavOutput>,
    start: Instant,
    /// Destination requested before the first fix; retried once on it.
    pending_destination: Option<Destination>,
}

/// Channels and task of a spawned driver.
pub struct DriverHandle {
    pub inputs: mpsc::Sender<NavInput>,
    pub outputs: mpsc::Receiver<NavOutput>,
    pub task: JoinHandle<NavigationEngine>,
}

impl NavigationDriver {
    pub fn new(
        engine: NavigationEngine,
        inputs: mpsc::Receiver<NavInput>,
        outputs: mpsc::Sender<NavOutput>,
    ) -> Self {
        NavigationDriver {
            engine,
            inputs,
            outputs,
            start: Instant::now(),
            pending_destination: None,
        }
    }

    /// Spawn a driver on the current runtime.
    pub fn spawn(engine: NavigationEngine, capacity: usize) -> DriverHandle {
        let (input_tx, input_rx) = mpsc::channel(capacity);
        let (output_tx, output_rx) = mpsc::channel(capacity);
        let driver = NavigationDriver::new(engine, input_rx, output_tx);
        DriverHandle {
            inputs: input_tx,
            outputs: output_rx,
            task: tokio::spawn(driver.run()),
        }
    }

    fn now(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    /// Process inputs until `Shutdown`, input channel close, or the output
    /// receiver going away. Returns the engine for inspection.
    pub async fn run(mut self) -> NavigationEngine {
        log::info!("Navigation driver started");
        loop {
            let deadline = self.engine.next_deadline();
            // A deadline past what `Instant` can hold never fires.
            let wake_at = deadline
                .and_then(|secs| Duration::try_from_secs_f64(secs.max(0.0)).ok())
                .and_then(|offset| self.start.checked_add(offset));

            let events = tokio::select! {
                input = self.inputs.recv() => match input {
                    None | Some(NavInput::Shutdown) => break,
                    Some(input) => self.handle(input),
                },
                _ = sleep_until(wake_at.unwrap_or(self.start)), if wake_at.is_some() => {
                    // The deadline has passed by construction; avoid re-polling
                    // on sub-nanosecond rounding.
                    let now = self.now().max(deadline.unwrap_or(0.0));
                    self.engine.poll_timers(now)
                }
            };

            let output = NavOutput {
                time: self.now(),
                events,
                snapshot: self.engine.snapshot(),
            };
            if self.outputs.send(output).await.is_err() {
                log::warn!("Output receiver dropped, stopping driver");
                break;
            }
        }
        log::info!("Navigation driver stopped");
        self.engine
    }

    fn handle(&mut self, input: NavInput) -> Vec<NavEvent> {
        let now = self.now();
        match input {
            NavInput::Position { sample } => {
                let mut events = self.engine.on_position(sample, now);
                if self.engine.session().user_position().is_some() {
                    if let Some(destination) = self.pending_destination.take() {
                        log::info!("First fix received, routing to {}", destination.name);
                        events.extend(self.request_route(destination));
                    }
                }
                events
            }
            NavInput::PositionError { kind } => {
                if let Some(destination) = self.pending_destination.take() {
                    log::warn!("Dropping pending route to {}", destination.name);
                }
                self.engine.on_position_error(kind)
            }
            NavInput::Heading { sample } => self.engine.on_heading(sample),
            NavInput::Frame { frame } => self.engine.on_frame(frame),
            NavInput::CameraInteractionStart => self.engine.on_camera_interaction_start(now),
            NavInput::CameraInteractionEnd => self.engine.on_camera_interaction_end(now),
            NavInput::RequestRoute { destination } => {
                if self.engine.session().user_position().is_none() {
                    log::info!("No position yet, deferring route to {}", destination.name);
                    self.pending_destination = Some(destination);
                    Vec::new()
                } else {
                    self.request_route(destination)
                }
            }
            NavInput::StartNavigating => self.engine.start_navigating().unwrap_or_else(|e| {
                log::warn!("{}", e);
                Vec::new()
            }),
            NavInput::Cancel => {
                self.pending_destination = None;
                self.engine.cancel()
            }
            NavInput::ToggleSnapToRoad => {
                self.engine.toggle_snap_to_road();
                Vec::new()
            }
            NavInput::StartAr => self.engine.start_ar(),
            NavInput::EndAr => self.engine.end_ar(),
            NavInput::Shutdown => Vec::new(),
        }
    }

    fn request_route(&mut self, destination: Destination) -> Vec<NavEvent> {
        match self.engine.request_route(destination) {
            Ok(events) => events,
            Err(e) => route_failed(e),
        }
    }
}

fn route_failed(error: NavError) -> Vec<NavEvent> {
    log::warn!("Route request failed: {}", error);
    vec![NavEvent::RouteFailed {
        message: error.to_string(),
    }]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NavConfig;
    use crate::route::{FixedRouteProvider, RouteResponse};
    use crate::session::{SessionEvent, SessionState};
    use geo::Coord;

    fn engine() -> NavigationEngine {
        let provider = FixedRouteProvider::new(RouteResponse {
            coordinates: vec![
                Coord { x: 0.0, y: 0.0 },
                Coord { x: 0.0, y: 0.001 },
                Coord { x: 0.002, y: 0.001 },
            ],
            distance_m: Some(335.0),
            duration_s: Some(240.0),
        });
        NavigationEngine::new(NavConfig::default(), Box::new(provider))
    }

    fn position(t: f64) -> NavInput {
        NavInput::Position {
            sample: PositionSample::new(t, 0.0, 0.0002, 5.0),
        }
    }

    fn library() -> NavInput {
        NavInput::RequestRoute {
            destination: Destination::new("Library", 0.002, 0.001),
        }
    }

    /// Send inputs and wait for one output per input.
    async fn feed(handle: &mut DriverHandle, inputs: Vec<NavInput>) -> Vec<NavOutput> {
        let mut outputs = Vec::new();
        for input in inputs {
            handle.inputs.send(input).await.unwrap();
            outputs.push(handle.outputs.recv().await.unwrap());
        }
        outputs
    }

    fn has_event(outputs: &[NavOutput], wanted: &NavEvent) -> bool {
        outputs.iter().flat_map(|o| o.events.iter()).any(|e| e == wanted)
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_after_dwell() {
        let mut handle = NavigationDriver::spawn(engine(), 16);
        let outputs = feed(
            &mut handle,
            vec![
                position(0.0),
                library(),
                NavInput::StartNavigating,
                NavInput::CameraInteractionStart,
                NavInput::CameraInteractionEnd,
            ],
        )
        .await;
        assert!(has_event(&outputs, &NavEvent::Session(SessionEvent::Interrupted)));
        let settled_at = outputs[4].time;

        // Nothing else is sent: the next output comes from the timer.
        let resumed = handle.outputs.recv().await.unwrap();
        assert!(resumed
            .events
            .contains(&NavEvent::Session(SessionEvent::Resumed)));
        assert_eq!(resumed.snapshot.state, SessionState::Navigating);
        assert!((resumed.time - settled_at - 4.0).abs() < 0.01, "resumed at {}", resumed.time);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_interaction_restarts_dwell() {
        let mut handle = NavigationDriver::spawn(engine(), 16);
        feed(
            &mut handle,
            vec![
                position(0.0),
                library(),
                NavInput::StartNavigating,
                NavInput::CameraInteractionStart,
                NavInput::CameraInteractionEnd,
            ],
        )
        .await;
        tokio::time::sleep(Duration::from_secs(3)).await;
        let outputs = feed(
            &mut handle,
            vec![NavInput::CameraInteractionStart, NavInput::CameraInteractionEnd],
        )
        .await;
        let restarted_at = outputs[1].time;

        let resumed = handle.outputs.recv().await.unwrap();
        assert!((resumed.time - restarted_at - 4.0).abs() < 0.01);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_disarms_timer() {
        let mut handle = NavigationDriver::spawn(engine(), 16);
        feed(
            &mut handle,
            vec![
                position(0.0),
                library(),
                NavInput::StartNavigating,
                NavInput::CameraInteractionStart,
                NavInput::CameraInteractionEnd,
                NavInput::Cancel,
            ],
        )
        .await;
        let next = tokio::time::timeout(Duration::from_secs(30), handle.outputs.recv()).await;
        assert!(next.is_err(), "timer fired after cancel");
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_resume_delay_never_fires() {
        let mut config = NavConfig::default();
        config.session.resume_delay_secs = f64::INFINITY;
        let provider = FixedRouteProvider::new(RouteResponse {
            coordinates: vec![Coord { x: 0.0, y: 0.0 }, Coord { x: 0.0, y: 0.001 }],
            distance_m: None,
            duration_s: None,
        });
        let mut handle = NavigationDriver::spawn(NavigationEngine::new(config, Box::new(provider)), 16);
        let outputs = feed(
            &mut handle,
            vec![
                position(0.0),
                library(),
                NavInput::StartNavigating,
                NavInput::CameraInteractionStart,
                NavInput::CameraInteractionEnd,
            ],
        )
        .await;
        assert_eq!(outputs[4].snapshot.state, SessionState::Interrupted);

        let next = tokio::time::timeout(Duration::from_secs(30), handle.outputs.recv()).await;
        assert!(next.is_err(), "timer fired on an unbounded delay");
        handle.inputs.send(NavInput::Shutdown).await.unwrap();
        let engine = handle.task.await.unwrap();
        assert_eq!(engine.state(), SessionState::Interrupted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_destination_routes_on_first_fix() {
        let mut handle = NavigationDriver::spawn(engine(), 16);
        let outputs = feed(&mut handle, vec![library(), position(0.0)]).await;
        assert!(outputs[0].events.is_empty());
        assert_eq!(outputs[0].snapshot.state, SessionState::Idle);
        assert_eq!(outputs[1].snapshot.state, SessionState::PreviewingRoute);
        assert_eq!(outputs[1].snapshot.destination.as_deref(), Some("Library"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_position_error_drops_pending_destination() {
        let mut handle = NavigationDriver::spawn(engine(), 16);
        let outputs = feed(
            &mut handle,
            vec![
                library(),
                NavInput::PositionError {
                    kind: PositionErrorKind::Timeout,
                },
                position(0.0),
            ],
        )
        .await;
        assert!(has_event(
            &outputs,
            &NavEvent::PositionUnavailable(PositionErrorKind::Timeout)
        ));
        assert_eq!(outputs[2].snapshot.state, SessionState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_provider_failure_is_reported() {
        let engine = NavigationEngine::new(NavConfig::default(), Box::new(FixedRouteProvider::empty()));
        let mut handle = NavigationDriver::spawn(engine, 16);
        let outputs = feed(&mut handle, vec![position(0.0), library()]).await;
        assert!(matches!(
            &outputs[1].events[..],
            [NavEvent::RouteFailed { message }] if message.contains("no route found")
        ));
        assert_eq!(outputs[1].snapshot.state, SessionState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_returns_engine() {
        let mut handle = NavigationDriver::spawn(engine(), 16);
        feed(&mut handle, vec![position(0.0), library()]).await;
        handle.inputs.send(NavInput::Shutdown).await.unwrap();
        let engine = handle.task.await.unwrap();
        assert_eq!(engine.state(), SessionState::PreviewingRoute);
    }
}
