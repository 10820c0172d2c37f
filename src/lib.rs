//! Navigation-guidance core for a campus wayfinding app.
//!
//! Sensor samples, AR frames and UI commands go into a
//! [`NavigationEngine`]; turn decisions, session transitions, camera
//! directives and AR marker poses come out.

pub mod config;
pub mod engine;
pub mod error;
pub mod geodesy;
pub mod geofence;
pub mod guidance;
pub mod heading;
pub mod route;
pub mod runtime;
pub mod session;
pub mod types;

pub use config::NavConfig;
pub use engine::{CameraDirective, NavEvent, NavSnapshot, NavigationEngine};
pub use error::{NavError, NavResult};
pub use geofence::{CircularGeofence, Geofence};
pub use guidance::GuidanceMarkerController;
pub use heading::HeadingFilter;
pub use route::{Route, RouteProjection, RouteProjector, TurnDecision, TurnDetector, TurnDirection};
pub use runtime::{NavInput, NavOutput, NavigationDriver};
pub use session::{NavigationSession, SessionState};
pub use types::{Destination, FrameInput, HeadingSample, PositionSample, Pose};
