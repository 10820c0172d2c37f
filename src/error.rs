use thiserror::Error;

use crate::session::SessionState;

/// Navigation error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NavError {
    #[error("User position is not known yet")]
    PositionUnknown,

    #[error("User is outside the allowed area ({distance_m:.0} m from centre)")]
    OutsideGeofence { distance_m: f64 },

    #[error("Invalid route: {0}")]
    InvalidRoute(String),

    #[error("Route provider failed: {0}")]
    RouteProvider(String),

    #[error("Cannot {action} while {from:?}")]
    InvalidTransition {
        from: SessionState,
        action: &'static str,
    },

    #[error("Invalid sample: {0}")]
    InvalidSample(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl NavError {
    /// Policy and provider failures are the only errors shown to the user.
    pub fn is_user_visible(&self) -> bool {
        matches!(
            self,
            NavError::PositionUnknown
                | NavError::OutsideGeofence { .. }
                | NavError::RouteProvider(_)
                | NavError::InvalidRoute(_)
        )
    }
}

/// Result type for navigation operations
pub type NavResult<T> = Result<T, NavError>;
