//! Attendance Verification Core
//!
//! Clean Architecture structure:
//! - `domain/` - Entities, geofence math, repository and device ports
//! - `application/` - Position provider, credential client, gates, state machine
//! - `infra/` - REST adapter and static device bindings
//!
//! ## Flow
//! `clock_in`/`clock_out` -> duplicate guard -> verification gate ->
//! remote commit -> local mirror. A denied attempt never reaches the backend.
//!
//! ## Guarantees
//! - Verification settles before any commit is issued
//! - At most one commit per verified attempt
//! - One attempt in flight at a time (`VerificationInProgress` otherwise)
//! - A failed commit forces a re-fetch before the next attempt

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;

// Re-exports for convenience
pub use application::attendance::{AttendanceStateMachine, ClockSnapshot};
pub use application::config::{AttendanceConfig, ConfigError};
pub use application::session::Session;
pub use error::{
    ApiError, ApiResult, BiometricError, ClockError, ClockResult, DenialReason, GeofenceError,
    LocationError, SessionError,
};
pub use infra::rest::RestApi;

// Re-export kernel error types for unified error handling
pub use kernel::error::{
    app_error::AppError,
    kind::ErrorKind,
};

pub mod config {
    pub use crate::application::config::*;
}

pub mod models {
    pub use crate::domain::entities::*;
    pub use crate::domain::value_objects::*;
}

pub mod geo {
    pub use crate::domain::services::*;
}

#[cfg(test)]
mod tests;
