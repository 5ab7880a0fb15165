//! Attendance Error Types
//!
//! This module provides attendance-specific error variants that integrate
//! with the unified `kernel::error::AppError` system. Every variant is
//! recoverable at the call site.

use chrono::{DateTime, Utc};
use kernel::error::{app_error::AppError, kind::ErrorKind};
use kernel::id::LocationId;
use thiserror::Error;

/// Remote call result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Attendance state machine result type alias
pub type ClockResult<T> = Result<T, ClockError>;

// ============================================================================
// Remote API
// ============================================================================

/// Failure talking to the attendance backend
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// Request never produced a response (connect, timeout, TLS)
    #[error("Network error: {0}")]
    Transport(String),

    /// Backend answered with a non-success status
    #[error("Backend rejected the request ({status}): {message}")]
    Status { status: u16, message: String },

    /// Response body could not be read
    #[error("Unexpected response: {0}")]
    Decode(String),

    /// Session was disposed before the request was sent
    #[error("Session is closed")]
    SessionClosed,
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Transport(_) | ApiError::Decode(_) => ErrorKind::Network,
            ApiError::Status { status, .. } => ErrorKind::from_status(*status),
            ApiError::SessionClosed => ErrorKind::Session,
        }
    }

    /// Message the backend sent along with a rejection, if any
    pub fn backend_message(&self) -> Option<&str> {
        match self {
            ApiError::Status { message, .. } if !message.is_empty() => Some(message),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return ApiError::Status {
                status: status.as_u16(),
                message: String::new(),
            };
        }
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Transport(err.to_string())
        }
    }
}

impl From<ApiError> for AppError {
    fn from(err: ApiError) -> Self {
        let message = match err.backend_message() {
            Some(message) => message.to_string(),
            None => err.to_string(),
        };
        AppError::new(err.kind(), message).with_source(err)
    }
}

// ============================================================================
// Location
// ============================================================================

/// Failure acquiring a device position fix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LocationError {
    /// The device has no location capability, or it produced no usable fix
    #[error("Location is unavailable on this device")]
    Unavailable,

    /// No fix arrived before the deadline
    #[error("Timed out waiting for a location fix")]
    Timeout,

    /// The user or platform refused location access
    #[error("Location permission was denied")]
    PermissionDenied,
}

// ============================================================================
// Biometric
// ============================================================================

/// Failure in the credential challenge-response ceremony
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BiometricError {
    /// Platform lacks a credential authenticator
    #[error("Biometric authentication is not supported on this device")]
    Unsupported,

    /// User dismissed the platform dialog, or it timed out
    #[error("Biometric prompt was cancelled")]
    Cancelled,

    /// Server did not accept the assertion
    #[error("Biometric verification failed")]
    VerificationFailed,

    /// Server issued a challenge the client cannot use
    #[error("Malformed challenge: {0}")]
    MalformedChallenge(String),

    /// Server issued a challenge already used in an earlier ceremony
    #[error("Challenge was already used")]
    ChallengeReused,

    /// Platform authenticator failed for a reason other than cancellation
    #[error("Authenticator error: {0}")]
    Platform(String),

    /// Registration or device management call failed
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl BiometricError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BiometricError::Api(e) => e.kind(),
            _ => ErrorKind::Biometric,
        }
    }
}

impl From<BiometricError> for AppError {
    fn from(err: BiometricError) -> Self {
        let app_err = AppError::new(err.kind(), err.to_string());
        let app_err = match err {
            BiometricError::Cancelled => app_err.with_action("Try again and confirm the prompt"),
            BiometricError::Unsupported => {
                app_err.with_action("Use a device with a fingerprint or face sensor")
            }
            _ => app_err,
        };
        app_err.with_source(err)
    }
}

// ============================================================================
// Verification gate
// ============================================================================

/// Why a verification gate refused a clock action
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DenialReason {
    #[error("Location is unavailable on this device")]
    LocationUnavailable,

    #[error("Timed out waiting for a location fix")]
    LocationTimeout,

    #[error("Location permission was denied")]
    LocationPermissionDenied,

    #[error("You are {distance_meters:.0} m from the work location")]
    OutsideGeofence { distance_meters: f64 },

    #[error("No work location selected")]
    NoLocationSelected,

    #[error("Selected work location {0} is no longer available")]
    UnknownLocation(LocationId),

    #[error("Biometric authentication is not supported on this device")]
    BiometricUnsupported,

    #[error("Biometric prompt was cancelled")]
    BiometricCancelled,

    #[error("Biometric verification failed")]
    BiometricVerificationFailed,

    /// Data the gate needed could not be fetched
    #[error(transparent)]
    Network(ApiError),
}

impl DenialReason {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DenialReason::LocationUnavailable
            | DenialReason::LocationTimeout
            | DenialReason::LocationPermissionDenied => ErrorKind::Location,
            DenialReason::OutsideGeofence { .. }
            | DenialReason::NoLocationSelected
            | DenialReason::UnknownLocation(_) => ErrorKind::Geofence,
            DenialReason::BiometricUnsupported
            | DenialReason::BiometricCancelled
            | DenialReason::BiometricVerificationFailed => ErrorKind::Biometric,
            DenialReason::Network(e) => e.kind(),
        }
    }

    fn action(&self) -> Option<&'static str> {
        match self {
            DenialReason::LocationPermissionDenied => Some("Allow location access and try again"),
            DenialReason::LocationTimeout => Some("Move to an open area and try again"),
            DenialReason::OutsideGeofence { .. } => {
                Some("Move closer to the selected location and try again")
            }
            DenialReason::NoLocationSelected | DenialReason::UnknownLocation(_) => {
                Some("Choose a work location first")
            }
            DenialReason::BiometricCancelled => Some("Try again and confirm the prompt"),
            DenialReason::Network(ApiError::SessionClosed) => Some("Sign in again"),
            DenialReason::Network(_) => Some("Check your connection and try again"),
            _ => None,
        }
    }
}

impl From<LocationError> for DenialReason {
    fn from(err: LocationError) -> Self {
        match err {
            LocationError::Unavailable => DenialReason::LocationUnavailable,
            LocationError::Timeout => DenialReason::LocationTimeout,
            LocationError::PermissionDenied => DenialReason::LocationPermissionDenied,
        }
    }
}

impl From<BiometricError> for DenialReason {
    /// Anything other than "unsupported" or "cancelled" means not authenticated
    fn from(err: BiometricError) -> Self {
        match err {
            BiometricError::Unsupported => DenialReason::BiometricUnsupported,
            BiometricError::Cancelled => DenialReason::BiometricCancelled,
            _ => DenialReason::BiometricVerificationFailed,
        }
    }
}

// ============================================================================
// Attendance state machine
// ============================================================================

/// Clock-in/clock-out failure
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClockError {
    /// Verification gate denied the action; state unchanged
    #[error(transparent)]
    Denied(#[from] DenialReason),

    #[error("Already clocked in today")]
    DuplicateClockIn,

    #[error("Not clocked in")]
    DuplicateClockOut,

    /// Another clock attempt has not settled yet
    #[error("A clock action is already in progress")]
    VerificationInProgress,

    /// Clock-out would not be strictly after clock-in
    #[error("Clock-out at {clock_out_at} is not after clock-in at {clock_in_at}")]
    ClockOrderViolation {
        clock_in_at: DateTime<Utc>,
        clock_out_at: DateTime<Utc>,
    },

    #[error("Start date {start} is after end date {end}")]
    InvalidRange {
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    },

    /// Commit or fetch failed; local state is marked stale
    #[error(transparent)]
    Network(ApiError),

    #[error("Session is closed")]
    SessionClosed,
}

impl From<ApiError> for ClockError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::SessionClosed => ClockError::SessionClosed,
            other => ClockError::Network(other),
        }
    }
}

impl ClockError {
    /// Get the ErrorKind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClockError::Denied(reason) => reason.kind(),
            ClockError::DuplicateClockIn
            | ClockError::DuplicateClockOut
            | ClockError::ClockOrderViolation { .. } => ErrorKind::Conflict,
            ClockError::VerificationInProgress => ErrorKind::Busy,
            ClockError::InvalidRange { .. } => ErrorKind::Validation,
            ClockError::Network(e) => e.kind(),
            ClockError::SessionClosed => ErrorKind::Session,
        }
    }

    /// Convert to AppError
    pub fn to_app_error(&self) -> AppError {
        let message = match self {
            ClockError::Network(e) => e.backend_message().map(str::to_string),
            _ => None,
        }
        .unwrap_or_else(|| self.to_string());

        let app_err = AppError::new(self.kind(), message);
        let action = match self {
            ClockError::Denied(reason) => reason.action(),
            ClockError::VerificationInProgress => Some("Wait for the current action to finish"),
            ClockError::Network(_) => Some("Check your connection and try again"),
            ClockError::SessionClosed => Some("Sign in again"),
            _ => None,
        };
        match action {
            Some(action) => app_err.with_action(action),
            None => app_err,
        }
    }

    /// Log the error with appropriate level
    pub fn log(&self) {
        match self {
            ClockError::Network(e) => {
                tracing::error!(error = %e, "Attendance backend error");
            }
            ClockError::ClockOrderViolation {
                clock_in_at,
                clock_out_at,
            } => {
                tracing::error!(%clock_in_at, %clock_out_at, "Clock order violation");
            }
            ClockError::Denied(reason) => {
                tracing::warn!(reason = %reason, "Clock action denied");
            }
            _ => {
                tracing::debug!(error = %self, "Clock action rejected");
            }
        }
    }
}

impl From<ClockError> for AppError {
    fn from(err: ClockError) -> Self {
        err.to_app_error().with_source(err)
    }
}

impl From<DenialReason> for AppError {
    fn from(reason: DenialReason) -> Self {
        ClockError::Denied(reason).into()
    }
}

// ============================================================================
// Geofence catalogue
// ============================================================================

/// Geofence catalogue error
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeofenceError {
    #[error("Unknown work location: {0}")]
    UnknownLocation(LocationId),

    #[error("Invalid location: {0}")]
    InvalidLocation(String),

    #[error("Managing work locations requires a manager role")]
    Forbidden,

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl GeofenceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GeofenceError::UnknownLocation(_) | GeofenceError::InvalidLocation(_) => {
                ErrorKind::Validation
            }
            GeofenceError::Forbidden => ErrorKind::Session,
            GeofenceError::Api(e) => e.kind(),
        }
    }
}

impl From<GeofenceError> for AppError {
    fn from(err: GeofenceError) -> Self {
        AppError::new(err.kind(), err.to_string()).with_source(err)
    }
}

// ============================================================================
// Session
// ============================================================================

/// Sign-in failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Email and password are required")]
    MissingCredentials,

    #[error("Sign in failed: {0}")]
    Rejected(String),

    #[error("Sign in response did not contain a usable token")]
    MissingToken,

    #[error(transparent)]
    Api(ApiError),
}

impl From<ApiError> for SessionError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Status { status, message } if status == 400 || status == 401 => {
                let message = if message.is_empty() {
                    "Please check your credentials.".to_string()
                } else {
                    message
                };
                SessionError::Rejected(message)
            }
            other => SessionError::Api(other),
        }
    }
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::MissingCredentials => ErrorKind::Validation,
            SessionError::Rejected(_) | SessionError::MissingToken => ErrorKind::Session,
            SessionError::Api(e) => e.kind(),
        }
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        AppError::new(err.kind(), err.to_string()).with_source(err)
    }
}
