//! Domain Value Objects
//!
//! Immutable value types for the attendance domain.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A latitude/longitude pair in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub latitude: f64,
    pub longitude: f64,
}

impl LatLng {
    /// Create a coordinate, rejecting out-of-range or non-finite values
    pub fn new(latitude: f64, longitude: f64) -> Option<Self> {
        let valid = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);
        valid.then_some(Self {
            latitude,
            longitude,
        })
    }
}

/// A device position fix. Captured per verification attempt, never persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy_meters: f64,
    pub captured_at: DateTime<Utc>,
}

impl Position {
    pub fn coordinates(&self) -> LatLng {
        LatLng {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

impl From<Position> for LatLng {
    fn from(position: Position) -> Self {
        position.coordinates()
    }
}

impl From<&Position> for LatLng {
    fn from(position: &Position) -> Self {
        position.coordinates()
    }
}

/// Per-day attendance state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClockState {
    #[default]
    NotClockedIn,
    ClockedIn,
    /// Day-terminal
    ClockedOut,
}

impl fmt::Display for ClockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ClockState::NotClockedIn => "Not Clocked In",
            ClockState::ClockedIn => "Currently Working",
            ClockState::ClockedOut => "Clocked Out",
        };
        f.write_str(label)
    }
}

/// Which transition a clock action requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClockDirection {
    In,
    Out,
}

impl fmt::Display for ClockDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClockDirection::In => f.write_str("clock-in"),
            ClockDirection::Out => f.write_str("clock-out"),
        }
    }
}

/// How a clock action was verified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationMethod {
    #[default]
    Geofence,
    Biometric,
    /// Plain trusted-client clock; location is informational only
    None,
}

impl VerificationMethod {
    pub const fn code(&self) -> &'static str {
        match self {
            VerificationMethod::Geofence => "geofence",
            VerificationMethod::Biometric => "biometric",
            VerificationMethod::None => "none",
        }
    }
}

impl fmt::Display for VerificationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for VerificationMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "geofence" | "location" => Ok(VerificationMethod::Geofence),
            "biometric" => Ok(VerificationMethod::Biometric),
            "none" | "basic" => Ok(VerificationMethod::None),
            other => Err(format!("unknown verification method: {}", other)),
        }
    }
}

/// Purpose a challenge was issued for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengePurpose {
    Register,
    Authenticate,
}

impl fmt::Display for ChallengePurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChallengePurpose::Register => f.write_str("register"),
            ChallengePurpose::Authenticate => f.write_str("authenticate"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latlng_range() {
        assert!(LatLng::new(0.0, 0.0).is_some());
        assert!(LatLng::new(90.0, 180.0).is_some());
        assert!(LatLng::new(-90.0, -180.0).is_some());
        assert!(LatLng::new(90.1, 0.0).is_none());
        assert!(LatLng::new(0.0, -180.5).is_none());
        assert!(LatLng::new(f64::NAN, 0.0).is_none());
    }

    #[test]
    fn test_verification_method_parse() {
        assert_eq!(
            "Geofence".parse::<VerificationMethod>(),
            Ok(VerificationMethod::Geofence)
        );
        assert_eq!(
            " biometric ".parse::<VerificationMethod>(),
            Ok(VerificationMethod::Biometric)
        );
        assert_eq!(
            "none".parse::<VerificationMethod>(),
            Ok(VerificationMethod::None)
        );
        assert!("face".parse::<VerificationMethod>().is_err());
    }

    #[test]
    fn test_clock_state_display() {
        assert_eq!(ClockState::ClockedIn.to_string(), "Currently Working");
        assert_eq!(ClockState::default(), ClockState::NotClockedIn);
    }
}
