//! Domain Entities
//!
//! Core business entities for the attendance domain.

use chrono::{DateTime, NaiveDate, Utc};
use kernel::id::{CredentialId, LocationId};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::value_objects::{ChallengePurpose, ClockState, LatLng, VerificationMethod};

/// Geofence location - a named circular work area, sourced from the backend
#[derive(Debug, Clone, PartialEq)]
pub struct GeofenceLocation {
    pub id: LocationId,
    pub name: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Always > 0
    pub radius_meters: f64,
}

impl GeofenceLocation {
    /// Create a location, rejecting a non-positive radius or invalid centre
    pub fn new(
        id: LocationId,
        name: impl Into<String>,
        address: impl Into<String>,
        center: LatLng,
        radius_meters: f64,
    ) -> Option<Self> {
        if !(radius_meters.is_finite() && radius_meters > 0.0) {
            return None;
        }
        LatLng::new(center.latitude, center.longitude)?;
        Some(Self {
            id,
            name: name.into(),
            address: address.into(),
            latitude: center.latitude,
            longitude: center.longitude,
            radius_meters,
        })
    }

    pub fn center(&self) -> LatLng {
        LatLng {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

/// Why a record update was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("record is already clocked in")]
    AlreadyClockedIn,

    #[error("record is not clocked in")]
    NotClockedIn,

    #[error("clock-out {clock_out_at} is not after clock-in {clock_in_at}")]
    OutOfOrder {
        clock_in_at: DateTime<Utc>,
        clock_out_at: DateTime<Utc>,
    },
}

/// Attendance record - the per-day clock-in/clock-out pair
///
/// Invariants:
/// - `clock_out_at` is set only if `clock_in_at` is set
/// - `clock_out_at > clock_in_at` strictly
#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceRecord {
    pub day_key: NaiveDate,
    pub clock_in_at: Option<DateTime<Utc>>,
    pub clock_out_at: Option<DateTime<Utc>>,
    pub verification_method: Option<VerificationMethod>,
}

impl AttendanceRecord {
    /// A day with no clock activity yet
    pub fn empty(day_key: NaiveDate) -> Self {
        Self {
            day_key,
            clock_in_at: None,
            clock_out_at: None,
            verification_method: None,
        }
    }

    pub fn state(&self) -> ClockState {
        match (self.clock_in_at, self.clock_out_at) {
            (None, _) => ClockState::NotClockedIn,
            (Some(_), None) => ClockState::ClockedIn,
            (Some(_), Some(_)) => ClockState::ClockedOut,
        }
    }

    /// Clocked in and not yet clocked out
    pub fn is_open(&self) -> bool {
        self.state() == ClockState::ClockedIn
    }

    /// Check both invariants (used on records mirrored from the backend)
    pub fn check_invariants(&self) -> Result<(), RecordError> {
        match (self.clock_in_at, self.clock_out_at) {
            (None, Some(_)) => Err(RecordError::NotClockedIn),
            (Some(clock_in_at), Some(clock_out_at)) if clock_out_at <= clock_in_at => {
                Err(RecordError::OutOfOrder {
                    clock_in_at,
                    clock_out_at,
                })
            }
            _ => Ok(()),
        }
    }

    /// Apply a clock-in at `at`
    pub fn record_clock_in(
        &mut self,
        at: DateTime<Utc>,
        method: VerificationMethod,
    ) -> Result<(), RecordError> {
        if self.clock_in_at.is_some() {
            return Err(RecordError::AlreadyClockedIn);
        }
        self.clock_in_at = Some(at);
        self.verification_method = Some(method);
        Ok(())
    }

    /// Apply a clock-out at `at`; must be strictly after the clock-in
    pub fn record_clock_out(&mut self, at: DateTime<Utc>) -> Result<(), RecordError> {
        let clock_in_at = match (self.clock_in_at, self.clock_out_at) {
            (Some(clock_in_at), None) => clock_in_at,
            _ => return Err(RecordError::NotClockedIn),
        };
        if at <= clock_in_at {
            return Err(RecordError::OutOfOrder {
                clock_in_at,
                clock_out_at: at,
            });
        }
        self.clock_out_at = Some(at);
        Ok(())
    }
}

/// Registered biometric credential. Public-key material is opaque to the client.
#[derive(Debug, Clone, PartialEq)]
pub struct BiometricCredential {
    pub id: CredentialId,
    pub public_key_ref: Option<String>,
    pub registered_at: Option<DateTime<Utc>>,
}

/// Challenge session - a single-use server challenge
///
/// Consumed by value when handed to the platform authenticator, so the same
/// session cannot feed two ceremonies.
#[derive(Debug)]
pub struct ChallengeSession {
    /// Local correlation id for logs
    pub id: Uuid,
    challenge_bytes: Vec<u8>,
    pub purpose: ChallengePurpose,
    pub issued_at: DateTime<Utc>,
}

impl ChallengeSession {
    pub fn new(challenge_bytes: Vec<u8>, purpose: ChallengePurpose) -> Self {
        Self {
            id: Uuid::new_v4(),
            challenge_bytes,
            purpose,
            issued_at: Utc::now(),
        }
    }

    pub fn challenge(&self) -> &[u8] {
        &self.challenge_bytes
    }

    /// Consume the session, yielding the challenge for the ceremony
    pub fn into_challenge(self) -> Vec<u8> {
        self.challenge_bytes
    }
}
