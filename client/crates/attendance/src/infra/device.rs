//! Static Device Bindings
//!
//! Device capabilities for hosts without location or biometric hardware:
//! a fixed operator-supplied position and an authenticator that reports
//! itself unsupported.

use chrono::Utc;

use crate::domain::ceremony::{
    Assertion, Attestation, CeremonyError, CreationOptions, CredentialAuthenticator,
    RequestOptions,
};
use crate::domain::device::{PositionOptions, PositionSource};
use crate::domain::value_objects::{LatLng, Position};
use crate::error::LocationError;

/// Position source that reports a fixed coordinate, or no capability at all
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticPositionSource {
    fix: Option<(LatLng, f64)>,
}

impl StaticPositionSource {
    pub fn fixed(point: LatLng, accuracy_meters: f64) -> Self {
        Self {
            fix: Some((point, accuracy_meters.max(0.0))),
        }
    }

    /// No location capability
    pub fn absent() -> Self {
        Self { fix: None }
    }
}

impl PositionSource for StaticPositionSource {
    fn is_available(&self) -> bool {
        self.fix.is_some()
    }

    async fn current_position(&self, _options: PositionOptions) -> Result<Position, LocationError> {
        let (point, accuracy_meters) = self.fix.ok_or(LocationError::Unavailable)?;
        // Every request yields a fresh fix
        Ok(Position {
            latitude: point.latitude,
            longitude: point.longitude,
            accuracy_meters,
            captured_at: Utc::now(),
        })
    }
}

/// Authenticator for hosts with no platform credential capability
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedAuthenticator;

impl CredentialAuthenticator for UnsupportedAuthenticator {
    fn is_supported(&self) -> bool {
        false
    }

    async fn create(&self, _options: CreationOptions) -> Result<Attestation, CeremonyError> {
        Err(CeremonyError::NotSupported)
    }

    async fn get(&self, _options: RequestOptions) -> Result<Assertion, CeremonyError> {
        Err(CeremonyError::NotSupported)
    }
}
