//! Verification Gates
//!
//! A gate decides whether one clock attempt may be committed:
//! - [`GeofenceGate`]: device position must fall inside the selected location
//! - [`BiometricGate`]: the credential ceremony must be verified by the server
//! - [`NoneGate`]: plain clock; always verified, position attached as metadata
//!
//! [`ConfiguredGate`] selects one of them from `VERIFICATION_MODE`.

use std::sync::Arc;

use kernel::id::UserId;
use uuid::Uuid;

use crate::application::catalog::GeofenceCatalog;
use crate::application::credential::CredentialChallengeClient;
use crate::application::position::PositionProvider;
use crate::domain::ceremony::CredentialAuthenticator;
use crate::domain::device::PositionSource;
use crate::domain::repository::{BiometricRepository, Evidence, GeofenceRepository};
use crate::domain::services::evaluate;
use crate::domain::value_objects::{ClockDirection, VerificationMethod};
use crate::error::DenialReason;

/// What a gate knows about the attempt it is judging
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationContext {
    pub user_id: UserId,
    pub direction: ClockDirection,
    /// Correlates log lines of one attempt
    pub attempt_id: Uuid,
}

/// Gate decision
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Verified(Evidence),
    Denied(DenialReason),
}

/// Verification strategy guarding clock transitions
#[trait_variant::make(VerificationGate: Send)]
pub trait LocalVerificationGate {
    fn method(&self) -> VerificationMethod;

    async fn verify(&self, context: &VerificationContext) -> Verdict;
}

// ============================================================================
// Geofence
// ============================================================================

pub struct GeofenceGate<S, G>
where
    S: PositionSource + Send + Sync + 'static,
    G: GeofenceRepository,
{
    position: Arc<PositionProvider<S>>,
    catalog: Arc<GeofenceCatalog<G>>,
}

impl<S, G> GeofenceGate<S, G>
where
    S: PositionSource + Send + Sync + 'static,
    G: GeofenceRepository,
{
    pub fn new(position: Arc<PositionProvider<S>>, catalog: Arc<GeofenceCatalog<G>>) -> Self {
        Self { position, catalog }
    }
}

impl<S, G> VerificationGate for GeofenceGate<S, G>
where
    S: PositionSource + Send + Sync + 'static,
    G: GeofenceRepository + Send + Sync,
{
    fn method(&self) -> VerificationMethod {
        VerificationMethod::Geofence
    }

    async fn verify(&self, context: &VerificationContext) -> Verdict {
        let location = match self.catalog.selected_location().await {
            Ok(location) => location,
            Err(reason) => return Verdict::Denied(reason),
        };
        let position = match self.position.get_position().await {
            Ok(position) => position,
            Err(err) => return Verdict::Denied(err.into()),
        };

        let verdict = evaluate(position, &location);
        if !verdict.within {
            tracing::warn!(
                attempt_id = %context.attempt_id,
                location_id = %location.id,
                distance_m = verdict.rounded_distance(),
                radius_m = location.radius_meters,
                "Outside work location"
            );
            return Verdict::Denied(DenialReason::OutsideGeofence {
                distance_meters: verdict.distance_meters,
            });
        }

        tracing::debug!(
            attempt_id = %context.attempt_id,
            location_id = %location.id,
            distance_m = verdict.rounded_distance(),
            "Within work location"
        );
        Verdict::Verified(Evidence::Geofence {
            location_id: location.id,
            position,
            distance_meters: verdict.distance_meters,
        })
    }
}

// ============================================================================
// Biometric
// ============================================================================

pub struct BiometricGate<R, A>
where
    R: BiometricRepository,
    A: CredentialAuthenticator,
{
    credentials: Arc<CredentialChallengeClient<R, A>>,
}

impl<R, A> BiometricGate<R, A>
where
    R: BiometricRepository,
    A: CredentialAuthenticator,
{
    pub fn new(credentials: Arc<CredentialChallengeClient<R, A>>) -> Self {
        Self { credentials }
    }
}

impl<R, A> VerificationGate for BiometricGate<R, A>
where
    R: BiometricRepository + Send + Sync,
    A: CredentialAuthenticator + Send + Sync,
{
    fn method(&self) -> VerificationMethod {
        VerificationMethod::Biometric
    }

    async fn verify(&self, context: &VerificationContext) -> Verdict {
        match self.credentials.authenticate(&context.user_id).await {
            Ok(credential_id) => Verdict::Verified(Evidence::Biometric {
                credential_id: Some(credential_id),
            }),
            Err(err) => {
                tracing::warn!(
                    attempt_id = %context.attempt_id,
                    error = %err,
                    "Biometric verification did not succeed"
                );
                Verdict::Denied(err.into())
            }
        }
    }
}

// ============================================================================
// None
// ============================================================================

/// Plain clock: no verification; a position, when available, rides along
pub struct NoneGate<S>
where
    S: PositionSource + Send + Sync + 'static,
{
    position: Option<Arc<PositionProvider<S>>>,
}

impl<S> NoneGate<S>
where
    S: PositionSource + Send + Sync + 'static,
{
    pub fn new(position: Option<Arc<PositionProvider<S>>>) -> Self {
        Self { position }
    }
}

impl<S> VerificationGate for NoneGate<S>
where
    S: PositionSource + Send + Sync + 'static,
{
    fn method(&self) -> VerificationMethod {
        VerificationMethod::None
    }

    async fn verify(&self, context: &VerificationContext) -> Verdict {
        let position = match &self.position {
            Some(provider) => match provider.get_position().await {
                Ok(position) => Some(position),
                Err(err) => {
                    tracing::debug!(
                        attempt_id = %context.attempt_id,
                        error = %err,
                        "Clocking without location metadata"
                    );
                    None
                }
            },
            None => None,
        };
        Verdict::Verified(Evidence::Unverified { position })
    }
}

// ============================================================================
// Configured
// ============================================================================

/// The gate chosen by configuration
pub enum ConfiguredGate<S, G, R, A>
where
    S: PositionSource + Send + Sync + 'static,
    G: GeofenceRepository,
    R: BiometricRepository,
    A: CredentialAuthenticator,
{
    Geofence(GeofenceGate<S, G>),
    Biometric(BiometricGate<R, A>),
    None(NoneGate<S>),
}

impl<S, G, R, A> ConfiguredGate<S, G, R, A>
where
    S: PositionSource + Send + Sync + 'static,
    G: GeofenceRepository,
    R: BiometricRepository,
    A: CredentialAuthenticator,
{
    pub fn for_method(
        method: VerificationMethod,
        position: Arc<PositionProvider<S>>,
        catalog: Arc<GeofenceCatalog<G>>,
        credentials: Arc<CredentialChallengeClient<R, A>>,
    ) -> Self {
        match method {
            VerificationMethod::Geofence => {
                ConfiguredGate::Geofence(GeofenceGate::new(position, catalog))
            }
            VerificationMethod::Biometric => {
                ConfiguredGate::Biometric(BiometricGate::new(credentials))
            }
            VerificationMethod::None => ConfiguredGate::None(NoneGate::new(Some(position))),
        }
    }
}

impl<S, G, R, A> VerificationGate for ConfiguredGate<S, G, R, A>
where
    S: PositionSource + Send + Sync + 'static,
    G: GeofenceRepository + Send + Sync,
    R: BiometricRepository + Send + Sync,
    A: CredentialAuthenticator + Send + Sync,
{
    fn method(&self) -> VerificationMethod {
        match self {
            ConfiguredGate::Geofence(gate) => VerificationGate::method(gate),
            ConfiguredGate::Biometric(gate) => VerificationGate::method(gate),
            ConfiguredGate::None(gate) => VerificationGate::method(gate),
        }
    }

    async fn verify(&self, context: &VerificationContext) -> Verdict {
        match self {
            ConfiguredGate::Geofence(gate) => VerificationGate::verify(gate, context).await,
            ConfiguredGate::Biometric(gate) => VerificationGate::verify(gate, context).await,
            ConfiguredGate::None(gate) => VerificationGate::verify(gate, context).await,
        }
    }
}
