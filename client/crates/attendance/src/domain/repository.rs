//! Repository Traits
//!
//! Interfaces to the attendance backend. Implementation is in the
//! infrastructure layer.

use chrono::{DateTime, NaiveDate, Utc};
use kernel::id::{CredentialId, LocationId, UserId};
use platform::secret::{BearerToken, SignInPassword};

use crate::domain::ceremony::{
    EncodedAssertion, EncodedAttestation, IssuedAuthenticationChallenge,
    IssuedRegistrationChallenge,
};
use crate::domain::entities::{AttendanceRecord, BiometricCredential, GeofenceLocation};
use crate::domain::value_objects::{ClockDirection, LatLng, Position, VerificationMethod};
use crate::error::ApiResult;

/// Proof attached to a clock commit, produced by a verification gate
#[derive(Debug, Clone, PartialEq)]
pub enum Evidence {
    /// Position was inside the selected location's radius
    Geofence {
        location_id: LocationId,
        position: Position,
        distance_meters: f64,
    },
    /// Server verified a biometric assertion
    Biometric { credential_id: Option<CredentialId> },
    /// No verification; position, if any, is informational only
    Unverified { position: Option<Position> },
}

impl Evidence {
    pub fn method(&self) -> VerificationMethod {
        match self {
            Evidence::Geofence { .. } => VerificationMethod::Geofence,
            Evidence::Biometric { .. } => VerificationMethod::Biometric,
            Evidence::Unverified { .. } => VerificationMethod::None,
        }
    }
}

/// One clock transition to commit remotely
#[derive(Debug, Clone, PartialEq)]
pub struct ClockCommit {
    pub user_id: UserId,
    pub direction: ClockDirection,
    pub evidence: Evidence,
    /// Local time the transition was requested; the backend stamps its own
    pub requested_at: DateTime<Utc>,
}

/// Backend acknowledgement of a commit
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommitReceipt {
    pub message: Option<String>,
}

/// Fields for creating or replacing a geofence location
#[derive(Debug, Clone, PartialEq)]
pub struct LocationDraft {
    pub name: String,
    pub address: String,
    pub center: LatLng,
    pub radius_meters: f64,
}

/// Successful sign-in as reported by the backend
#[derive(Debug)]
pub struct SignInGrant {
    pub token: Option<BearerToken>,
    pub user_id: UserId,
    pub user_name: String,
    pub roles: Vec<String>,
}

/// Attendance record repository trait
#[trait_variant::make(AttendanceRepository: Send)]
pub trait LocalAttendanceRepository {
    /// Records for the signed-in user within an inclusive date range
    async fn fetch_records(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ApiResult<Vec<AttendanceRecord>>;

    /// Commit one clock transition
    async fn commit(&self, commit: &ClockCommit) -> ApiResult<CommitReceipt>;
}

/// Geofence location repository trait
#[trait_variant::make(GeofenceRepository: Send)]
pub trait LocalGeofenceRepository {
    async fn list_locations(&self) -> ApiResult<Vec<GeofenceLocation>>;

    /// Server-side within/outside check
    async fn verify_location(&self, point: LatLng, location_id: &LocationId) -> ApiResult<bool>;

    async fn create_location(&self, draft: &LocationDraft) -> ApiResult<()>;

    async fn update_location(&self, id: &LocationId, draft: &LocationDraft) -> ApiResult<()>;

    async fn delete_location(&self, id: &LocationId) -> ApiResult<()>;
}

/// Biometric credential repository trait
#[trait_variant::make(BiometricRepository: Send)]
pub trait LocalBiometricRepository {
    async fn registration_challenge(
        &self,
        user_id: &UserId,
    ) -> ApiResult<IssuedRegistrationChallenge>;

    async fn register_credential(
        &self,
        user_id: &UserId,
        credential: &EncodedAttestation,
    ) -> ApiResult<()>;

    async fn authentication_challenge(
        &self,
        user_id: &UserId,
    ) -> ApiResult<IssuedAuthenticationChallenge>;

    /// Submit an assertion; `Ok(false)` means the verifier rejected it
    async fn verify_assertion(
        &self,
        user_id: &UserId,
        assertion: &EncodedAssertion,
    ) -> ApiResult<bool>;

    async fn list_credentials(&self, user_id: &UserId) -> ApiResult<Vec<BiometricCredential>>;

    async fn remove_credential(
        &self,
        user_id: &UserId,
        credential_id: &CredentialId,
    ) -> ApiResult<()>;
}

/// Sign-in gateway trait
#[trait_variant::make(SessionGateway: Send)]
pub trait LocalSessionGateway {
    async fn sign_in(&self, email: &str, password: &SignInPassword) -> ApiResult<SignInGrant>;
}
