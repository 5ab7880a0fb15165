//! API DTOs (Data Transfer Objects)
//!
//! Wire shapes of the attendance backend. Field names are camelCase.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use kernel::id::{CredentialId, LocationId, UserId};
use serde::{Deserialize, Serialize};

use crate::domain::ceremony::{EncodedAssertion, EncodedAttestation};
use crate::domain::entities::{AttendanceRecord, BiometricCredential, GeofenceLocation};
use crate::domain::repository::LocationDraft;
use crate::domain::value_objects::{LatLng, Position, VerificationMethod};
use crate::error::ApiError;

// ============================================================================
// Auth
// ============================================================================

/// Request for POST /auth/signin
#[derive(Debug, Serialize)]
pub struct SignInRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// A single role name or a list of them
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RoleNames {
    One(String),
    Many(Vec<String>),
}

impl RoleNames {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            RoleNames::One(role) => vec![role],
            RoleNames::Many(roles) => roles,
        }
    }
}

/// Response for POST /auth/signin
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInResponse {
    #[serde(default)]
    pub token: Option<String>,
    pub user_id: UserId,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub role_name: Option<RoleNames>,
}

// ============================================================================
// Attendance
// ============================================================================

/// Request for POST /attendance/clockin and /attendance/clockout
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClockRequest<'a> {
    pub user_id: &'a UserId,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl<'a> ClockRequest<'a> {
    pub fn new(user_id: &'a UserId, position: Option<&Position>) -> Self {
        Self {
            user_id,
            latitude: position.map(|p| p.latitude),
            longitude: position.map(|p| p.longitude),
        }
    }
}

/// Request for POST /attendance/clock-{in,out}-location
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationClockRequest<'a> {
    pub user_id: &'a UserId,
    pub location_id: &'a LocationId,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: f64,
}

/// Request carrying only the user id
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRequest<'a> {
    pub user_id: &'a UserId,
}

/// Generic `{message}` response
#[derive(Debug, Default, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: Option<String>,
}

/// Error body of a non-success response
#[derive(Debug, Default, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ErrorResponse {
    pub fn into_message(self) -> String {
        self.message.or(self.error).unwrap_or_default()
    }
}

/// Row of GET /attendance/reports
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecordDto {
    pub date: String,
    #[serde(default)]
    pub clock_in: Option<String>,
    #[serde(default)]
    pub clock_out: Option<String>,
    #[serde(default)]
    pub verification_method: Option<String>,
}

impl AttendanceRecordDto {
    pub fn into_record(self) -> Result<AttendanceRecord, ApiError> {
        let clock_in_at = self.clock_in.as_deref().map(parse_timestamp).transpose()?;
        let clock_out_at = self.clock_out.as_deref().map(parse_timestamp).transpose()?;
        Ok(AttendanceRecord {
            day_key: parse_day(&self.date)?,
            clock_in_at,
            clock_out_at,
            verification_method: self
                .verification_method
                .as_deref()
                .and_then(|m| m.parse::<VerificationMethod>().ok()),
        })
    }
}

/// Parse a backend timestamp; offset-less values are local wall-clock time
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, ApiError> {
    let raw = raw.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(at.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .map_err(|_| ApiError::Decode(format!("invalid timestamp {:?}", raw)))?;
    // ambiguous times at a DST fold resolve to the earlier instant
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|at| at.with_timezone(&Utc))
        .ok_or_else(|| ApiError::Decode(format!("nonexistent local time {:?}", raw)))
}

/// Parse a `YYYY-MM-DD` day, ignoring any time part
pub fn parse_day(raw: &str) -> Result<NaiveDate, ApiError> {
    let raw = raw.trim();
    let day = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .map_err(|_| ApiError::Decode(format!("invalid date {:?}", raw)))
}

// ============================================================================
// Geofence
// ============================================================================

/// Row of GET /geofence/locations
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeofenceLocationDto {
    pub id: LocationId,
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(alias = "radiusMeters")]
    pub radius: f64,
}

impl GeofenceLocationDto {
    /// `None` when the backend sent an unusable centre or radius
    pub fn into_location(self) -> Option<GeofenceLocation> {
        GeofenceLocation::new(
            self.id,
            self.name,
            self.address.unwrap_or_default(),
            LatLng::new(self.latitude, self.longitude)?,
            self.radius,
        )
    }
}

/// Body of POST/PUT /geofence/locations
#[derive(Debug, Serialize)]
pub struct LocationPayload<'a> {
    pub name: &'a str,
    pub address: &'a str,
    pub latitude: f64,
    pub longitude: f64,
    pub radius: f64,
}

impl<'a> From<&'a LocationDraft> for LocationPayload<'a> {
    fn from(draft: &'a LocationDraft) -> Self {
        Self {
            name: &draft.name,
            address: &draft.address,
            latitude: draft.center.latitude,
            longitude: draft.center.longitude,
            radius: draft.radius_meters,
        }
    }
}

/// Request for POST /geofence/verify
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeofenceVerifyRequest<'a> {
    pub latitude: f64,
    pub longitude: f64,
    pub location_id: &'a LocationId,
}

/// Response for POST /geofence/verify
#[derive(Debug, Deserialize)]
pub struct GeofenceVerifyResponse {
    #[serde(default)]
    pub within: bool,
}

// ============================================================================
// Biometric
// ============================================================================

/// Response for POST /biometric/register/challenge
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationChallengeResponse {
    pub challenge: String,
    #[serde(default)]
    pub user_id: Option<UserId>,
}

#[derive(Debug, Deserialize)]
pub struct AllowedCredential {
    pub id: String,
}

/// Response for POST /biometric/authenticate/challenge
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationChallengeResponse {
    pub challenge: String,
    #[serde(default)]
    pub allow_credentials: Vec<AllowedCredential>,
}

/// Request for POST /biometric/register
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterCredentialRequest<'a> {
    pub user_id: &'a UserId,
    pub credential: &'a EncodedAttestation,
}

/// Request for POST /biometric/authenticate
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticateRequest<'a> {
    pub user_id: &'a UserId,
    pub assertion: &'a EncodedAssertion,
}

/// Response for POST /biometric/authenticate; a missing flag means rejected
#[derive(Debug, Deserialize)]
pub struct AuthenticateResponse {
    #[serde(default)]
    pub verified: Option<bool>,
}

/// Row of GET /biometric/{userId}/devices
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDto {
    #[serde(alias = "credentialId")]
    pub id: CredentialId,
    #[serde(default)]
    pub public_key: Option<String>,
    #[serde(default, alias = "createdAt")]
    pub registered_at: Option<String>,
}

impl DeviceDto {
    pub fn into_credential(self) -> BiometricCredential {
        BiometricCredential {
            id: self.id,
            public_key_ref: self.public_key,
            registered_at: self
                .registered_at
                .as_deref()
                .and_then(|raw| parse_timestamp(raw).ok()),
        }
    }
}
