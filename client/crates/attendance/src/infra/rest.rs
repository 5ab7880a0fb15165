//! REST Repository Implementations
//!
//! One adapter, [`RestApi`], implements every backend port over HTTP/JSON.

use std::sync::Arc;

use chrono::NaiveDate;
use kernel::id::{CredentialId, LocationId, UserId};
use platform::secret::{BearerToken, SignInPassword};
use platform::transport::Transport;
use reqwest::header::AUTHORIZATION;
use reqwest::{Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;

use crate::application::session::Session;
use crate::domain::ceremony::{
    EncodedAssertion, EncodedAttestation, IssuedAuthenticationChallenge,
    IssuedRegistrationChallenge,
};
use crate::domain::entities::{AttendanceRecord, BiometricCredential, GeofenceLocation};
use crate::domain::repository::{
    AttendanceRepository, BiometricRepository, ClockCommit, CommitReceipt, Evidence,
    GeofenceRepository, LocationDraft, SessionGateway, SignInGrant,
};
use crate::domain::value_objects::{ClockDirection, LatLng};
use crate::error::{ApiError, ApiResult};
use crate::infra::dto::{
    AttendanceRecordDto, AuthenticateRequest, AuthenticateResponse,
    AuthenticationChallengeResponse, ClockRequest, DeviceDto, ErrorResponse,
    GeofenceLocationDto, GeofenceVerifyRequest, GeofenceVerifyResponse, LocationClockRequest,
    LocationPayload, MessageResponse, RegisterCredentialRequest, RegistrationChallengeResponse,
    SignInRequest, SignInResponse, UserRequest,
};

/// Longest backend error text carried into an error message
const MAX_ERROR_TEXT: usize = 200;

/// HTTP adapter for the attendance backend
#[derive(Clone)]
pub struct RestApi {
    transport: Transport,
    session: Option<Arc<Session>>,
}

impl RestApi {
    /// Adapter for unauthenticated calls (sign-in)
    pub fn anonymous(transport: Transport) -> Self {
        Self {
            transport,
            session: None,
        }
    }

    /// Adapter sending the session's bearer token
    pub fn with_session(transport: Transport, session: Arc<Session>) -> Self {
        Self {
            transport,
            session: Some(session),
        }
    }

    fn url(&self, segments: &[&str]) -> ApiResult<Url> {
        self.transport
            .endpoint(segments)
            .map_err(|e| ApiError::Transport(e.to_string()))
    }

    /// Start an authorized request
    fn request(&self, method: Method, segments: &[&str]) -> ApiResult<RequestBuilder> {
        let authorization = self
            .session
            .as_ref()
            .ok_or(ApiError::SessionClosed)?
            .authorization()?;
        let url = self.url(segments)?;
        tracing::debug!(%method, path = url.path(), "Backend request");
        Ok(self
            .transport
            .client()
            .request(method, url)
            .header(AUTHORIZATION, authorization))
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> ApiResult<T> {
        let response = checked(builder.send().await?).await?;
        let body = response.bytes().await?;
        let body: &[u8] = if body.iter().all(u8::is_ascii_whitespace) {
            b"{}"
        } else {
            &body
        };
        serde_json::from_slice(body).map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn send_empty(&self, builder: RequestBuilder) -> ApiResult<()> {
        checked(builder.send().await?).await?;
        Ok(())
    }
}

/// Turn a non-success response into `ApiError::Status` with the backend's message
async fn checked(response: Response) -> ApiResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ErrorResponse>(&text) {
        Ok(body) => body.into_message(),
        Err(_) => text.trim().chars().take(MAX_ERROR_TEXT).collect(),
    };
    tracing::debug!(status = status.as_u16(), %message, "Backend rejected request");
    Err(ApiError::Status {
        status: status.as_u16(),
        message,
    })
}

// ============================================================================
// Session Gateway Implementation
// ============================================================================

impl SessionGateway for RestApi {
    async fn sign_in(&self, email: &str, password: &SignInPassword) -> ApiResult<SignInGrant> {
        let url = self.url(&["auth", "signin"])?;
        let builder = self.transport.client().post(url).json(&SignInRequest {
            email,
            password: password.expose(),
        });
        let response: SignInResponse = self.send(builder).await?;
        Ok(SignInGrant {
            token: response.token.and_then(BearerToken::new),
            user_id: response.user_id,
            user_name: response.user_name.unwrap_or_default(),
            roles: response.role_name.map(|r| r.into_vec()).unwrap_or_default(),
        })
    }
}

// ============================================================================
// Attendance Repository Implementation
// ============================================================================

impl AttendanceRepository for RestApi {
    async fn fetch_records(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ApiResult<Vec<AttendanceRecord>> {
        let builder = self.request(Method::GET, &["attendance", "reports"])?.query(&[
            ("startDate", start.format("%Y-%m-%d").to_string()),
            ("endDate", end.format("%Y-%m-%d").to_string()),
        ]);
        let rows: Vec<AttendanceRecordDto> = self.send(builder).await?;
        rows.into_iter().map(AttendanceRecordDto::into_record).collect()
    }

    async fn commit(&self, commit: &ClockCommit) -> ApiResult<CommitReceipt> {
        let user_id = &commit.user_id;
        let builder = match (&commit.evidence, commit.direction) {
            (
                Evidence::Geofence {
                    location_id,
                    position,
                    ..
                },
                direction,
            ) => {
                let action = match direction {
                    ClockDirection::In => "clock-in-location",
                    ClockDirection::Out => "clock-out-location",
                };
                self.request(Method::POST, &["attendance", action])?
                    .json(&LocationClockRequest {
                        user_id,
                        location_id,
                        latitude: position.latitude,
                        longitude: position.longitude,
                        accuracy: position.accuracy_meters,
                    })
            }
            (Evidence::Biometric { .. }, direction) => {
                let action = match direction {
                    ClockDirection::In => "clock-in-biometric",
                    ClockDirection::Out => "clock-out-biometric",
                };
                self.request(Method::POST, &["attendance", action])?
                    .json(&UserRequest { user_id })
            }
            (Evidence::Unverified { position }, direction) => {
                let action = match direction {
                    ClockDirection::In => "clockin",
                    ClockDirection::Out => "clockout",
                };
                self.request(Method::POST, &["attendance", action])?
                    .json(&ClockRequest::new(user_id, position.as_ref()))
            }
        };
        let response: MessageResponse = self.send(builder).await?;
        Ok(CommitReceipt {
            message: response.message,
        })
    }
}

// ============================================================================
// Geofence Repository Implementation
// ============================================================================

impl GeofenceRepository for RestApi {
    async fn list_locations(&self) -> ApiResult<Vec<GeofenceLocation>> {
        let builder = self.request(Method::GET, &["geofence", "locations"])?;
        let rows: Vec<GeofenceLocationDto> = self.send(builder).await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let id = row.id.clone();
                let location = row.into_location();
                if location.is_none() {
                    tracing::warn!(location_id = %id, "Skipping location with invalid geometry");
                }
                location
            })
            .collect())
    }

    async fn verify_location(&self, point: LatLng, location_id: &LocationId) -> ApiResult<bool> {
        let builder = self
            .request(Method::POST, &["geofence", "verify"])?
            .json(&GeofenceVerifyRequest {
                latitude: point.latitude,
                longitude: point.longitude,
                location_id,
            });
        let response: GeofenceVerifyResponse = self.send(builder).await?;
        Ok(response.within)
    }

    async fn create_location(&self, draft: &LocationDraft) -> ApiResult<()> {
        let builder = self
            .request(Method::POST, &["geofence", "locations"])?
            .json(&LocationPayload::from(draft));
        self.send_empty(builder).await
    }

    async fn update_location(&self, id: &LocationId, draft: &LocationDraft) -> ApiResult<()> {
        let builder = self
            .request(Method::PUT, &["geofence", "locations", id.as_str()])?
            .json(&LocationPayload::from(draft));
        self.send_empty(builder).await
    }

    async fn delete_location(&self, id: &LocationId) -> ApiResult<()> {
        let builder = self.request(Method::DELETE, &["geofence", "locations", id.as_str()])?;
        self.send_empty(builder).await
    }
}

// ============================================================================
// Biometric Repository Implementation
// ============================================================================

impl BiometricRepository for RestApi {
    async fn registration_challenge(
        &self,
        user_id: &UserId,
    ) -> ApiResult<IssuedRegistrationChallenge> {
        let builder = self
            .request(Method::POST, &["biometric", "register", "challenge"])?
            .json(&UserRequest { user_id });
        let response: RegistrationChallengeResponse = self.send(builder).await?;
        Ok(IssuedRegistrationChallenge {
            challenge: response.challenge,
            user_id: response.user_id.map(UserId::into_string),
        })
    }

    async fn register_credential(
        &self,
        user_id: &UserId,
        credential: &EncodedAttestation,
    ) -> ApiResult<()> {
        let builder = self
            .request(Method::POST, &["biometric", "register"])?
            .json(&RegisterCredentialRequest {
                user_id,
                credential,
            });
        self.send_empty(builder).await
    }

    async fn authentication_challenge(
        &self,
        user_id: &UserId,
    ) -> ApiResult<IssuedAuthenticationChallenge> {
        let builder = self
            .request(Method::POST, &["biometric", "authenticate", "challenge"])?
            .json(&UserRequest { user_id });
        let response: AuthenticationChallengeResponse = self.send(builder).await?;
        Ok(IssuedAuthenticationChallenge {
            challenge: response.challenge,
            allow_credentials: response
                .allow_credentials
                .into_iter()
                .map(|c| c.id)
                .collect(),
        })
    }

    async fn verify_assertion(
        &self,
        user_id: &UserId,
        assertion: &EncodedAssertion,
    ) -> ApiResult<bool> {
        let builder = self
            .request(Method::POST, &["biometric", "authenticate"])?
            .json(&AuthenticateRequest { user_id, assertion });
        let response: AuthenticateResponse = self.send(builder).await?;
        Ok(response.verified.unwrap_or(false))
    }

    async fn list_credentials(&self, user_id: &UserId) -> ApiResult<Vec<BiometricCredential>> {
        let builder = self.request(Method::GET, &["biometric", user_id.as_str(), "devices"])?;
        let rows: Vec<DeviceDto> = self.send(builder).await?;
        Ok(rows.into_iter().map(DeviceDto::into_credential).collect())
    }

    async fn remove_credential(
        &self,
        user_id: &UserId,
        credential_id: &CredentialId,
    ) -> ApiResult<()> {
        let builder = self.request(
            Method::DELETE,
            &[
                "biometric",
                user_id.as_str(),
                "credentials",
                credential_id.as_str(),
            ],
        )?;
        self.send_empty(builder).await
    }
}
