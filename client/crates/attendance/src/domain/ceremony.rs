//! Platform Credential Ceremony
//!
//! The device-bound key operations (secure enclave, TPM, platform
//! authenticator) are delegated to a [`CredentialAuthenticator`] binding with
//! two operations, `create` and `get`. This module defines their input and
//! output contract plus the text-safe wire encoding of their results.

use std::time::Duration;

use platform::crypto::{from_base64, to_base64};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// COSE algorithm identifier for ECDSA w/ SHA-256
pub const COSE_ES256: i64 = -7;
/// COSE algorithm identifier for RSASSA-PKCS1-v1_5 w/ SHA-256
pub const COSE_RS256: i64 = -257;

/// Credential type string used on the wire
pub const PUBLIC_KEY_CREDENTIAL: &str = "public-key";

/// Relying party the credential is scoped to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelyingParty {
    pub id: String,
    pub name: String,
}

/// Account the credential is created for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserEntity {
    /// Opaque user handle (the backend user id as bytes)
    pub id: Vec<u8>,
    pub name: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthenticatorAttachment {
    /// Built-in authenticator (fingerprint reader, face sensor)
    Platform,
    CrossPlatform,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserVerification {
    Required,
    Preferred,
    Discouraged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttestationConveyance {
    None,
    Indirect,
    Direct,
}

/// Input to `create`
#[derive(Debug, Clone)]
pub struct CreationOptions {
    pub challenge: Vec<u8>,
    pub relying_party: RelyingParty,
    pub user: UserEntity,
    /// COSE algorithms in order of preference
    pub algorithms: Vec<i64>,
    pub attachment: AuthenticatorAttachment,
    pub user_verification: UserVerification,
    pub attestation: AttestationConveyance,
    pub timeout: Duration,
}

impl CreationOptions {
    /// Options for enrolling a built-in biometric authenticator
    pub fn platform_biometric(
        challenge: Vec<u8>,
        relying_party: RelyingParty,
        user: UserEntity,
        timeout: Duration,
    ) -> Self {
        Self {
            challenge,
            relying_party,
            user,
            algorithms: vec![COSE_ES256, COSE_RS256],
            attachment: AuthenticatorAttachment::Platform,
            user_verification: UserVerification::Required,
            attestation: AttestationConveyance::Direct,
            timeout,
        }
    }
}

/// Input to `get`
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub challenge: Vec<u8>,
    /// Credential ids the server will accept; empty means any
    pub allow_credentials: Vec<Vec<u8>>,
    pub user_verification: UserVerification,
    pub timeout: Duration,
}

/// Result of `create`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attestation {
    pub credential_id: Vec<u8>,
    pub attestation_object: Vec<u8>,
    pub client_data_json: Vec<u8>,
}

/// Result of `get`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assertion {
    pub credential_id: Vec<u8>,
    pub authenticator_data: Vec<u8>,
    pub client_data_json: Vec<u8>,
    pub signature: Vec<u8>,
    pub user_handle: Option<Vec<u8>>,
}

/// Platform ceremony failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CeremonyError {
    #[error("no platform authenticator available")]
    NotSupported,

    /// User dismissed the dialog (or the platform timed it out)
    #[error("ceremony cancelled")]
    Cancelled,

    #[error("authenticator failed: {0}")]
    Failed(String),
}

/// Platform credential capability
#[trait_variant::make(CredentialAuthenticator: Send)]
pub trait LocalCredentialAuthenticator {
    /// Whether a platform authenticator exists at all
    fn is_supported(&self) -> bool;

    /// Create a new device-bound credential
    async fn create(&self, options: CreationOptions) -> Result<Attestation, CeremonyError>;

    /// Sign the challenge with an existing credential
    async fn get(&self, options: RequestOptions) -> Result<Assertion, CeremonyError>;
}

// ============================================================================
// Wire encoding
// ============================================================================

/// A binary field failed to decode
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("field `{field}` is not valid base64")]
pub struct FieldDecodeError {
    pub field: &'static str,
}

fn decode_field(field: &'static str, value: &str) -> Result<Vec<u8>, FieldDecodeError> {
    from_base64(value).map_err(|_| FieldDecodeError { field })
}

/// Attestation response as submitted for registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodedAttestationResponse {
    pub attestation_object: String,
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: String,
}

/// Registration credential with every binary field as base64 text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodedAttestation {
    pub id: String,
    pub raw_id: String,
    #[serde(rename = "type")]
    pub credential_type: String,
    pub response: EncodedAttestationResponse,
}

impl EncodedAttestation {
    pub fn encode(attestation: &Attestation) -> Self {
        let id = to_base64(&attestation.credential_id);
        Self {
            raw_id: id.clone(),
            id,
            credential_type: PUBLIC_KEY_CREDENTIAL.to_string(),
            response: EncodedAttestationResponse {
                attestation_object: to_base64(&attestation.attestation_object),
                client_data_json: to_base64(&attestation.client_data_json),
            },
        }
    }

    pub fn decode(&self) -> Result<Attestation, FieldDecodeError> {
        Ok(Attestation {
            credential_id: decode_field("rawId", &self.raw_id)?,
            attestation_object: decode_field(
                "attestationObject",
                &self.response.attestation_object,
            )?,
            client_data_json: decode_field("clientDataJSON", &self.response.client_data_json)?,
        })
    }
}

/// Assertion response as submitted for verification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodedAssertionResponse {
    pub authenticator_data: String,
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: String,
    pub signature: String,
    pub user_handle: Option<String>,
}

/// Authentication credential with every binary field as base64 text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodedAssertion {
    pub id: String,
    pub raw_id: String,
    #[serde(rename = "type")]
    pub credential_type: String,
    pub response: EncodedAssertionResponse,
}

impl EncodedAssertion {
    pub fn encode(assertion: &Assertion) -> Self {
        let id = to_base64(&assertion.credential_id);
        Self {
            raw_id: id.clone(),
            id,
            credential_type: PUBLIC_KEY_CREDENTIAL.to_string(),
            response: EncodedAssertionResponse {
                authenticator_data: to_base64(&assertion.authenticator_data),
                client_data_json: to_base64(&assertion.client_data_json),
                signature: to_base64(&assertion.signature),
                user_handle: assertion.user_handle.as_deref().map(to_base64),
            },
        }
    }

    pub fn decode(&self) -> Result<Assertion, FieldDecodeError> {
        let user_handle = match &self.response.user_handle {
            Some(handle) => Some(decode_field("userHandle", handle)?),
            None => None,
        };
        Ok(Assertion {
            credential_id: decode_field("rawId", &self.raw_id)?,
            authenticator_data: decode_field(
                "authenticatorData",
                &self.response.authenticator_data,
            )?,
            client_data_json: decode_field("clientDataJSON", &self.response.client_data_json)?,
            signature: decode_field("signature", &self.response.signature)?,
            user_handle,
        })
    }
}

// ============================================================================
// Issued challenges
// ============================================================================

/// Server response to a registration challenge request (still encoded)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedRegistrationChallenge {
    pub challenge: String,
    /// User handle echoed by the server, if any
    pub user_id: Option<String>,
}

/// Server response to an authentication challenge request (still encoded)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedAuthenticationChallenge {
    pub challenge: String,
    pub allow_credentials: Vec<String>,
}
