//! Credential Challenge Client
//!
//! Drives the challenge-response ceremony against the backend:
//!
//! Registration: request challenge -> platform `create` -> submit encoded
//! attestation.
//!
//! Authentication: request challenge + allowed credential ids -> platform
//! `get` -> submit encoded assertion -> `{verified}`.
//!
//! Every challenge is single-use. Digests of recently seen challenges are
//! kept so a replayed challenge is refused before it reaches the platform.

use std::collections::VecDeque;
use std::sync::Arc;

use kernel::id::{CredentialId, UserId};
use platform::crypto::{from_base64, sha256, short_digest};
use tokio::sync::Mutex;

use crate::application::config::AttendanceConfig;
use crate::application::session::Session;
use crate::domain::ceremony::{
    CeremonyError, CreationOptions, CredentialAuthenticator, EncodedAssertion,
    EncodedAttestation, RequestOptions, UserEntity, UserVerification,
};
use crate::domain::entities::{BiometricCredential, ChallengeSession};
use crate::domain::repository::BiometricRepository;
use crate::domain::value_objects::ChallengePurpose;
use crate::error::BiometricError;

impl From<CeremonyError> for BiometricError {
    fn from(err: CeremonyError) -> Self {
        match err {
            CeremonyError::NotSupported => BiometricError::Unsupported,
            CeremonyError::Cancelled => BiometricError::Cancelled,
            CeremonyError::Failed(message) => BiometricError::Platform(message),
        }
    }
}

/// Credential challenge client
pub struct CredentialChallengeClient<R, A>
where
    R: BiometricRepository,
    A: CredentialAuthenticator,
{
    repo: Arc<R>,
    authenticator: Arc<A>,
    config: Arc<AttendanceConfig>,
    recent_challenges: Mutex<VecDeque<[u8; 32]>>,
}

impl<R, A> CredentialChallengeClient<R, A>
where
    R: BiometricRepository,
    A: CredentialAuthenticator,
{
    pub fn new(repo: Arc<R>, authenticator: Arc<A>, config: Arc<AttendanceConfig>) -> Self {
        Self {
            repo,
            authenticator,
            config,
            recent_challenges: Mutex::new(VecDeque::new()),
        }
    }

    /// Whether the device has a platform authenticator
    pub fn is_supported(&self) -> bool {
        self.authenticator.is_supported()
    }

    /// Register this device's credential for the signed-in user
    pub async fn register(&self, session: &Session) -> Result<CredentialId, BiometricError> {
        if !self.is_supported() {
            return Err(BiometricError::Unsupported);
        }
        let user_id = session.user_id();

        let issued = self.repo.registration_challenge(user_id).await?;
        let challenge = self
            .accept_challenge(&issued.challenge, ChallengePurpose::Register)
            .await?;

        let user_handle = issued
            .user_id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| user_id.to_string());
        let options = CreationOptions::platform_biometric(
            challenge.into_challenge(),
            self.config.relying_party(),
            UserEntity {
                id: user_handle.into_bytes(),
                name: session.user_name().to_string(),
                display_name: session.user_name().to_string(),
            },
            self.config.ceremony_timeout,
        );

        let attestation = self.run_ceremony(self.authenticator.create(options)).await?;
        let encoded = EncodedAttestation::encode(&attestation);
        self.repo.register_credential(user_id, &encoded).await?;

        let credential_id = CredentialId::new(encoded.id);
        tracing::info!(
            user_id = %user_id,
            credential_id = %credential_id,
            "Biometric credential registered"
        );
        Ok(credential_id)
    }

    /// Prove possession of a registered credential
    ///
    /// `Ok` only when the remote verifier answered `verified: true`.
    pub async fn authenticate(&self, user_id: &UserId) -> Result<CredentialId, BiometricError> {
        if !self.is_supported() {
            return Err(BiometricError::Unsupported);
        }

        let issued = self.repo.authentication_challenge(user_id).await?;
        let challenge = self
            .accept_challenge(&issued.challenge, ChallengePurpose::Authenticate)
            .await?;

        let allow_credentials = issued
            .allow_credentials
            .iter()
            .map(|id| {
                from_base64(id).map_err(|_| {
                    BiometricError::MalformedChallenge(format!("credential id {:?}", id))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let options = RequestOptions {
            challenge: challenge.into_challenge(),
            allow_credentials,
            user_verification: UserVerification::Required,
            timeout: self.config.ceremony_timeout,
        };

        let assertion = self.run_ceremony(self.authenticator.get(options)).await?;
        let encoded = EncodedAssertion::encode(&assertion);

        let verified = self.repo.verify_assertion(user_id, &encoded).await?;
        let credential_id = CredentialId::new(encoded.id);
        if !verified {
            tracing::warn!(
                user_id = %user_id,
                credential_id = %credential_id,
                "Biometric assertion rejected by verifier"
            );
            return Err(BiometricError::VerificationFailed);
        }

        tracing::info!(
            user_id = %user_id,
            credential_id = %credential_id,
            "Biometric assertion verified"
        );
        Ok(credential_id)
    }

    /// Registered credentials for the signed-in user
    pub async fn list_devices(
        &self,
        session: &Session,
    ) -> Result<Vec<BiometricCredential>, BiometricError> {
        Ok(self.repo.list_credentials(session.user_id()).await?)
    }

    /// Remove one registered credential
    pub async fn remove_device(
        &self,
        session: &Session,
        credential_id: &CredentialId,
    ) -> Result<(), BiometricError> {
        self.repo
            .remove_credential(session.user_id(), credential_id)
            .await?;
        tracing::info!(
            user_id = %session.user_id(),
            credential_id = %credential_id,
            "Biometric credential removed"
        );
        Ok(())
    }

    /// Decode a server challenge and refuse one already used
    async fn accept_challenge(
        &self,
        encoded: &str,
        purpose: ChallengePurpose,
    ) -> Result<ChallengeSession, BiometricError> {
        let bytes = from_base64(encoded)
            .map_err(|e| BiometricError::MalformedChallenge(e.to_string()))?;
        if bytes.is_empty() {
            return Err(BiometricError::MalformedChallenge(
                "empty challenge".to_string(),
            ));
        }

        let digest = sha256(&bytes);
        let challenge_digest = short_digest(&bytes);
        {
            let mut recent = self.recent_challenges.lock().await;
            if recent.contains(&digest) {
                tracing::warn!(%challenge_digest, %purpose, "Refusing reused challenge");
                return Err(BiometricError::ChallengeReused);
            }
            recent.push_back(digest);
            while recent.len() > self.config.challenge_history.max(1) {
                recent.pop_front();
            }
        }

        let session = ChallengeSession::new(bytes, purpose);
        tracing::debug!(
            %challenge_digest,
            %purpose,
            session_id = %session.id,
            "Challenge accepted"
        );
        Ok(session)
    }

    /// Await a platform ceremony under the configured deadline
    async fn run_ceremony<T>(
        &self,
        ceremony: impl Future<Output = Result<T, CeremonyError>>,
    ) -> Result<T, BiometricError> {
        match tokio::time::timeout(self.config.ceremony_timeout, ceremony).await {
            Ok(result) => result.map_err(|err| {
                tracing::debug!(error = %err, "Platform ceremony did not complete");
                BiometricError::from(err)
            }),
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.config.ceremony_timeout_ms(),
                    "Platform ceremony timed out"
                );
                Err(BiometricError::Cancelled)
            }
        }
    }
}
