//! Sign In Use Case
//!
//! Exchanges email and password for a bearer token and opens a [`Session`].

use std::sync::Arc;

use platform::secret::SignInPassword;

use crate::application::session::Session;
use crate::domain::repository::SessionGateway;
use crate::error::SessionError;

/// Sign in input
pub struct SignInInput {
    pub email: String,
    pub password: SignInPassword,
}

/// Sign in use case
pub struct SignInUseCase<G>
where
    G: SessionGateway,
{
    gateway: Arc<G>,
}

impl<G> SignInUseCase<G>
where
    G: SessionGateway,
{
    pub fn new(gateway: Arc<G>) -> Self {
        Self { gateway }
    }

    pub async fn execute(&self, input: SignInInput) -> Result<Arc<Session>, SessionError> {
        let email = input.email.trim();
        if email.is_empty() || input.password.is_empty() {
            return Err(SessionError::MissingCredentials);
        }

        let grant = self.gateway.sign_in(email, &input.password).await?;
        let token = grant.token.ok_or(SessionError::MissingToken)?;

        tracing::info!(
            user_id = %grant.user_id,
            roles = ?grant.roles,
            "Signed in"
        );

        Ok(Arc::new(Session::new(
            grant.user_id,
            grant.user_name,
            grant.roles,
            token,
        )))
    }
}
