//! Signed-in Session
//!
//! Explicit session object handed to the state machine, gates and REST
//! adapter. Created at sign-in, disposed at sign-out; the bearer token is
//! zeroized when disposed.

use std::sync::{PoisonError, RwLock};

use kernel::id::UserId;
use platform::secret::BearerToken;

use crate::error::ApiError;

/// Signed-in user session
#[derive(Debug)]
pub struct Session {
    user_id: UserId,
    user_name: String,
    roles: Vec<String>,
    token: RwLock<Option<BearerToken>>,
}

impl Session {
    pub fn new(
        user_id: UserId,
        user_name: impl Into<String>,
        roles: Vec<String>,
        token: BearerToken,
    ) -> Self {
        Self {
            user_id,
            user_name: user_name.into(),
            roles,
            token: RwLock::new(Some(token)),
        }
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    pub fn roles(&self) -> &[String] {
        &self.roles
    }

    pub fn is_open(&self) -> bool {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// `Authorization` header value, or `SessionClosed` after dispose
    pub fn authorization(&self) -> Result<String, ApiError> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(BearerToken::authorization)
            .ok_or(ApiError::SessionClosed)
    }

    /// Capability-set membership check (case-insensitive)
    pub fn has_any_role<S: AsRef<str>>(&self, required: &[S]) -> bool {
        required.iter().any(|wanted| {
            self.roles
                .iter()
                .any(|role| role.eq_ignore_ascii_case(wanted.as_ref()))
        })
    }

    /// Drop the token; every later authorized call fails with `SessionClosed`
    pub fn dispose(&self) {
        let token = self
            .token
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if token.is_some() {
            tracing::info!(user_id = %self.user_id, "Session disposed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(roles: &[&str]) -> Session {
        Session::new(
            UserId::new("42"),
            "Ana Cruz",
            roles.iter().map(|r| r.to_string()).collect(),
            BearerToken::new("tok-123").unwrap(),
        )
    }

    #[test]
    fn test_authorization_until_disposed() {
        let session = session(&["employee"]);
        assert!(session.is_open());
        assert_eq!(session.authorization().unwrap(), "Bearer tok-123");

        session.dispose();
        assert!(!session.is_open());
        assert_eq!(session.authorization(), Err(ApiError::SessionClosed));

        // second dispose is a no-op
        session.dispose();
        assert!(!session.is_open());
    }

    #[test]
    fn test_has_any_role() {
        let session = session(&["Employee", "Manager"]);
        assert!(session.has_any_role(&["admin", "manager"]));
        assert!(!session.has_any_role(&["admin"]));
        assert!(!session.has_any_role::<&str>(&[]));
    }
}
