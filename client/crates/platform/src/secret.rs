//! Secrets held by the client
//!
//! - [`BearerToken`]: session token issued at sign-in, zeroized on drop
//! - [`SignInPassword`]: password typed at sign-in, zeroized on drop
//!
//! Neither type implements `Clone`, and Debug output is redacted.

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

/// Session bearer token with automatic memory zeroization
///
/// ## Examples
/// ```rust
/// use platform::secret::BearerToken;
///
/// let token = BearerToken::new("eyJhbGciOi...").unwrap();
/// assert_eq!(token.authorization(), "Bearer eyJhbGciOi...");
/// assert_eq!(format!("{:?}", token), r#"BearerToken("[REDACTED]")"#);
/// ```
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct BearerToken(String);

impl BearerToken {
    /// Wrap a token; empty or whitespace-only tokens are rejected
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return None;
        }
        Some(Self(raw))
    }

    /// Value for the `Authorization` header
    pub fn authorization(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BearerToken").field(&"[REDACTED]").finish()
    }
}

/// Password entered at sign-in
///
/// Only ever forwarded to the backend; never hashed or stored client-side.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SignInPassword(String);

impl SignInPassword {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SignInPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SignInPassword").field(&"[REDACTED]").finish()
    }
}
