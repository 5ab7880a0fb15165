//! Common ID Types
//!
//! Type-safe wrappers for identifiers issued by the attendance backend.
//! The client never mints these; it only carries them between calls.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Generic typed ID wrapper
///
/// Usage:
/// ```
/// use kernel::id::{Id, markers};
/// type UserId = Id<markers::User>;
/// let id = UserId::new("u-17");
/// assert_eq!(id.as_str(), "u-17");
/// ```
pub struct Id<T> {
    value: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Id<T> {
    /// Wrap an identifier received from the backend
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            _marker: PhantomData,
        }
    }

    /// Get the raw identifier
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Convert to the raw identifier
    pub fn into_string(self) -> String {
        self.value
    }

    /// Empty identifiers are never issued by the backend
    pub fn is_empty(&self) -> bool {
        self.value.trim().is_empty()
    }
}

impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        Self::new(self.value.clone())
    }
}

impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T> Eq for Id<T> {}

impl<T> Hash for Id<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl<T> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self.value)
    }
}

impl<T> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.value)
    }
}

impl<T> From<String> for Id<T> {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl<T> From<&str> for Id<T> {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl<T> Serialize for Id<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.value)
    }
}

impl<'de, T> Deserialize<'de> for Id<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Some backend tables use numeric keys
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(i64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => Self::new(s),
            Raw::Number(n) => Self::new(n.to_string()),
        })
    }
}

/// Marker types for different entity IDs
pub mod markers {
    /// Marker for employee/user IDs
    pub struct User;

    /// Marker for geofence location IDs
    pub struct GeofenceLocation;

    /// Marker for registered biometric credential IDs
    pub struct Credential;
}

/// Type aliases for common IDs
pub type UserId = Id<markers::User>;
pub type LocationId = Id<markers::GeofenceLocation>;
pub type CredentialId = Id<markers::Credential>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_type_safety() {
        let user: UserId = Id::new("42");
        let location: LocationId = Id::new("42");

        // Same text, different types; only the raw values compare
        assert_eq!(user.as_str(), location.as_str());
    }

    #[test]
    fn test_id_deserializes_string_or_number() {
        let from_text: LocationId = serde_json::from_str(r#""hq-1""#).unwrap();
        assert_eq!(from_text.as_str(), "hq-1");

        let from_number: LocationId = serde_json::from_str("7").unwrap();
        assert_eq!(from_number.as_str(), "7");
    }

    #[test]
    fn test_id_serializes_as_string() {
        let id: UserId = Id::new("u-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), r#""u-1""#);
    }

    #[test]
    fn test_is_empty() {
        assert!(UserId::new("  ").is_empty());
        assert!(!UserId::new("a").is_empty());
    }
}
