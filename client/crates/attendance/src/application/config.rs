//! Application Configuration
//!
//! Configuration for the attendance application layer.

use std::env;
use std::time::Duration;

use kernel::id::LocationId;
use platform::transport::{TransportConfig, parse_base_url};
use thiserror::Error;

use crate::domain::ceremony::RelyingParty;
use crate::domain::device::PositionOptions;
use crate::domain::value_objects::VerificationMethod;

/// Invalid configuration value
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{key}={value:?}: {reason}")]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
    pub reason: String,
}

/// Attendance application configuration
#[derive(Debug, Clone)]
pub struct AttendanceConfig {
    /// API root, e.g. `https://hr.example.com/api`
    pub api_base_url: String,
    /// Which verification gate guards clock actions
    pub verification_mode: VerificationMethod,
    /// Location fix deadline (10 seconds)
    pub location_timeout: Duration,
    /// Oldest acceptable cached fix; zero forces a fresh fix
    pub location_max_age: Duration,
    /// Slack allowed between the device clock and a fresh fix's timestamp
    pub location_clock_skew: Duration,
    /// Platform credential dialog deadline (60 seconds)
    pub ceremony_timeout: Duration,
    /// Whole-request HTTP timeout
    pub http_timeout: Duration,
    /// Relying-party display name
    pub rp_name: String,
    /// Relying-party id; defaults to the API host
    pub rp_id: Option<String>,
    /// Work location preselected for the geofence gate
    pub geofence_location_id: Option<LocationId>,
    /// Roles allowed to manage geofence locations
    pub manager_roles: Vec<String>,
    /// How many recent challenges are remembered to refuse replays
    pub challenge_history: usize,
}

impl Default for AttendanceConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:5000/api".to_string(),
            verification_mode: VerificationMethod::Geofence,
            location_timeout: Duration::from_secs(10),
            location_max_age: Duration::ZERO,
            location_clock_skew: Duration::from_secs(1),
            ceremony_timeout: Duration::from_secs(60),
            http_timeout: Duration::from_secs(15),
            rp_name: "Attendance System".to_string(),
            rp_id: None,
            geofence_location_id: None,
            manager_roles: vec!["admin".to_string(), "manager".to_string()],
            challenge_history: 64,
        }
    }
}

impl AttendanceConfig {
    /// Create config for development (plain clock, no verification)
    pub fn development() -> Self {
        Self {
            verification_mode: VerificationMethod::None,
            ..Default::default()
        }
    }

    /// Defaults overlaid with process environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().overlay(|key| env::var(key).ok())
    }

    /// Overlay values from a key lookup (environment, `.env`, test map)
    ///
    /// Empty values are treated as unset.
    pub fn overlay<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(value) = get("API_BASE_URL") {
            parse_base_url(&value).map_err(|e| ConfigError {
                key: "API_BASE_URL",
                value: value.clone(),
                reason: e.to_string(),
            })?;
            self.api_base_url = value;
        }
        if let Some(value) = get("VERIFICATION_MODE") {
            self.verification_mode = value.parse().map_err(|reason| ConfigError {
                key: "VERIFICATION_MODE",
                value: value.clone(),
                reason,
            })?;
        }
        if let Some(value) = get("LOCATION_TIMEOUT_MS") {
            self.location_timeout = parse_millis("LOCATION_TIMEOUT_MS", &value, false)?;
        }
        if let Some(value) = get("LOCATION_MAX_AGE_MS") {
            self.location_max_age = parse_millis("LOCATION_MAX_AGE_MS", &value, true)?;
        }
        if let Some(value) = get("CEREMONY_TIMEOUT_MS") {
            self.ceremony_timeout = parse_millis("CEREMONY_TIMEOUT_MS", &value, false)?;
        }
        if let Some(value) = get("HTTP_TIMEOUT_MS") {
            self.http_timeout = parse_millis("HTTP_TIMEOUT_MS", &value, false)?;
        }
        if let Some(value) = get("RP_NAME") {
            self.rp_name = value;
        }
        if let Some(value) = get("RP_ID") {
            self.rp_id = Some(value);
        }
        if let Some(value) = get("GEOFENCE_LOCATION_ID") {
            self.geofence_location_id = Some(LocationId::new(value.trim()));
        }
        if let Some(value) = get("MANAGER_ROLES") {
            self.manager_roles = value
                .split(',')
                .map(|role| role.trim().to_string())
                .filter(|role| !role.is_empty())
                .collect();
        }
        Ok(self)
    }

    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            base_url: self.api_base_url.clone(),
            request_timeout: self.http_timeout,
            ..Default::default()
        }
    }

    pub fn position_options(&self) -> PositionOptions {
        PositionOptions {
            high_accuracy: true,
            timeout: self.location_timeout,
            maximum_age: self.location_max_age,
        }
    }

    /// Relying party for credential ceremonies
    pub fn relying_party(&self) -> RelyingParty {
        let id = self.rp_id.clone().unwrap_or_else(|| {
            parse_base_url(&self.api_base_url)
                .ok()
                .and_then(|url| url.host_str().map(str::to_string))
                .unwrap_or_else(|| "localhost".to_string())
        });
        RelyingParty {
            id,
            name: self.rp_name.clone(),
        }
    }

    pub fn location_timeout_ms(&self) -> u64 {
        self.location_timeout.as_millis() as u64
    }

    pub fn ceremony_timeout_ms(&self) -> u64 {
        self.ceremony_timeout.as_millis() as u64
    }
}

fn parse_millis(key: &'static str, value: &str, allow_zero: bool) -> Result<Duration, ConfigError> {
    let millis: u64 = value.trim().parse().map_err(|e: std::num::ParseIntError| ConfigError {
        key,
        value: value.to_string(),
        reason: e.to_string(),
    })?;
    if millis == 0 && !allow_zero {
        return Err(ConfigError {
            key,
            value: value.to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(Duration::from_millis(millis))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AttendanceConfig::default();
        assert_eq!(config.verification_mode, VerificationMethod::Geofence);
        assert_eq!(config.location_timeout_ms(), 10_000);
        assert_eq!(config.location_max_age, Duration::ZERO);
        assert_eq!(config.ceremony_timeout_ms(), 60_000);
        assert_eq!(config.relying_party().id, "localhost");
        assert_eq!(config.relying_party().name, "Attendance System");
    }

    #[test]
    fn test_overlay_reads_values() {
        let config = AttendanceConfig::default()
            .overlay(lookup(&[
                ("API_BASE_URL", "https://hr.example.com/api"),
                ("VERIFICATION_MODE", "biometric"),
                ("LOCATION_TIMEOUT_MS", "5000"),
                ("GEOFENCE_LOCATION_ID", " 7 "),
                ("MANAGER_ROLES", "HR, admin,"),
                ("RP_NAME", ""),
            ]))
            .unwrap();
        assert_eq!(config.verification_mode, VerificationMethod::Biometric);
        assert_eq!(config.location_timeout, Duration::from_secs(5));
        assert_eq!(config.geofence_location_id, Some(LocationId::new("7")));
        assert_eq!(config.manager_roles, vec!["HR", "admin"]);
        assert_eq!(config.rp_name, "Attendance System");
        assert_eq!(config.relying_party().id, "hr.example.com");
    }

    #[test]
    fn test_overlay_rejects_bad_values() {
        let err = AttendanceConfig::default()
            .overlay(lookup(&[("VERIFICATION_MODE", "retina")]))
            .unwrap_err();
        assert_eq!(err.key, "VERIFICATION_MODE");

        let err = AttendanceConfig::default()
            .overlay(lookup(&[("CEREMONY_TIMEOUT_MS", "0")]))
            .unwrap_err();
        assert_eq!(err.key, "CEREMONY_TIMEOUT_MS");

        let err = AttendanceConfig::default()
            .overlay(lookup(&[("API_BASE_URL", "ftp://files")]))
            .unwrap_err();
        assert_eq!(err.key, "API_BASE_URL");
    }

    #[test]
    fn test_zero_max_age_allowed() {
        let config = AttendanceConfig::default()
            .overlay(lookup(&[("LOCATION_MAX_AGE_MS", "0")]))
            .unwrap();
        assert_eq!(config.position_options().maximum_age, Duration::ZERO);
    }
}
