//! HTTP transport to the attendance backend
//!
//! Builds the shared `reqwest::Client` and resolves endpoint paths
//! against the configured API base URL.

use std::time::Duration;

use reqwest::Url;

/// Transport configuration
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// API root, e.g. `https://hr.example.com/api`
    pub base_url: String,
    /// Whole-request timeout
    pub request_timeout: Duration,
    /// User-Agent sent with every request
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000/api".to_string(),
            request_timeout: Duration::from_secs(15),
            user_agent: concat!("attendance-client/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Error when building the transport
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Invalid API base URL: {0}")]
    InvalidBaseUrl(String),

    #[error("HTTP client could not be built: {0}")]
    Client(#[from] reqwest::Error),
}

/// Resolved backend endpoint root plus a configured client
#[derive(Debug, Clone)]
pub struct Transport {
    client: reqwest::Client,
    base: Url,
}

impl Transport {
    /// Build the HTTP client and validate the base URL
    pub fn new(config: &TransportConfig) -> Result<Self, TransportError> {
        let base = parse_base_url(&config.base_url)?;
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client, base })
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Host of the base URL (used as the default relying-party id)
    pub fn host(&self) -> Option<&str> {
        self.base.host_str()
    }

    /// Resolve an endpoint from path segments under the base URL
    ///
    /// Segments are percent-encoded, so backend ids can be passed as-is.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, TransportError> {
        endpoint_url(&self.base, segments)
    }
}

/// Parse the base URL, forcing a trailing slash so the base path is kept
pub fn parse_base_url(raw: &str) -> Result<Url, TransportError> {
    let mut normalized = raw.trim().to_string();
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    let url = Url::parse(&normalized).map_err(|e| TransportError::InvalidBaseUrl(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(TransportError::InvalidBaseUrl(format!(
            "unsupported scheme: {}",
            other
        ))),
    }
}

/// Append path segments to the base URL (`/api` + `attendance` -> `/api/attendance`)
pub fn endpoint_url(base: &Url, segments: &[&str]) -> Result<Url, TransportError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| TransportError::InvalidBaseUrl(base.to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}
