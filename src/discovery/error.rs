//! Error types for model discovery.
//!
//! The taxonomy drives the orchestrator's retry-or-disable decision:
//! parse errors and HTTP 4xx are terminal for an endpoint, transport
//! failures and HTTP 5xx are worth retrying.

use super::profile::Profile;
use std::time::Duration;
use thiserror::Error;

/// Transport-layer failure (DNS, connect, timeout).
#[derive(Debug, Clone, Error)]
#[error("{url} unreachable: {message}")]
pub struct NetworkError {
    pub url: String,
    pub message: String,
    /// Whether the failure was a timeout rather than a refusal
    pub timed_out: bool,
}

impl NetworkError {
    pub fn from_reqwest(url: &str, error: &reqwest::Error) -> Self {
        Self {
            url: url.to_string(),
            message: error.to_string(),
            timed_out: error.is_timeout(),
        }
    }
}

/// Malformed response body.
#[derive(Debug, Clone, Error)]
#[error("invalid {format} response: {message}")]
pub struct ParseError {
    /// Which response format was expected, e.g. "ollama"
    pub format: String,
    /// Truncated copy of the offending data
    pub data: String,
    pub message: String,
}

impl ParseError {
    pub fn new(format: &str, data: &[u8], message: impl Into<String>) -> Self {
        const SNIPPET_LEN: usize = 256;
        let snippet = String::from_utf8_lossy(&data[..data.len().min(SNIPPET_LEN)]).into_owned();
        Self {
            format: format.to_string(),
            data: snippet,
            message: message.into(),
        }
    }
}

/// Lower-level failure wrapped by a [`DiscoveryError`].
#[derive(Debug, Error)]
pub enum DiscoveryErrorKind {
    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    /// No handler for the declared profile type
    #[error("no discovery handler for profile type {0:?}")]
    ProfileNotFound(String),

    /// A nested discovery failure, e.g. the last profile error after an
    /// exhausted auto-detection sequence
    #[error(transparent)]
    Discovery(Box<DiscoveryError>),
}

/// A discovery failure with full endpoint context.
#[derive(Debug, Error)]
pub struct DiscoveryError {
    /// What was being attempted, e.g. "http_status", "request", "auto_detect"
    pub operation: &'static str,
    pub endpoint_url: String,
    pub profile: Option<Profile>,
    pub status_code: Option<u16>,
    pub latency: Option<Duration>,
    #[source]
    pub source: Option<DiscoveryErrorKind>,
}

impl std::fmt::Display for DiscoveryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "discovery {} failed for {}", self.operation, self.endpoint_url)?;
        if let Some(profile) = self.profile {
            write!(f, " (profile {profile})")?;
        }
        if let Some(code) = self.status_code {
            write!(f, ": HTTP {code}")?;
        }
        Ok(())
    }
}

impl DiscoveryError {
    pub fn new(operation: &'static str, endpoint_url: &str) -> Self {
        Self {
            operation,
            endpoint_url: endpoint_url.to_string(),
            profile: None,
            status_code: None,
            latency: None,
            source: None,
        }
    }

    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.profile = Some(profile);
        self
    }

    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn with_source(mut self, source: impl Into<DiscoveryErrorKind>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Whether retrying the same discovery could plausibly succeed.
    ///
    /// Parse errors and client-side HTTP errors (4xx) will not improve on
    /// retry; transport failures and server errors (5xx) may. Ambiguous
    /// failures default to recoverable so an endpoint is not disabled on
    /// thin evidence.
    pub fn is_recoverable(&self) -> bool {
        match &self.source {
            Some(DiscoveryErrorKind::Parse(_)) => false,
            Some(DiscoveryErrorKind::Network(_)) => true,
            Some(DiscoveryErrorKind::ProfileNotFound(_)) => false,
            Some(DiscoveryErrorKind::Discovery(inner)) => inner.is_recoverable(),
            None => match self.status_code {
                Some(code) if (400..500).contains(&code) => false,
                Some(_) => true,
                None => true,
            },
        }
    }

    /// Short human string for log and UI presentation.
    pub fn user_message(&self) -> &'static str {
        match &self.source {
            Some(DiscoveryErrorKind::Parse(_)) => "invalid response format",
            Some(DiscoveryErrorKind::Network(network)) => {
                if network.timed_out {
                    "connection timeout"
                } else if network.message.contains("unreachable") {
                    "network unreachable"
                } else {
                    "endpoint unreachable"
                }
            }
            Some(DiscoveryErrorKind::Discovery(inner)) => inner.user_message(),
            Some(DiscoveryErrorKind::ProfileNotFound(_)) => "discovery failed",
            None => match self.status_code {
                Some(code) if (400..500).contains(&code) => {
                    "endpoint configuration issue (HTTP 4xx)"
                }
                Some(code) if code >= 500 => "endpoint server error (HTTP 5xx)",
                _ => "discovery failed",
            },
        }
    }

    /// Whether the wrapped failure is a parse error, at any nesting depth.
    pub fn is_parse_error(&self) -> bool {
        match &self.source {
            Some(DiscoveryErrorKind::Parse(_)) => true,
            Some(DiscoveryErrorKind::Discovery(inner)) => inner.is_parse_error(),
            _ => false,
        }
    }
}

impl From<DiscoveryError> for DiscoveryErrorKind {
    fn from(error: DiscoveryError) -> Self {
        DiscoveryErrorKind::Discovery(Box::new(error))
    }
}
