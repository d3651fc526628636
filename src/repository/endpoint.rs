//! Endpoint data model
//!
//! An `Endpoint` couples the declared configuration of a backend with the
//! runtime state the health scheduler observes for it. The repository owns
//! every record; readers get defensive clones.

use crate::config::{endpoint::resolve_url, EndpointConfig, FilterConfig, PlatformKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Endpoint health status.
///
/// Richer than binary up/down so the proxy can keep routing to backends
/// that are reachable but loaded or still initialising.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointStatus {
    /// Never probed yet
    Unknown,
    /// Probe succeeded
    Healthy,
    /// Reachable but under load
    Busy,
    /// Reachable, still initialising
    Warming,
    /// Unreachable at the network layer
    Offline,
    /// Reachable but returned non-success
    Unhealthy,
}

impl EndpointStatus {
    /// Whether the proxy is permitted to forward traffic to an endpoint in
    /// this state. Healthy, busy, and warming endpoints all accept traffic;
    /// busy and warming are semantic hints, not exclusions.
    pub fn is_routable(&self) -> bool {
        matches!(self, Self::Healthy | Self::Busy | Self::Warming)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Healthy => "healthy",
            Self::Busy => "busy",
            Self::Warming => "warming",
            Self::Offline => "offline",
            Self::Unhealthy => "unhealthy",
        }
    }
}

impl std::fmt::Display for EndpointStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A declared backend endpoint with its observable runtime state.
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoint {
    /// Canonical base URL; its string form is the repository key
    pub url: Url,
    /// Human-readable name
    pub name: String,
    /// Declared platform type tag
    pub kind: PlatformKind,
    /// Routing priority, higher = preferred
    pub priority: u32,
    /// Fully-resolved health-check URL
    pub health_check_url: Url,
    /// Fully-resolved model-discovery URL
    pub model_url: Url,
    /// Probe cadence
    pub check_interval: Duration,
    /// Per-probe timeout
    pub check_timeout: Duration,
    /// Declared per-endpoint model filter
    pub model_filter: Option<FilterConfig>,

    /// Current health status
    pub status: EndpointStatus,
    /// When the last probe completed
    pub last_checked: Option<DateTime<Utc>>,
    /// Last observed probe latency
    pub last_latency: Option<Duration>,
    /// Consecutive failed probes
    pub consecutive_failures: u32,
    /// Current backoff multiplier applied to the probe interval
    pub backoff_multiplier: u32,
    /// When the next probe is due
    pub next_check_due: DateTime<Utc>,
}

impl Endpoint {
    /// Build an endpoint from a validated config entry, resolving the
    /// health-check and model URLs against the base URL. Runtime state is
    /// seeded to unprobed: status unknown, backoff 1, next check due now.
    pub fn from_config(config: &EndpointConfig) -> Result<Self, String> {
        config.validate()?;

        let url =
            Url::parse(&config.url).map_err(|e| format!("invalid url {:?}: {e}", config.url))?;

        let health_path = config
            .health_check_url
            .as_deref()
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| config.kind.default_health_path());
        let health_check_url = resolve_url(&url, health_path)
            .map_err(|e| format!("invalid health_check_url {health_path:?}: {e}"))?;

        let model_path = config
            .model_url
            .as_deref()
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| config.kind.default_model_path());
        let model_url = resolve_url(&url, model_path)
            .map_err(|e| format!("invalid model_url {model_path:?}: {e}"))?;

        Ok(Self {
            name: config.display_name().to_string(),
            url,
            kind: config.kind,
            priority: config.priority,
            health_check_url,
            model_url,
            check_interval: config.check_interval,
            check_timeout: config.check_timeout,
            model_filter: config.model_filter.clone(),
            status: EndpointStatus::Unknown,
            last_checked: None,
            last_latency: None,
            consecutive_failures: 0,
            backoff_multiplier: 1,
            next_check_due: Utc::now(),
        })
    }

    /// The repository key: the canonical string form of the base URL.
    pub fn key(&self) -> &str {
        self.url.as_str()
    }

    /// Whether the proxy may forward traffic to this endpoint.
    pub fn is_routable(&self) -> bool {
        self.status.is_routable()
    }

    /// Copy the live runtime state from `other` into this record.
    ///
    /// Used by the reconciler to carry health across a config reload when
    /// the declaration is semantically unchanged.
    pub(crate) fn carry_state_from(&mut self, other: &Endpoint) {
        self.status = other.status;
        self.last_checked = other.last_checked;
        self.last_latency = other.last_latency;
        self.consecutive_failures = other.consecutive_failures;
        self.backoff_multiplier = other.backoff_multiplier;
        self.next_check_due = other.next_check_due;
    }
}
