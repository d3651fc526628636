//! Probe outcomes and the endpoint state machine.
//!
//! Status only changes when a probe completes. Success resets the backoff
//! multiplier to 1; each failure doubles it up to a cap, and the next probe
//! is scheduled at `interval * multiplier`, bounded by the delay ceiling.

use crate::repository::{Endpoint, EndpointStatus};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Backoff multiplier ceiling.
pub const MAX_BACKOFF_MULTIPLIER: u32 = 12;

/// Ceiling on the delay until the next probe, regardless of multiplier.
pub const MAX_BACKOFF_DELAY: Duration = Duration::from_secs(60);

/// Result of probing one endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The backend answered with a success or a load hint
    Responsive {
        /// Healthy, or busy/warming when the backend hinted at load
        status: EndpointStatus,
        latency: Duration,
    },
    /// The backend answered with a non-success status
    HttpError { status_code: u16, latency: Duration },
    /// The backend could not be reached at the network layer
    Unreachable { error: String },
}

/// Status movement produced by applying a probe outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusTransition {
    pub from: EndpointStatus,
    pub to: EndpointStatus,
}

impl StatusTransition {
    pub fn changed(&self) -> bool {
        self.from != self.to
    }

    /// Whether the endpoint moved from a non-routable to a routable state.
    /// This is the edge that fires the recovery hook.
    pub fn recovered(&self) -> bool {
        !self.from.is_routable() && self.to.is_routable()
    }
}

/// Apply a probe outcome to an endpoint's runtime state.
pub fn apply_outcome(
    endpoint: &mut Endpoint,
    outcome: &ProbeOutcome,
    now: DateTime<Utc>,
) -> StatusTransition {
    let from = endpoint.status;
    endpoint.last_checked = Some(now);

    let to = match outcome {
        ProbeOutcome::Responsive { status, latency } => {
            endpoint.last_latency = Some(*latency);
            endpoint.consecutive_failures = 0;
            endpoint.backoff_multiplier = 1;
            endpoint.next_check_due = now + to_chrono(endpoint.check_interval);
            *status
        }
        ProbeOutcome::HttpError { latency, .. } => {
            endpoint.last_latency = Some(*latency);
            schedule_backoff(endpoint, now);
            EndpointStatus::Unhealthy
        }
        ProbeOutcome::Unreachable { .. } => {
            schedule_backoff(endpoint, now);
            EndpointStatus::Offline
        }
    };

    endpoint.status = to;
    StatusTransition { from, to }
}

fn schedule_backoff(endpoint: &mut Endpoint, now: DateTime<Utc>) {
    endpoint.consecutive_failures += 1;
    endpoint.backoff_multiplier = (endpoint.backoff_multiplier * 2).min(MAX_BACKOFF_MULTIPLIER);

    let delay = (endpoint.check_interval * endpoint.backoff_multiplier).min(MAX_BACKOFF_DELAY);
    endpoint.next_check_due = now + to_chrono(delay);
}

fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::seconds(60))
}
