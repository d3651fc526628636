//! HTTP health probing.

use super::state::ProbeOutcome;
use crate::repository::{Endpoint, EndpointStatus};
use std::time::{Duration, Instant};

/// Probes a single endpoint's health-check URL.
///
/// One shared client with a bounded connection pool serves the whole fleet;
/// each request carries the endpoint's own timeout.
pub struct HealthProbe {
    client: reqwest::Client,
}

impl HealthProbe {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(5)
            .pool_idle_timeout(Duration::from_secs(60))
            .build()
            .expect("Failed to build HTTP client");

        Self { client }
    }

    /// Create a probe around a custom HTTP client (for testing).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Probe an endpoint once.
    ///
    /// Decodes backend load hints: 429 means reachable but shedding load
    /// (busy), 503 means reachable but still initialising (warming). Both
    /// remain routable; any other non-2xx is an unhealthy response.
    pub async fn probe(&self, endpoint: &Endpoint) -> ProbeOutcome {
        let started = Instant::now();

        let response = self
            .client
            .get(endpoint.health_check_url.as_str())
            .timeout(endpoint.check_timeout)
            .send()
            .await;

        match response {
            Ok(response) => {
                let latency = started.elapsed();
                metrics::histogram!("manifold_probe_latency_seconds",
                    "endpoint" => endpoint.key().to_string()
                )
                .record(latency.as_secs_f64());

                let code = response.status().as_u16();
                match code {
                    200..=299 => ProbeOutcome::Responsive {
                        status: EndpointStatus::Healthy,
                        latency,
                    },
                    429 => ProbeOutcome::Responsive {
                        status: EndpointStatus::Busy,
                        latency,
                    },
                    503 => ProbeOutcome::Responsive {
                        status: EndpointStatus::Warming,
                        latency,
                    },
                    _ => ProbeOutcome::HttpError {
                        status_code: code,
                        latency,
                    },
                }
            }
            Err(error) => ProbeOutcome::Unreachable {
                error: error.to_string(),
            },
        }
    }
}

impl Default for HealthProbe {
    fn default() -> Self {
        Self::new()
    }
}
