//! Discovery metrics.
//!
//! Process-wide counters for the discovery pipeline. Plain counters use
//! atomics; the latency average, timestamp, and per-endpoint error map are
//! composite updates guarded by one mutex. Snapshots are value copies.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Point-in-time copy of the discovery counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DiscoveryMetrics {
    pub total_attempts: u64,
    pub successful: u64,
    pub failed: u64,
    /// Running average latency; weights recent samples heavily
    pub average_latency_ms: u64,
    pub last_discovery: Option<DateTime<Utc>>,
    /// Discovery error count per endpoint URL
    pub endpoint_errors: HashMap<String, u64>,
    /// Endpoints currently disabled for discovery
    pub disabled_endpoints: usize,
}

#[derive(Default)]
struct Composite {
    average_latency_ms: u64,
    has_latency_sample: bool,
    last_discovery: Option<DateTime<Utc>>,
    endpoint_errors: HashMap<String, u64>,
}

/// Shared recorder behind the metrics snapshot.
#[derive(Default)]
pub struct MetricsRecorder {
    total: AtomicU64,
    successful: AtomicU64,
    failed: AtomicU64,
    composite: Mutex<Composite>,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a discovery attempt; called unconditionally on entry.
    pub fn record_attempt(&self) {
        self.total.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("manifold_discovery_attempts_total").increment(1);
    }

    pub fn record_success(&self, latency: Duration) {
        self.successful.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("manifold_discovery_success_total").increment(1);
        metrics::histogram!("manifold_discovery_latency_seconds").record(latency.as_secs_f64());

        let sample_ms = latency.as_millis() as u64;
        let mut composite = self
            .composite
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        composite.average_latency_ms = if composite.has_latency_sample {
            (composite.average_latency_ms + sample_ms) / 2
        } else {
            sample_ms
        };
        composite.has_latency_sample = true;
        composite.last_discovery = Some(Utc::now());
    }

    pub fn record_failure(&self, endpoint_url: &str) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("manifold_discovery_failure_total").increment(1);

        let mut composite = self
            .composite
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *composite
            .endpoint_errors
            .entry(endpoint_url.to_string())
            .or_insert(0) += 1;
    }

    /// Value snapshot; `disabled_endpoints` is filled in by the orchestrator.
    pub fn snapshot(&self) -> DiscoveryMetrics {
        let composite = self
            .composite
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        DiscoveryMetrics {
            total_attempts: self.total.load(Ordering::Relaxed),
            successful: self.successful.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            average_latency_ms: composite.average_latency_ms,
            last_discovery: composite.last_discovery,
            endpoint_errors: composite.endpoint_errors.clone(),
            disabled_endpoints: 0,
        }
    }
}
