//! Discovery orchestrator configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Model discovery orchestrator configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Whether periodic model discovery is enabled
    pub enabled: bool,
    /// Seconds between fleet-wide discovery sweeps
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    /// Per-endpoint discovery timeout
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Maximum concurrent per-endpoint discovery tasks
    pub concurrent_workers: usize,
    /// Attempts per endpoint per sweep for recoverable failures
    pub retry_attempts: u32,
    /// Delay between retry attempts
    #[serde(with = "humantime_serde")]
    pub retry_backoff: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(300),
            timeout: Duration::from_secs(30),
            concurrent_workers: 5,
            retry_attempts: 3,
            retry_backoff: Duration::from_secs(1),
        }
    }
}
