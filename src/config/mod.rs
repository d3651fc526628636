//! Configuration module for Manifold
//!
//! Provides the declared shape of the backend fleet: endpoint declarations,
//! discovery orchestrator settings, and logging. File loading is YAML; the
//! embedding proxy owns CLI flags and environment handling.

pub mod discovery;
pub mod endpoint;
pub mod error;
pub mod logging;

pub use discovery::DiscoveryConfig;
pub use endpoint::{EndpointConfig, FilterConfig, PlatformKind};
pub use error::ConfigError;
pub use logging::{LogFormat, LogLevel, LoggingConfig};

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration struct that holds all sub-configurations
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    pub endpoints: Vec<EndpointConfig>,
    pub discovery: DiscoveryConfig,
    pub logging: LoggingConfig,
}

impl GatewayConfig {
    /// Load configuration from a YAML file
    ///
    /// If path is None, returns default configuration.
    /// If path doesn't exist, returns NotFound error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => {
                if !p.exists() {
                    return Err(ConfigError::NotFound(p.to_path_buf()));
                }
                let content = std::fs::read_to_string(p)?;
                Self::from_yaml_str(&content)
            }
            None => Ok(Self::default()),
        }
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Validate configuration
    ///
    /// Checks every endpoint declaration; fails on the first invalid entry
    /// with a field-qualified message. The repository re-validates per entry
    /// during reconciliation so that one bad endpoint does not abort a
    /// whole reload.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (i, endpoint) in self.endpoints.iter().enumerate() {
            endpoint
                .validate()
                .map_err(|message| ConfigError::Validation {
                    field: format!("endpoints[{}]", i),
                    message,
                })?;
        }

        Ok(())
    }
}
