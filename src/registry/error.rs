//! Error types for the model registry.

use thiserror::Error;

/// Errors that can occur during model registry operations.
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    /// No models registered for the given endpoint
    #[error("no models registered for endpoint: {0}")]
    EndpointNotFound(String),

    /// The registry refused the write
    #[error("registry rejected update: {0}")]
    Rejected(String),
}
