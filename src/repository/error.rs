//! Error types for the endpoint repository.

use thiserror::Error;

/// Errors that can occur on repository operations.
#[derive(Debug, Clone, Error)]
pub enum RepositoryError {
    /// No endpoint registered under the given URL key
    #[error("endpoint not found: {0}")]
    EndpointNotFound(String),

    /// The repository holds no endpoints at all
    #[error("no endpoints configured")]
    NoEndpoints,
}
