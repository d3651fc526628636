//! Shared helpers for integration tests.

use manifold::config::{EndpointConfig, PlatformKind};
use manifold::repository::{Endpoint, EndpointRepository};
use std::sync::Arc;
use std::time::Duration;

/// Endpoint declaration pointing at a mock server.
pub fn endpoint_config(url: &str, kind: PlatformKind) -> EndpointConfig {
    EndpointConfig {
        name: "test-backend".to_string(),
        url: url.to_string(),
        kind,
        priority: 100,
        health_check_url: None,
        model_url: None,
        check_interval: Duration::from_secs(5),
        check_timeout: Duration::from_secs(2),
        model_filter: None,
    }
}

/// Repository seeded with a single endpoint.
pub fn repository_with(config: &EndpointConfig) -> Arc<EndpointRepository> {
    let repository = Arc::new(EndpointRepository::new());
    repository.load_from_config(std::slice::from_ref(config));
    repository
}

/// The single endpoint out of a one-endpoint repository.
pub fn sole_endpoint(repository: &EndpointRepository) -> Endpoint {
    let mut all = repository.get_all();
    assert_eq!(all.len(), 1, "expected exactly one endpoint");
    all.pop().unwrap()
}
