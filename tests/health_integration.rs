//! End-to-end tests: health scheduler, recovery hook, and discovery wired
//! together against mock backends.

mod common;

use common::{endpoint_config, repository_with, sole_endpoint};
use manifold::config::{DiscoveryConfig, PlatformKind};
use manifold::discovery::{DiscoveryClient, DiscoveryOrchestrator};
use manifold::health::HealthScheduler;
use manifold::registry::{InMemoryModelRegistry, ModelRegistry};
use manifold::repository::{EndpointRepository, EndpointStatus};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mock_ollama_backend() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "models": [{
                "name": "devstral:latest",
                "size": 14333927918u64,
                "details": {
                    "parameter_size": "23.6B",
                    "quantization_level": "Q4_K_M",
                    "family": "llama",
                    "format": "gguf"
                }
            }]
        })))
        .mount(&server)
        .await;
    server
}

fn wire_orchestrator(
    repository: &Arc<EndpointRepository>,
    registry: Arc<InMemoryModelRegistry>,
) -> Arc<DiscoveryOrchestrator> {
    Arc::new(DiscoveryOrchestrator::new(
        Arc::clone(repository),
        registry as Arc<dyn ModelRegistry>,
        Arc::new(DiscoveryClient::new()),
        DiscoveryConfig {
            retry_attempts: 1,
            retry_backoff: Duration::from_millis(10),
            ..Default::default()
        },
    ))
}

#[tokio::test]
async fn test_probe_then_discover_happy_path() {
    let server = mock_ollama_backend().await;

    let repository = repository_with(&endpoint_config(&server.uri(), PlatformKind::Ollama));
    let registry = Arc::new(InMemoryModelRegistry::new());
    let orchestrator = wire_orchestrator(&repository, registry.clone());

    let scheduler = Arc::new(HealthScheduler::new(Arc::clone(&repository)));
    scheduler.set_recovery_hook(Arc::clone(&orchestrator).recovery_hook());

    // Initial probe classifies the endpoint; the unknown -> healthy edge
    // fires the recovery hook, which discovers models immediately.
    Arc::clone(&scheduler).start().await.unwrap();

    let routable = repository.get_routable();
    assert_eq!(routable.len(), 1);
    assert_eq!(routable[0].status, EndpointStatus::Healthy);

    let endpoint = sole_endpoint(&repository);
    let models = registry.models_for(endpoint.key()).await;
    assert_eq!(models.len(), 1);
    let model = &models[0];
    assert_eq!(model.name, "devstral:latest");
    assert_eq!(model.size, Some(14333927918));
    assert_eq!(model.details.parameter_size.as_deref(), Some("23.6B"));
    assert_eq!(model.details.quantization_level.as_deref(), Some("Q4_K_M"));
    assert_eq!(model.details.family.as_deref(), Some("llama"));
    assert_eq!(model.details.format.as_deref(), Some("gguf"));

    scheduler.stop().await;
}

#[tokio::test]
async fn test_start_succeeds_with_unroutable_fleet() {
    let repository = repository_with(&endpoint_config("http://127.0.0.1:1", PlatformKind::Ollama));
    let scheduler = Arc::new(HealthScheduler::new(Arc::clone(&repository)));

    // Nothing is reachable, but startup still succeeds; the proxy may
    // answer 503 until something becomes routable.
    Arc::clone(&scheduler).start().await.unwrap();
    assert!(repository.get_routable().is_empty());
    assert_eq!(
        sole_endpoint(&repository).status,
        EndpointStatus::Offline
    );

    scheduler.stop().await;
}

#[tokio::test]
async fn test_reload_preserves_health_for_unchanged_entry() {
    let server = mock_ollama_backend().await;
    let config = endpoint_config(&server.uri(), PlatformKind::Ollama);
    let repository = repository_with(&config);

    let scheduler = Arc::new(HealthScheduler::new(Arc::clone(&repository)));
    Arc::clone(&scheduler).start().await.unwrap();

    let probed = sole_endpoint(&repository);
    assert_eq!(probed.status, EndpointStatus::Healthy);
    let latency = probed.last_latency;
    assert!(latency.is_some());

    // Reload with the identical declaration
    let result = repository.load_from_config(std::slice::from_ref(&config));
    assert!(!result.changed());

    let after = sole_endpoint(&repository);
    assert_eq!(after.status, EndpointStatus::Healthy);
    assert_eq!(after.last_latency, latency);

    scheduler.stop().await;
}

#[tokio::test]
async fn test_reload_resets_health_on_interval_change() {
    let server = mock_ollama_backend().await;
    let config = endpoint_config(&server.uri(), PlatformKind::Ollama);
    let repository = repository_with(&config);

    let scheduler = Arc::new(HealthScheduler::new(Arc::clone(&repository)));
    Arc::clone(&scheduler).start().await.unwrap();
    assert_eq!(sole_endpoint(&repository).status, EndpointStatus::Healthy);

    let mut changed = config.clone();
    changed.check_interval = Duration::from_secs(10);
    let result = repository.load_from_config(std::slice::from_ref(&changed));

    assert_eq!(result.modified.len(), 1);
    assert_eq!(result.modified[0].changes[0].field, "check_interval");
    assert_eq!(result.modified[0].changes[0].old, "5s");
    assert_eq!(result.modified[0].changes[0].new, "10s");

    let after = sole_endpoint(&repository);
    assert_eq!(after.status, EndpointStatus::Unknown);
    assert_eq!(after.consecutive_failures, 0);
    assert_eq!(after.backoff_multiplier, 1);

    scheduler.stop().await;
}

#[tokio::test]
async fn test_recovered_endpoint_triggers_immediate_discovery() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "models": [{"name": "llama3:70b"}]
        })))
        .mount(&server)
        .await;

    let mut config = endpoint_config(&server.uri(), PlatformKind::Ollama);
    config.check_interval = Duration::from_secs(1);
    config.check_timeout = Duration::from_millis(500);
    let repository = repository_with(&config);

    let registry = Arc::new(InMemoryModelRegistry::new());
    let orchestrator = wire_orchestrator(&repository, registry.clone());

    let scheduler = Arc::new(HealthScheduler::new(Arc::clone(&repository)));
    scheduler.set_recovery_hook(Arc::clone(&orchestrator).recovery_hook());
    Arc::clone(&scheduler).start().await.unwrap();

    // Initial pass: probe failed, nothing registered
    let endpoint = sole_endpoint(&repository);
    assert_eq!(endpoint.status, EndpointStatus::Unhealthy);
    assert!(registry.models_for(endpoint.key()).await.is_empty());

    // Backend recovers; the next scheduled probe flips it healthy and the
    // recovery hook discovers models without waiting for the periodic sweep.
    server.reset().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "models": [{"name": "llama3:70b"}]
        })))
        .mount(&server)
        .await;

    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        if !registry.models_for(endpoint.key()).await.is_empty() {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "recovery discovery did not happen in time"
        );
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    assert_eq!(
        sole_endpoint(&repository).status,
        EndpointStatus::Healthy
    );

    scheduler.stop().await;
}

#[tokio::test]
async fn test_busy_backend_stays_routable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let repository = repository_with(&endpoint_config(&server.uri(), PlatformKind::Ollama));
    let scheduler = Arc::new(HealthScheduler::new(Arc::clone(&repository)));
    Arc::clone(&scheduler).start().await.unwrap();

    let endpoint = sole_endpoint(&repository);
    assert_eq!(endpoint.status, EndpointStatus::Busy);
    assert_eq!(repository.get_routable().len(), 1);
    // Busy is routable but not part of the discovery fan-out set
    assert!(repository.get_healthy().is_empty());

    scheduler.stop().await;
}
