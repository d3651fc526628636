//! Unit tests for the health module.

use super::*;
use crate::config::{EndpointConfig, PlatformKind};
use crate::repository::{Endpoint, EndpointRepository, EndpointStatus};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(url: &str) -> EndpointConfig {
    EndpointConfig {
        name: "test".to_string(),
        url: url.to_string(),
        kind: PlatformKind::Ollama,
        priority: 100,
        health_check_url: None,
        model_url: None,
        check_interval: Duration::from_secs(5),
        check_timeout: Duration::from_secs(2),
        model_filter: None,
    }
}

fn repository_with(url: &str) -> Arc<EndpointRepository> {
    let repository = Arc::new(EndpointRepository::new());
    repository.load_from_config(&[config(url)]);
    repository
}

struct CountingHook {
    calls: AtomicU32,
}

#[async_trait]
impl RecoveryHook for CountingHook {
    async fn on_recovered(
        &self,
        _endpoint: &Endpoint,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct FailingHook;

#[async_trait]
impl RecoveryHook for FailingHook {
    async fn on_recovered(
        &self,
        _endpoint: &Endpoint,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Err("refresh failed".into())
    }
}

async fn mock_health(status: u16) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(status))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_probe_decodes_success() {
    let server = mock_health(200).await;
    let repository = repository_with(&server.uri());
    let endpoint = repository.get_all().pop().unwrap();

    let outcome = HealthProbe::new().probe(&endpoint).await;
    assert!(matches!(
        outcome,
        ProbeOutcome::Responsive {
            status: EndpointStatus::Healthy,
            ..
        }
    ));
}

#[tokio::test]
async fn test_probe_decodes_load_hints() {
    for (code, expected) in [(429, EndpointStatus::Busy), (503, EndpointStatus::Warming)] {
        let server = mock_health(code).await;
        let repository = repository_with(&server.uri());
        let endpoint = repository.get_all().pop().unwrap();

        let outcome = HealthProbe::new().probe(&endpoint).await;
        match outcome {
            ProbeOutcome::Responsive { status, .. } => assert_eq!(status, expected),
            other => panic!("HTTP {code} should be a responsive hint, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_probe_decodes_http_failure() {
    let server = mock_health(500).await;
    let repository = repository_with(&server.uri());
    let endpoint = repository.get_all().pop().unwrap();

    let outcome = HealthProbe::new().probe(&endpoint).await;
    assert!(matches!(
        outcome,
        ProbeOutcome::HttpError {
            status_code: 500,
            ..
        }
    ));
}

#[tokio::test]
async fn test_probe_unreachable() {
    // Port 1 on localhost refuses connections
    let repository = repository_with("http://127.0.0.1:1");
    let endpoint = repository.get_all().pop().unwrap();

    let outcome = HealthProbe::new().probe(&endpoint).await;
    assert!(matches!(outcome, ProbeOutcome::Unreachable { .. }));
}

#[tokio::test]
async fn test_start_requires_endpoints() {
    let repository = Arc::new(EndpointRepository::new());
    let scheduler = Arc::new(HealthScheduler::new(repository));

    assert!(matches!(
        Arc::clone(&scheduler).start().await,
        Err(SchedulerError::NoEndpoints)
    ));
}

#[tokio::test]
async fn test_start_twice_is_an_error() {
    let server = mock_health(200).await;
    let repository = repository_with(&server.uri());
    let scheduler = Arc::new(HealthScheduler::new(repository));

    Arc::clone(&scheduler).start().await.unwrap();
    assert!(matches!(
        Arc::clone(&scheduler).start().await,
        Err(SchedulerError::AlreadyRunning)
    ));
    scheduler.stop().await;
}

#[tokio::test]
async fn test_initial_pass_classifies_fleet() {
    let server = mock_health(200).await;
    let repository = repository_with(&server.uri());
    let scheduler = Arc::new(HealthScheduler::new(Arc::clone(&repository)));

    Arc::clone(&scheduler).start().await.unwrap();

    let endpoint = repository.get_all().pop().unwrap();
    assert_eq!(endpoint.status, EndpointStatus::Healthy);
    assert!(endpoint.last_checked.is_some());
    assert!(endpoint.last_latency.is_some());

    scheduler.stop().await;
}

#[tokio::test]
async fn test_initial_pass_marks_unreachable_offline() {
    let repository = repository_with("http://127.0.0.1:1");
    let scheduler = Arc::new(HealthScheduler::new(Arc::clone(&repository)));

    Arc::clone(&scheduler).start().await.unwrap();

    let endpoint = repository.get_all().pop().unwrap();
    assert_eq!(endpoint.status, EndpointStatus::Offline);
    assert_eq!(endpoint.consecutive_failures, 1);
    assert_eq!(endpoint.backoff_multiplier, 2);

    scheduler.stop().await;
}

#[tokio::test]
async fn test_recovery_hook_fires_on_first_classification() {
    let server = mock_health(200).await;
    let repository = repository_with(&server.uri());
    let scheduler = Arc::new(HealthScheduler::new(Arc::clone(&repository)));

    let hook = Arc::new(CountingHook {
        calls: AtomicU32::new(0),
    });
    scheduler.set_recovery_hook(hook.clone());

    Arc::clone(&scheduler).start().await.unwrap();

    // Unknown -> healthy is a non-routable -> routable edge
    assert_eq!(hook.calls.load(Ordering::SeqCst), 1);
    scheduler.stop().await;
}

#[tokio::test]
async fn test_recovery_hook_does_not_fire_while_routable() {
    let server = mock_health(200).await;
    let repository = repository_with(&server.uri());
    let scheduler = Arc::new(HealthScheduler::new(Arc::clone(&repository)));

    let hook = Arc::new(CountingHook {
        calls: AtomicU32::new(0),
    });
    scheduler.set_recovery_hook(hook.clone());
    Arc::clone(&scheduler).start().await.unwrap();
    assert_eq!(hook.calls.load(Ordering::SeqCst), 1);

    // Probe again while healthy: no new recovery edge
    let endpoint = repository.get_all().pop().unwrap();
    scheduler.probe_and_apply(endpoint).await;
    assert_eq!(hook.calls.load(Ordering::SeqCst), 1);

    scheduler.stop().await;
}

#[tokio::test]
async fn test_recovery_hook_failure_does_not_revert_status() {
    let server = mock_health(200).await;
    let repository = repository_with(&server.uri());
    let scheduler = Arc::new(HealthScheduler::new(Arc::clone(&repository)));
    scheduler.set_recovery_hook(Arc::new(FailingHook));

    Arc::clone(&scheduler).start().await.unwrap();

    let endpoint = repository.get_all().pop().unwrap();
    assert_eq!(endpoint.status, EndpointStatus::Healthy);

    scheduler.stop().await;
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    let server = mock_health(200).await;
    let repository = repository_with(&server.uri());
    let scheduler = Arc::new(HealthScheduler::new(repository));

    Arc::clone(&scheduler).start().await.unwrap();
    scheduler.stop().await;
    scheduler.stop().await;

    // A stopped scheduler can be started again
    Arc::clone(&scheduler).start().await.unwrap();
    scheduler.stop().await;
}

#[tokio::test]
async fn test_probe_respects_endpoint_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
        .mount(&server)
        .await;

    let repository = Arc::new(EndpointRepository::new());
    let mut cfg = config(&server.uri());
    cfg.check_interval = Duration::from_secs(2);
    cfg.check_timeout = Duration::from_secs(1);
    repository.load_from_config(&[cfg]);
    let endpoint = repository.get_all().pop().unwrap();

    let started = std::time::Instant::now();
    let outcome = HealthProbe::new().probe(&endpoint).await;
    assert!(matches!(outcome, ProbeOutcome::Unreachable { .. }));
    assert!(started.elapsed() < Duration::from_secs(5));
}
