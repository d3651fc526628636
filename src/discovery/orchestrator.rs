//! Fleet-wide discovery orchestration.
//!
//! A single background task sweeps the healthy fleet on a fixed interval,
//! fanning out per-endpoint discovery under a bounded worker pool.
//! Discovery failures are tracked per endpoint, independently of the health
//! state machine: an endpoint can be disabled for discovery while remaining
//! routable for inference.

use super::client::DiscoveryClient;
use super::error::DiscoveryError;
use super::filter::ModelFilter;
use super::metrics::DiscoveryMetrics;
use crate::config::{DiscoveryConfig, FilterConfig};
use crate::health::RecoveryHook;
use crate::registry::{ModelInfo, ModelRegistry, RegistryError};
use crate::repository::{Endpoint, EndpointRepository};
use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::{stream, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Consecutive recoverable failures before an endpoint is disabled for
/// discovery. Non-recoverable failures disable immediately.
pub const MAX_CONSECUTIVE_FAILURES: u32 = 5;

/// Errors from orchestrator lifecycle and registry publication.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("discovery orchestrator already running")]
    AlreadyRunning,

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Periodic model-discovery driver for the fleet.
pub struct DiscoveryOrchestrator {
    repository: Arc<EndpointRepository>,
    registry: Arc<dyn ModelRegistry>,
    client: Arc<DiscoveryClient>,
    config: DiscoveryConfig,
    /// Consecutive discovery failures per endpoint URL
    failures: DashMap<String, u32>,
    /// Filter overrides, resolved name first, then URL
    name_filters: DashMap<String, ModelFilter>,
    url_filters: DashMap<String, ModelFilter>,
    running: AtomicBool,
    cancel: Mutex<Option<CancellationToken>>,
    handle: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl DiscoveryOrchestrator {
    pub fn new(
        repository: Arc<EndpointRepository>,
        registry: Arc<dyn ModelRegistry>,
        client: Arc<DiscoveryClient>,
        config: DiscoveryConfig,
    ) -> Self {
        Self {
            repository,
            registry,
            client,
            config,
            failures: DashMap::new(),
            name_filters: DashMap::new(),
            url_filters: DashMap::new(),
            running: AtomicBool::new(false),
            cancel: Mutex::new(None),
            handle: tokio::sync::Mutex::new(None),
        }
    }

    /// Start the periodic discovery loop.
    ///
    /// The first sweep fires immediately, then every `config.interval`.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyRunning` if the orchestrator is already started.
    pub async fn start(self: Arc<Self>) -> Result<(), OrchestratorError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(OrchestratorError::AlreadyRunning);
        }

        if !self.config.enabled {
            tracing::info!("Model discovery disabled by config");
            self.running.store(false, Ordering::SeqCst);
            return Ok(());
        }

        let token = CancellationToken::new();
        *self
            .cancel
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(token.clone());

        let this = Arc::clone(&self);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(this.config.interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            tracing::info!(
                interval = ?this.config.interval,
                workers = this.config.concurrent_workers,
                "Discovery orchestrator started"
            );

            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        tracing::info!("Discovery orchestrator shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        if let Err(error) = this.discover_fleet(Some(&token)).await {
                            tracing::error!(error = %error, "Discovery sweep failed");
                        }
                    }
                }
            }
        });

        *self.handle.lock().await = Some(handle);
        Ok(())
    }

    /// Stop the discovery loop. Idempotent; a second call is a no-op.
    ///
    /// Waits for the ticker task to exit. In-flight per-endpoint tasks
    /// observe the cancellation signal and unwind on their own.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }

        if let Some(token) = self
            .cancel
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
        {
            token.cancel();
        }

        if let Some(handle) = self.handle.lock().await.take() {
            if let Err(error) = handle.await {
                if !error.is_cancelled() {
                    tracing::error!(error = %error, "Discovery loop task failed");
                }
            }
        }
    }

    /// On-demand sweep of every healthy, discovery-enabled endpoint.
    pub async fn discover_all(&self) -> Result<(), OrchestratorError> {
        self.discover_fleet(None).await
    }

    async fn discover_fleet(
        &self,
        cancel: Option<&CancellationToken>,
    ) -> Result<(), OrchestratorError> {
        let candidates: Vec<Endpoint> = self
            .repository
            .get_healthy()
            .into_iter()
            .filter(|e| !self.is_disabled(e.key()))
            .collect();

        if candidates.is_empty() {
            tracing::debug!("No healthy endpoints eligible for discovery");
            return Ok(());
        }

        // Bounded fan-out: at most `concurrent_workers` endpoints in flight.
        // A registry refusal fails the sweep; dropping the stream cancels
        // the outstanding work.
        let mut results = stream::iter(candidates.into_iter().map(|endpoint| async move {
            match cancel {
                Some(token) => tokio::select! {
                    _ = token.cancelled() => Ok(()),
                    result = self.discover_endpoint(&endpoint) => result,
                },
                None => self.discover_endpoint(&endpoint).await,
            }
        }))
        .buffer_unordered(self.config.concurrent_workers.max(1));

        while let Some(result) = results.next().await {
            result?;
        }

        Ok(())
    }

    /// Discover one endpoint and publish the filtered result.
    ///
    /// Bounded by the configured discovery timeout. Discovery failures are
    /// absorbed into the per-endpoint failure counter; only registry errors
    /// surface to the caller. Explicit calls ignore the disabled flag, so a
    /// recovered endpoint can re-enable itself by succeeding here.
    pub async fn discover_endpoint(&self, endpoint: &Endpoint) -> Result<(), OrchestratorError> {
        match tokio::time::timeout(self.config.timeout, self.attempt_discovery(endpoint)).await {
            Ok(Ok(models)) => {
                self.failures.remove(endpoint.key());

                let kept = self.resolve_filter(endpoint).apply(models);
                self.registry.register_models(endpoint.key(), kept).await?;
                Ok(())
            }
            Ok(Err(error)) => {
                self.note_failure(endpoint, error.is_recoverable(), error.user_message());
                Ok(())
            }
            Err(_elapsed) => {
                self.note_failure(endpoint, true, "connection timeout");
                Ok(())
            }
        }
    }

    /// Call the client, retrying recoverable failures.
    async fn attempt_discovery(&self, endpoint: &Endpoint) -> Result<Vec<ModelInfo>, DiscoveryError> {
        let attempts = self.config.retry_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.client.discover(endpoint).await {
                Ok(models) => return Ok(models),
                Err(error) if error.is_recoverable() && attempt < attempts => {
                    tracing::debug!(
                        endpoint = %endpoint.key(),
                        attempt,
                        error = %error,
                        "Discovery attempt failed, retrying"
                    );
                    tokio::time::sleep(self.config.retry_backoff).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }

    fn note_failure(&self, endpoint: &Endpoint, recoverable: bool, reason: &str) {
        let (previous, count) = {
            let mut entry = self.failures.entry(endpoint.key().to_string()).or_insert(0);
            let previous = *entry;
            *entry = if recoverable {
                previous + 1
            } else {
                MAX_CONSECUTIVE_FAILURES
            };
            (previous, *entry)
        };

        metrics::counter!("manifold_discovery_endpoint_failures_total").increment(1);

        if previous < MAX_CONSECUTIVE_FAILURES && count >= MAX_CONSECUTIVE_FAILURES {
            tracing::warn!(
                endpoint = %endpoint.key(),
                reason,
                recoverable,
                "Endpoint disabled for discovery"
            );
        } else {
            tracing::debug!(
                endpoint = %endpoint.key(),
                reason,
                consecutive_failures = count,
                "Discovery failed"
            );
        }
    }

    /// Whether periodic discovery currently skips this endpoint.
    pub fn is_disabled(&self, endpoint_url: &str) -> bool {
        self.failures
            .get(endpoint_url)
            .map(|count| *count >= MAX_CONSECUTIVE_FAILURES)
            .unwrap_or(false)
    }

    /// Override the model filter for every endpoint with this name.
    pub fn set_filter_for_name(
        &self,
        name: &str,
        config: &FilterConfig,
    ) -> Result<(), globset::Error> {
        self.name_filters
            .insert(name.to_string(), ModelFilter::from_config(config)?);
        Ok(())
    }

    /// Override the model filter for the endpoint with this URL key.
    pub fn set_filter_for_url(
        &self,
        endpoint_url: &str,
        config: &FilterConfig,
    ) -> Result<(), globset::Error> {
        self.url_filters
            .insert(endpoint_url.to_string(), ModelFilter::from_config(config)?);
        Ok(())
    }

    /// Filter resolution order: name override, URL override, the endpoint's
    /// own declared filter, then pass-through.
    fn resolve_filter(&self, endpoint: &Endpoint) -> ModelFilter {
        if let Some(filter) = self.name_filters.get(&endpoint.name) {
            return filter.value().clone();
        }
        if let Some(filter) = self.url_filters.get(endpoint.key()) {
            return filter.value().clone();
        }
        if let Some(config) = &endpoint.model_filter {
            match ModelFilter::from_config(config) {
                Ok(filter) => return filter,
                Err(error) => {
                    tracing::warn!(
                        endpoint = %endpoint.key(),
                        error = %error,
                        "Invalid declared model filter, passing all models through"
                    );
                }
            }
        }
        ModelFilter::pass_through()
    }

    /// Discovery metrics including the current disabled-endpoint count.
    pub fn metrics(&self) -> DiscoveryMetrics {
        let mut snapshot = self.client.metrics();
        snapshot.disabled_endpoints = self
            .failures
            .iter()
            .filter(|entry| *entry.value() >= MAX_CONSECUTIVE_FAILURES)
            .count();
        snapshot
    }

    /// A recovery hook that re-discovers an endpoint as soon as the health
    /// scheduler reports it routable again.
    pub fn recovery_hook(self: Arc<Self>) -> Arc<dyn RecoveryHook> {
        Arc::new(RediscoverOnRecovery { orchestrator: self })
    }
}

struct RediscoverOnRecovery {
    orchestrator: Arc<DiscoveryOrchestrator>,
}

#[async_trait]
impl RecoveryHook for RediscoverOnRecovery {
    async fn on_recovered(
        &self,
        endpoint: &Endpoint,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.orchestrator
            .discover_endpoint(endpoint)
            .await
            .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)
    }
}
