//! Single-endpoint model discovery over HTTP.
//!
//! One shared HTTP client with a bounded connection pool serves the whole
//! fleet. Responses are read through a hard size cap so a hostile backend
//! cannot exhaust memory.

use super::error::{DiscoveryError, NetworkError, ParseError};
use super::metrics::{DiscoveryMetrics, MetricsRecorder};
use super::parser::parse_response;
use super::profile::{Profile, ProfileCache, DEFAULT_PROFILE_TTL};
use crate::config::endpoint::resolve_url;
use crate::registry::ModelInfo;
use crate::repository::Endpoint;
use futures_util::StreamExt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

/// Hard cap on discovery response bodies.
pub const MAX_RESPONSE_BYTES: usize = 10 * 1024 * 1024;

const USER_AGENT: &str = concat!("Manifold-Discovery/", env!("CARGO_PKG_VERSION"));

/// HTTP client for backend model listings.
///
/// Selects the platform profile for each endpoint (directly from its
/// declared type, or by probing in the fixed auto-detection order), parses
/// the response, and returns normalised [`ModelInfo`] records. Never
/// retries; retry policy belongs to the orchestrator.
pub struct DiscoveryClient {
    client: reqwest::Client,
    cache: ProfileCache,
    metrics: Arc<MetricsRecorder>,
}

impl DiscoveryClient {
    /// Create a client with the default bounded connection pool.
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(5)
            .pool_idle_timeout(Duration::from_secs(60))
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self::with_client(client)
    }

    /// Create a discovery client around a custom HTTP client (for testing).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            cache: ProfileCache::new(DEFAULT_PROFILE_TTL),
            metrics: Arc::new(MetricsRecorder::new()),
        }
    }

    /// Override the auto-detection cache TTL (for testing).
    pub fn with_profile_ttl(mut self, ttl: Duration) -> Self {
        self.cache = ProfileCache::new(ttl);
        self
    }

    /// Discover the models an endpoint currently advertises.
    pub async fn discover(&self, endpoint: &Endpoint) -> Result<Vec<ModelInfo>, DiscoveryError> {
        self.metrics.record_attempt();
        let started = Instant::now();

        let result = match Profile::from_kind(endpoint.kind) {
            Some(profile) => {
                self.fetch_models(endpoint, profile, &endpoint.model_url)
                    .await
            }
            None => self.discover_auto(endpoint).await,
        };

        match result {
            Ok(models) => {
                self.metrics.record_success(started.elapsed());
                tracing::debug!(
                    endpoint = %endpoint.key(),
                    models = models.len(),
                    "Model discovery succeeded"
                );
                Ok(models)
            }
            Err(error) => {
                self.metrics.record_failure(endpoint.key());
                Err(error)
            }
        }
    }

    /// One HTTP round-trip against the endpoint's health-check URL.
    pub async fn health_check(&self, endpoint: &Endpoint) -> Result<(), DiscoveryError> {
        let url = endpoint.health_check_url.as_str();
        let started = Instant::now();

        let response = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .header(reqwest::header::ACCEPT, "application/json")
            .timeout(endpoint.check_timeout)
            .send()
            .await
            .map_err(|e| {
                DiscoveryError::new("health_check", endpoint.key())
                    .with_source(NetworkError::from_reqwest(url, &e))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DiscoveryError::new("http_status", endpoint.key())
                .with_status(status.as_u16())
                .with_latency(started.elapsed()));
        }

        Ok(())
    }

    /// Value snapshot of the discovery counters.
    pub fn metrics(&self) -> DiscoveryMetrics {
        self.metrics.snapshot()
    }

    /// Auto-detect the endpoint's platform by probing profiles in order.
    ///
    /// HTTP and transport errors move on to the next profile; a parse error
    /// is terminal because the remaining profiles would misread the same
    /// backend. The winning profile is cached per endpoint URL.
    async fn discover_auto(&self, endpoint: &Endpoint) -> Result<Vec<ModelInfo>, DiscoveryError> {
        if let Some(profile) = self.cache.get(endpoint.key()) {
            match self.fetch_profile(endpoint, profile).await {
                Ok(models) => return Ok(models),
                Err(error) => {
                    tracing::debug!(
                        endpoint = %endpoint.key(),
                        profile = %profile,
                        error = %error,
                        "Cached profile failed, re-running detection"
                    );
                    self.cache.evict(endpoint.key());
                }
            }
        }

        let mut last_error = None;
        for profile in Profile::DETECTION_ORDER {
            match self.fetch_profile(endpoint, profile).await {
                Ok(models) => {
                    self.cache.insert(endpoint.key(), profile);
                    tracing::info!(
                        endpoint = %endpoint.key(),
                        profile = %profile,
                        "Auto-detected platform profile"
                    );
                    return Ok(models);
                }
                Err(error) if error.is_parse_error() => return Err(error),
                Err(error) => last_error = Some(error),
            }
        }

        let mut failure = DiscoveryError::new("auto_detect", endpoint.key());
        if let Some(last) = last_error {
            failure = failure.with_source(last);
        }
        Err(failure)
    }

    async fn fetch_profile(
        &self,
        endpoint: &Endpoint,
        profile: Profile,
    ) -> Result<Vec<ModelInfo>, DiscoveryError> {
        let url = resolve_url(&endpoint.url, profile.model_path()).map_err(|e| {
            DiscoveryError::new("request", endpoint.key())
                .with_profile(profile)
                .with_source(NetworkError {
                    url: endpoint.key().to_string(),
                    message: e.to_string(),
                    timed_out: false,
                })
        })?;
        self.fetch_models(endpoint, profile, &url).await
    }

    async fn fetch_models(
        &self,
        endpoint: &Endpoint,
        profile: Profile,
        url: &Url,
    ) -> Result<Vec<ModelInfo>, DiscoveryError> {
        let started = Instant::now();

        let response = self
            .client
            .get(url.as_str())
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| {
                DiscoveryError::new("request", endpoint.key())
                    .with_profile(profile)
                    .with_source(NetworkError::from_reqwest(url.as_str(), &e))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DiscoveryError::new("http_status", endpoint.key())
                .with_profile(profile)
                .with_status(status.as_u16())
                .with_latency(started.elapsed()));
        }

        let body = self.read_capped_body(endpoint, profile, response).await?;

        parse_response(profile, &body).map_err(|e| {
            DiscoveryError::new("parse", endpoint.key())
                .with_profile(profile)
                .with_latency(started.elapsed())
                .with_source(e)
        })
    }

    /// Drain the response body through the size cap. A body at exactly the
    /// cap is accepted; one byte over surfaces as a parse error.
    async fn read_capped_body(
        &self,
        endpoint: &Endpoint,
        profile: Profile,
        response: reqwest::Response,
    ) -> Result<Vec<u8>, DiscoveryError> {
        let mut body = Vec::new();
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| {
                DiscoveryError::new("request", endpoint.key())
                    .with_profile(profile)
                    .with_source(NetworkError::from_reqwest(endpoint.key(), &e))
            })?;

            if body.len() + chunk.len() > MAX_RESPONSE_BYTES {
                return Err(DiscoveryError::new("parse", endpoint.key())
                    .with_profile(profile)
                    .with_source(ParseError::new(
                        profile.as_str(),
                        &body,
                        format!("response body exceeds {} bytes", MAX_RESPONSE_BYTES),
                    )));
            }
            body.extend_from_slice(&chunk);
        }

        Ok(body)
    }
}

impl Default for DiscoveryClient {
    fn default() -> Self {
        Self::new()
    }
}
