//! Model registry module.
//!
//! The discovery orchestrator publishes each endpoint's model list here.
//! Registration policy (dedup, name unification) belongs to the registry
//! implementation; the core only requires the [`ModelRegistry`] contract.

mod error;
mod model;

pub use error::*;
pub use model::*;

use async_trait::async_trait;
use dashmap::DashMap;

/// Sink for discovered models, keyed by endpoint URL.
///
/// Object-safe so the orchestrator can hold `Arc<dyn ModelRegistry>` and the
/// embedding proxy can substitute its own unification layer.
#[async_trait]
pub trait ModelRegistry: Send + Sync + 'static {
    /// Replace the model list for an endpoint after a successful discovery.
    async fn register_models(
        &self,
        endpoint_url: &str,
        models: Vec<ModelInfo>,
    ) -> Result<(), RegistryError>;

    /// Drop every model registered for an endpoint (e.g. on config-remove).
    async fn remove_endpoint_models(&self, endpoint_url: &str) -> Result<(), RegistryError>;

    /// Current model list for an endpoint; empty if none registered.
    async fn models_for(&self, endpoint_url: &str) -> Vec<ModelInfo>;
}

/// In-memory [`ModelRegistry`] backed by lock-free concurrent maps.
///
/// Keeps a name index so consumers can ask which endpoints serve a model.
pub struct InMemoryModelRegistry {
    models: DashMap<String, Vec<ModelInfo>>,
    name_index: DashMap<String, Vec<String>>,
}

impl InMemoryModelRegistry {
    pub fn new() -> Self {
        Self {
            models: DashMap::new(),
            name_index: DashMap::new(),
        }
    }

    /// Number of unique model names across all endpoints.
    pub fn model_count(&self) -> usize {
        self.name_index.len()
    }

    /// Endpoint URLs currently advertising the given model name.
    pub fn endpoints_for_model(&self, name: &str) -> Vec<String> {
        self.name_index
            .get(name)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    fn unindex_endpoint(&self, endpoint_url: &str, models: &[ModelInfo]) {
        for model in models {
            if let Some(mut endpoints) = self.name_index.get_mut(&model.name) {
                endpoints.retain(|url| url != endpoint_url);
                if endpoints.is_empty() {
                    drop(endpoints); // Release the lock before removing
                    self.name_index.remove(&model.name);
                }
            }
        }
    }
}

impl Default for InMemoryModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelRegistry for InMemoryModelRegistry {
    async fn register_models(
        &self,
        endpoint_url: &str,
        models: Vec<ModelInfo>,
    ) -> Result<(), RegistryError> {
        if let Some(old) = self.models.get(endpoint_url) {
            let old = old.value().clone();
            self.unindex_endpoint(endpoint_url, &old);
        }

        for model in &models {
            let mut endpoints = self.name_index.entry(model.name.clone()).or_default();
            if !endpoints.contains(&endpoint_url.to_string()) {
                endpoints.push(endpoint_url.to_string());
            }
        }

        self.models.insert(endpoint_url.to_string(), models);
        Ok(())
    }

    async fn remove_endpoint_models(&self, endpoint_url: &str) -> Result<(), RegistryError> {
        let (_, old) = self
            .models
            .remove(endpoint_url)
            .ok_or_else(|| RegistryError::EndpointNotFound(endpoint_url.to_string()))?;

        self.unindex_endpoint(endpoint_url, &old);
        Ok(())
    }

    async fn models_for(&self, endpoint_url: &str) -> Vec<ModelInfo> {
        self.models
            .get(endpoint_url)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }
}
