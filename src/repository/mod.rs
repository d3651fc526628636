//! Endpoint repository module.
//!
//! The single source of truth for the declared set of backends and their
//! observable health state. Supports many concurrent snapshot readers and
//! serialised mutation; config reloads are reconciled atomically.

mod changes;
mod endpoint;
mod error;

pub use changes::*;
pub use endpoint::*;
pub use error::*;

use crate::config::EndpointConfig;
use std::collections::HashMap;
use std::sync::RwLock;

/// The endpoint repository stores every declared backend keyed by its
/// canonical base URL.
///
/// A single read-write lock protects the map. Readers copy matching records
/// under the read lock, so callers may freely sort and annotate their
/// snapshots. Reconciliation builds a complete replacement map and swaps it
/// in with one assignment, so observers see either the old fleet or the new
/// fleet, never a partial reload.
pub struct EndpointRepository {
    endpoints: RwLock<HashMap<String, Endpoint>>,
}

impl EndpointRepository {
    /// Create a new empty repository.
    pub fn new() -> Self {
        Self {
            endpoints: RwLock::new(HashMap::new()),
        }
    }

    /// Reconcile the declared configuration against the live fleet.
    ///
    /// For each entry that validates, a fresh endpoint record is built. If
    /// an endpoint with the same URL key already exists and its declaration
    /// is semantically unchanged (see [`field_changes`]), the live status,
    /// timestamps, backoff, and failure count carry forward; otherwise the
    /// record starts unprobed, because the probe semantics may have changed.
    ///
    /// Entries that fail validation are logged and skipped; one bad
    /// declaration does not abort the reload.
    pub fn load_from_config(&self, configs: &[EndpointConfig]) -> EndpointChangeResult {
        let mut guard = self
            .endpoints
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let old = std::mem::take(&mut *guard);
        let mut new: HashMap<String, Endpoint> = HashMap::with_capacity(configs.len());
        let mut result = EndpointChangeResult {
            old_count: old.len(),
            ..Default::default()
        };

        for config in configs {
            let mut endpoint = match Endpoint::from_config(config) {
                Ok(endpoint) => endpoint,
                Err(error) => {
                    tracing::warn!(
                        endpoint = %config.display_name(),
                        error = %error,
                        "Skipping invalid endpoint declaration"
                    );
                    continue;
                }
            };

            let key = endpoint.key().to_string();
            if new.contains_key(&key) {
                tracing::warn!(endpoint = %key, "Duplicate endpoint URL in config, keeping first");
                continue;
            }

            match old.get(&key) {
                Some(existing) => {
                    let changes = field_changes(existing, &endpoint);
                    if changes.is_empty() {
                        endpoint.carry_state_from(existing);
                    } else {
                        result.modified.push(ModifiedEndpoint {
                            url: key.clone(),
                            changes,
                        });
                    }
                }
                None => result.added.push(key.clone()),
            }

            new.insert(key, endpoint);
        }

        for key in old.keys() {
            if !new.contains_key(key) {
                result.removed.push(key.clone());
            }
        }
        result.added.sort();
        result.removed.sort();
        result.modified.sort_by(|a, b| a.url.cmp(&b.url));
        result.new_count = new.len();

        *guard = new;
        result
    }

    /// Snapshot every endpoint.
    pub fn get_all(&self) -> Vec<Endpoint> {
        self.read_filtered(|_| true)
    }

    /// Snapshot endpoints with status healthy. This is the stricter subset
    /// the discovery pipeline fans out over.
    pub fn get_healthy(&self) -> Vec<Endpoint> {
        self.read_filtered(|e| e.status == EndpointStatus::Healthy)
    }

    /// Snapshot endpoints the proxy may route to (healthy, busy, warming).
    pub fn get_routable(&self) -> Vec<Endpoint> {
        self.read_filtered(|e| e.is_routable())
    }

    /// Snapshot routable endpoints, degrading to the full fleet when none
    /// are routable.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NoEndpoints` when the repository is empty.
    pub fn get_routable_with_fallback(&self) -> Result<Vec<Endpoint>, RepositoryError> {
        let guard = self
            .endpoints
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if guard.is_empty() {
            return Err(RepositoryError::NoEndpoints);
        }

        let routable: Vec<Endpoint> = guard.values().filter(|e| e.is_routable()).cloned().collect();
        if routable.is_empty() {
            tracing::warn!(
                endpoints = guard.len(),
                "No routable endpoints, falling back to full fleet"
            );
            return Ok(guard.values().cloned().collect());
        }

        Ok(routable)
    }

    /// Merge the mutable runtime state of `endpoint` into the stored record.
    ///
    /// Declared fields (URLs, timing, priority) are owned by reconciliation
    /// and are not touched here.
    pub fn update_endpoint(&self, endpoint: &Endpoint) -> Result<(), RepositoryError> {
        let mut guard = self
            .endpoints
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let stored = guard
            .get_mut(endpoint.key())
            .ok_or_else(|| RepositoryError::EndpointNotFound(endpoint.key().to_string()))?;

        stored.carry_state_from(endpoint);
        Ok(())
    }

    /// Set the status of the endpoint with the given URL key, stamping the
    /// last-checked timestamp.
    pub fn update_status(&self, url: &str, status: EndpointStatus) -> Result<(), RepositoryError> {
        let mut guard = self
            .endpoints
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let stored = guard
            .get_mut(url)
            .ok_or_else(|| RepositoryError::EndpointNotFound(url.to_string()))?;

        stored.status = status;
        stored.last_checked = Some(chrono::Utc::now());
        Ok(())
    }

    /// Whether an endpoint with the given URL key exists.
    pub fn exists(&self, url: &str) -> bool {
        self.endpoints
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains_key(url)
    }

    /// Number of declared endpoints.
    pub fn len(&self) -> usize {
        self.endpoints
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read_filtered(&self, predicate: impl Fn(&Endpoint) -> bool) -> Vec<Endpoint> {
        self.endpoints
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .values()
            .filter(|e| predicate(e))
            .cloned()
            .collect()
    }
}

impl Default for EndpointRepository {
    fn default() -> Self {
        Self::new()
    }
}
