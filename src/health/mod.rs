//! Health scheduling module.
//!
//! Drives the endpoint state machine: every endpoint is probed at its own
//! cadence, failures back off exponentially, and an endpoint returning to a
//! routable state fires the recovery hook so discovery can refresh its
//! models immediately.

mod error;
mod probe;
mod state;

#[cfg(test)]
mod tests;

pub use error::*;
pub use probe::*;
pub use state::*;

use crate::repository::{Endpoint, EndpointRepository};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Scheduler tick granularity. At or below the minimum permitted probe
/// interval, so no endpoint's due time is missed by more than one tick.
const TICK_GRANULARITY: Duration = Duration::from_secs(1);

/// Default bound on the initial synchronous probe pass.
const STARTUP_PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// How long the background waiter polls for a routable fleet after a fully
/// unroutable initial pass.
const READY_WAIT: Duration = Duration::from_secs(30);

/// Callback fired when an endpoint transitions from non-routable to
/// routable. The discovery orchestrator registers one to trigger an
/// immediate model refresh; the scheduler never names the orchestrator.
#[async_trait]
pub trait RecoveryHook: Send + Sync {
    async fn on_recovered(
        &self,
        endpoint: &Endpoint,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Background service that probes every endpoint at its own cadence.
pub struct HealthScheduler {
    repository: Arc<EndpointRepository>,
    probe: HealthProbe,
    hook: Mutex<Option<Arc<dyn RecoveryHook>>>,
    /// Endpoints with a probe currently in flight, to avoid double-probing
    /// when a probe outlasts a tick
    in_flight: DashMap<String, ()>,
    running: AtomicBool,
    cancel: Mutex<Option<CancellationToken>>,
    handle: tokio::sync::Mutex<Option<JoinHandle<()>>>,
    startup_timeout: Duration,
}

impl HealthScheduler {
    pub fn new(repository: Arc<EndpointRepository>) -> Self {
        Self::with_probe(repository, HealthProbe::new())
    }

    /// Create a scheduler with a custom probe client (for testing).
    pub fn with_client(repository: Arc<EndpointRepository>, client: reqwest::Client) -> Self {
        Self::with_probe(repository, HealthProbe::with_client(client))
    }

    pub fn with_probe(repository: Arc<EndpointRepository>, probe: HealthProbe) -> Self {
        Self {
            repository,
            probe,
            hook: Mutex::new(None),
            in_flight: DashMap::new(),
            running: AtomicBool::new(false),
            cancel: Mutex::new(None),
            handle: tokio::sync::Mutex::new(None),
            startup_timeout: STARTUP_PROBE_TIMEOUT,
        }
    }

    /// Override the initial probe pass bound (for testing).
    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    /// Register the recovery hook. Replaces any previous hook.
    pub fn set_recovery_hook(&self, hook: Arc<dyn RecoveryHook>) {
        *self
            .hook
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(hook);
    }

    /// Start the scheduler.
    ///
    /// Performs one synchronous concurrent probe of every endpoint under
    /// the startup bound, so callers do not accept traffic before the fleet
    /// has been classified at least once. If nothing is routable after the
    /// initial pass, start still succeeds; a background waiter keeps
    /// polling and logs when the fleet first becomes routable.
    ///
    /// # Errors
    ///
    /// Fails when no endpoints are configured or the scheduler is already
    /// running.
    pub async fn start(self: Arc<Self>) -> Result<(), SchedulerError> {
        if self.repository.is_empty() {
            return Err(SchedulerError::NoEndpoints);
        }
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SchedulerError::AlreadyRunning);
        }

        let endpoints = self.repository.get_all();
        let initial_pass = futures::future::join_all(
            endpoints
                .into_iter()
                .map(|endpoint| self.probe_and_apply(endpoint)),
        );
        if tokio::time::timeout(self.startup_timeout, initial_pass)
            .await
            .is_err()
        {
            tracing::warn!(
                timeout = ?self.startup_timeout,
                "Initial probe pass timed out before every endpoint was classified"
            );
            self.in_flight.clear();
        }

        let token = CancellationToken::new();
        *self
            .cancel
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(token.clone());

        if self.repository.get_routable().is_empty() {
            tracing::warn!("No routable endpoints after initial probe pass");
            tokio::spawn(Arc::clone(&self).wait_for_routable(token.clone()));
        }

        let this = Arc::clone(&self);
        let loop_token = token.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(TICK_GRANULARITY);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            tracing::info!("Health scheduler started");

            loop {
                tokio::select! {
                    _ = loop_token.cancelled() => {
                        tracing::info!("Health scheduler shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        Self::spawn_due_probes(&this);
                    }
                }
            }
        });

        *self.handle.lock().await = Some(handle);
        Ok(())
    }

    /// Stop the scheduler. Idempotent; a second call is a no-op.
    ///
    /// Waits for the ticker to exit but does not join in-flight probes;
    /// they unwind under their own timeouts.
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
                    tracing::error!(error = %error, "Health scheduler task failed");
                }
            }
        }
    }

    /// Spawn a detached probe task for every endpoint whose due time has
    /// elapsed. One task per endpoint per round.
    fn spawn_due_probes(this: &Arc<Self>) {
        let now = Utc::now();
        for endpoint in this.repository.get_all() {
            if endpoint.next_check_due > now {
                continue;
            }
            if this
                .in_flight
                .insert(endpoint.key().to_string(), ())
                .is_some()
            {
                continue;
            }

            let worker = Arc::clone(this);
            tokio::spawn(async move {
                worker.probe_and_apply(endpoint).await;
            });
        }
    }

    /// Probe one endpoint and commit the resulting state transition.
    ///
    /// The recovery hook fires after the status is committed, so downstream
    /// discovery observes the endpoint as routable. Hook errors are logged
    /// and never revert the transition.
    async fn probe_and_apply(&self, endpoint: Endpoint) {
        let outcome = self.probe.probe(&endpoint).await;

        let mut updated = endpoint;
        let transition = apply_outcome(&mut updated, &outcome, Utc::now());

        let committed = self.repository.update_endpoint(&updated);
        self.in_flight.remove(updated.key());
        if committed.is_err() {
            // Endpoint was removed by a config reload mid-probe
            tracing::debug!(endpoint = %updated.key(), "Dropping probe result for removed endpoint");
            return;
        }

        if transition.changed() {
            tracing::info!(
                endpoint = %updated.key(),
                old_status = %transition.from,
                new_status = %transition.to,
                "Endpoint status changed"
            );
        }

        if transition.recovered() {
            let hook = self
                .hook
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .clone();
            if let Some(hook) = hook {
                if let Err(error) = hook.on_recovered(&updated).await {
                    tracing::warn!(
                        endpoint = %updated.key(),
                        error = %error,
                        "Recovery hook failed"
                    );
                }
            }
        }
    }

    async fn wait_for_routable(self: Arc<Self>, token: CancellationToken) {
        let deadline = Instant::now() + READY_WAIT;
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = interval.tick() => {
                    if !self.repository.get_routable().is_empty() {
                        tracing::info!("Fleet became routable");
                        return;
                    }
                    if Instant::now() >= deadline {
                        tracing::warn!(
                            waited = ?READY_WAIT,
                            "Fleet still has no routable endpoints; traffic may be refused"
                        );
                        return;
                    }
                }
            }
        }
    }
}
