//! Reconciliation logic for the Azure operator CRDs.
//!
//! - `etcd_disks`: ETCD member disks, certificates and bootstrap of the masters
//! - `masters`: master upgrade state machine of an `AzureConfig`
//! - `nodepool`: rolling replacement of an `AzureMachinePool`'s workers
//! - `vnet_peering`: peering between tenant and control plane networks
//!
//! Each state machine performs a single stage per pass. The stage is read
//! from and written back to the resource status by [`Reconciler::persist`].

pub mod deployment;
pub mod etcd_disks;
pub mod masters;
pub mod nodepool;
pub mod vnet_peering;

use crate::backoff::FibonacciBackoff;
use crate::clients::ClientFactory;
use crate::config::Config;
use crate::error::ControllerError;
use crate::management::ManagementClusterTrait;
use crate::metrics::Metrics;
use crate::state::{ResourceState, StatusStore, StatusTarget};
use crate::state_machine::{Stage, Transition};
use crate::templates::TemplateSource;
use chrono::Utc;
use kube::{Resource, ResourceExt};
use semver::Version;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tenant_client::{CertsSearcherTrait, DrainerClientTrait};
use tracing::{debug, info, warn};

/// Backoff state for a resource
#[derive(Debug, Clone)]
struct BackoffState {
    backoff: FibonacciBackoff,
    error_count: u32,
}

impl BackoffState {
    fn new() -> Self {
        Self {
            backoff: FibonacciBackoff::new(1, 10), // 1 minute min, 10 minutes max
            error_count: 0,
        }
    }

    fn increment_error(&mut self) {
        self.error_count += 1;
    }

    fn reset(&mut self) {
        self.error_count = 0;
        self.backoff.reset();
    }
}

/// Values the state machines need from the process configuration
#[derive(Debug, Clone)]
pub struct Settings {
    pub installation_name: String,
    pub operator_version: Version,
    pub wait_requeue: Duration,
    pub steady_requeue: Duration,
}

impl From<&Config> for Settings {
    fn from(config: &Config) -> Self {
        Self {
            installation_name: config.installation_name.clone(),
            operator_version: config.operator_version.clone(),
            wait_requeue: config.wait_requeue,
            steady_requeue: config.steady_requeue,
        }
    }
}

/// Collaborators of the reconciler, all behind traits
pub struct Clients {
    pub factory: Arc<dyn ClientFactory>,
    pub management: Arc<dyn ManagementClusterTrait>,
    pub drainer: Arc<dyn DrainerClientTrait>,
    pub certs: Arc<dyn CertsSearcherTrait>,
    pub status_store: Arc<dyn StatusStore>,
    pub templates: Arc<dyn TemplateSource>,
}

/// Reconciles `AzureConfig` and `AzureMachinePool` resources.
pub struct Reconciler {
    pub(crate) settings: Settings,
    pub(crate) clients: Arc<dyn ClientFactory>,
    pub(crate) management: Arc<dyn ManagementClusterTrait>,
    pub(crate) drainer: Arc<dyn DrainerClientTrait>,
    pub(crate) certs: Arc<dyn CertsSearcherTrait>,
    pub(crate) status_store: Arc<dyn StatusStore>,
    pub(crate) templates: Arc<dyn TemplateSource>,
    pub(crate) metrics: Arc<Metrics>,
    /// Error count tracking per resource (namespace/name -> BackoffState)
    backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
}

/// `namespace/name` key of a resource
pub fn resource_key<K: Resource>(obj: &K) -> String {
    format!("{}/{}", obj.namespace().unwrap_or_default(), obj.name_any())
}

impl Reconciler {
    pub fn new(settings: Settings, clients: Clients, metrics: Arc<Metrics>) -> Self {
        Self {
            settings,
            clients: clients.factory,
            management: clients.management,
            drainer: clients.drainer,
            certs: clients.certs,
            status_store: clients.status_store,
            templates: clients.templates,
            metrics,
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Operator version as stamped on tags and labels
    pub(crate) fn operator_version(&self) -> String {
        self.settings.operator_version.to_string()
    }

    /// Same-stage transition retried after the wait delay
    pub(crate) fn wait<S: Stage>(&self, stage: S) -> Transition<S> {
        Transition::wait(stage, self.settings.wait_requeue)
    }

    /// Validates `transition` and writes the resulting state
    ///
    /// Returns the delay until the next pass. A write that lost against a
    /// concurrent update leaves the stored stage untouched and retries later.
    pub(crate) async fn persist<S: Stage>(
        &self,
        handler: &str,
        target: &StatusTarget,
        state: &mut ResourceState,
        from: S,
        transition: Transition<S>,
    ) -> Result<Duration, ControllerError> {
        transition.validate(from)?;

        state.set_stage(transition.stage);
        if transition.is_wait() {
            state.touch(Utc::now());
        }

        match self.status_store.save(target, handler, state.values()).await {
            Ok(()) => {}
            Err(e) if e.is_conflict() => {
                debug!(
                    "Status of {}/{} changed concurrently, {} stays in {:?}: {}",
                    target.namespace, target.name, handler, from, e
                );
                return Ok(self.settings.wait_requeue);
            }
            Err(e) => return Err(e),
        }

        if transition.stage != from {
            info!(
                "{} of {}/{} moved from {:?} to {:?}",
                handler, target.namespace, target.name, from, transition.stage
            );
            self.metrics
                .record_transition(handler, from.as_str(), transition.stage.as_str());
        }

        Ok(transition.requeue())
    }

    /// Get backoff duration for a resource based on error count
    pub fn get_backoff_for_resource(&self, resource_key: &str) -> (u64, u32) {
        match self.backoff_states.lock() {
            Ok(mut states) => {
                let state = states
                    .entry(resource_key.to_string())
                    .or_insert_with(BackoffState::new);
                let backoff_seconds = state.backoff.next_backoff_seconds();
                (backoff_seconds, state.error_count)
            }
            Err(e) => {
                warn!("Failed to lock backoff_states: {}, using default backoff", e);
                (60, 0)
            }
        }
    }

    pub fn increment_error(&self, resource_key: &str) {
        if let Ok(mut states) = self.backoff_states.lock() {
            states
                .entry(resource_key.to_string())
                .or_insert_with(BackoffState::new)
                .increment_error();
        }
    }

    pub fn reset_error(&self, resource_key: &str) {
        if let Ok(mut states) = self.backoff_states.lock() {
            if let Some(state) = states.get_mut(resource_key) {
                state.reset();
            }
        }
    }
}
