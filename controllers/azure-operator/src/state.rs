//! Persisted per-handler state in the custom resource status.
//!
//! Every handler owns one string map under `status.resources.<handler>`
//! holding its stage, the checksums of the last submitted ARM deployment and
//! the time it last waited.

use crate::error::ControllerError;
use crate::state_machine::Stage;
use chrono::{DateTime, SecondsFormat, Utc};
use crds::{
    AzureConfig, AzureMachinePool, ResourceStatuses, PARAMETERS_CHECKSUM_KEY, STAGE_KEY,
    TEMPLATE_CHECKSUM_KEY, TOUCH_KEY,
};
use kube::api::{Patch, PatchParams};
use kube::{Api, Client, ResourceExt};
use serde_json::json;
use std::collections::BTreeMap;
use tracing::debug;

/// Kind of a resource whose status holds handler state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// `AzureConfig`
    AzureConfig,
    /// `AzureMachinePool`
    AzureMachinePool,
}

/// The object a status write applies to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusTarget {
    /// Resource kind
    pub kind: ResourceKind,
    /// Namespace
    pub namespace: String,
    /// Name
    pub name: String,
    /// Version the state was read at, guards against lost updates
    pub resource_version: Option<String>,
}

impl StatusTarget {
    /// Target for an `AzureConfig`
    #[must_use]
    pub fn azure_config(cr: &AzureConfig) -> Self {
        Self {
            kind: ResourceKind::AzureConfig,
            namespace: cr.namespace().unwrap_or_default(),
            name: cr.name_any(),
            resource_version: cr.resource_version(),
        }
    }

    /// Target for an `AzureMachinePool`
    #[must_use]
    pub fn azure_machine_pool(pool: &AzureMachinePool) -> Self {
        Self {
            kind: ResourceKind::AzureMachinePool,
            namespace: pool.namespace().unwrap_or_default(),
            name: pool.name_any(),
            resource_version: pool.resource_version(),
        }
    }
}

/// Writes handler state to the status subresource
#[async_trait::async_trait]
pub trait StatusStore: Send + Sync {
    /// Replace the map of `handler` with `values`
    ///
    /// Fails with a conflict when the object changed since `target` was read.
    async fn save(
        &self,
        target: &StatusTarget,
        handler: &str,
        values: &BTreeMap<String, String>,
    ) -> Result<(), ControllerError>;
}

/// [`StatusStore`] backed by merge patches on the status subresource
#[derive(Clone)]
pub struct KubeStatusStore {
    client: Client,
}

impl std::fmt::Debug for KubeStatusStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStatusStore").finish_non_exhaustive()
    }
}

impl KubeStatusStore {
    /// Create a store writing through `client`
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

/// Merge patch replacing one handler map, pinned to a resource version
pub(crate) fn status_patch(
    resource_version: Option<&str>,
    handler: &str,
    values: &BTreeMap<String, String>,
) -> serde_json::Value {
    let mut patch = json!({
        "status": {
            "resources": {
                handler: values,
            }
        }
    });
    if let Some(version) = resource_version {
        patch["metadata"] = json!({ "resourceVersion": version });
    }
    patch
}

#[async_trait::async_trait]
impl StatusStore for KubeStatusStore {
    async fn save(
        &self,
        target: &StatusTarget,
        handler: &str,
        values: &BTreeMap<String, String>,
    ) -> Result<(), ControllerError> {
        let patch = status_patch(target.resource_version.as_deref(), handler, values);
        let params = PatchParams::default();

        debug!(
            "Saving {} state of {:?} {}/{}",
            handler, target.kind, target.namespace, target.name
        );
        match target.kind {
            ResourceKind::AzureConfig => {
                let api: Api<AzureConfig> = Api::namespaced(self.client.clone(), &target.namespace);
                api.patch_status(&target.name, &params, &Patch::Merge(&patch)).await?;
            }
            ResourceKind::AzureMachinePool => {
                let api: Api<AzureMachinePool> = Api::namespaced(self.client.clone(), &target.namespace);
                api.patch_status(&target.name, &params, &Patch::Merge(&patch)).await?;
            }
        }
        Ok(())
    }
}

/// In-memory view of one handler's persisted map
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceState {
    values: BTreeMap<String, String>,
}

impl ResourceState {
    /// State of `handler` in `statuses`, empty when never written
    #[must_use]
    pub fn load(statuses: Option<&ResourceStatuses>, handler: &str) -> Self {
        Self {
            values: statuses
                .and_then(|s| s.get(handler))
                .cloned()
                .unwrap_or_default(),
        }
    }

    /// Persisted stage
    #[must_use]
    pub fn stage<S: Stage>(&self) -> S {
        self.values
            .get(STAGE_KEY)
            .map_or(S::INITIAL, |raw| S::from_persisted(raw))
    }

    /// Replace the stage
    pub fn set_stage<S: Stage>(&mut self, stage: S) {
        self.values.insert(STAGE_KEY.to_string(), stage.as_str().to_string());
    }

    /// Checksum of the last submitted template
    #[must_use]
    pub fn template_checksum(&self) -> Option<&str> {
        self.values.get(TEMPLATE_CHECKSUM_KEY).map(String::as_str)
    }

    /// Checksum of the last submitted parameters
    #[must_use]
    pub fn parameters_checksum(&self) -> Option<&str> {
        self.values.get(PARAMETERS_CHECKSUM_KEY).map(String::as_str)
    }

    /// Remember the checksums of a submitted deployment
    pub fn set_checksums(&mut self, template: String, parameters: String) {
        self.values.insert(TEMPLATE_CHECKSUM_KEY.to_string(), template);
        self.values.insert(PARAMETERS_CHECKSUM_KEY.to_string(), parameters);
    }

    /// Forgets the submitted deployment so the next pass submits it again
    pub fn clear_checksums(&mut self) {
        self.values.remove(TEMPLATE_CHECKSUM_KEY);
        self.values.remove(PARAMETERS_CHECKSUM_KEY);
    }

    /// Record a forced revisit at `now`
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.values
            .insert(TOUCH_KEY.to_string(), now.to_rfc3339_opts(SecondsFormat::Secs, true));
    }

    /// Raw map as persisted
    #[must_use]
    pub fn values(&self) -> &BTreeMap<String, String> {
        &self.values
    }
}
