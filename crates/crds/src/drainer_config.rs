//! DrainerConfig CRD
//!
//! A drain request for one tenant node. An external drainer evacuates the
//! node and reports `Drained` or `Timeout` in the status conditions.

use crate::status::{has_true_condition, Condition};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Condition set once the node has been drained
pub const DRAINED_CONDITION: &str = "Drained";
/// Condition set once draining gave up
pub const TIMEOUT_CONDITION: &str = "Timeout";

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "core.giantswarm.io",
    version = "v1alpha1",
    kind = "DrainerConfig",
    namespaced,
    status = "DrainerConfigStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct DrainerConfigSpec {
    /// Tenant cluster the node belongs to
    pub guest: DrainerGuest,

    /// Version bundle of the drainer contract
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_bundle: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DrainerGuest {
    /// Tenant cluster ID
    pub cluster_id: String,

    /// Tenant API endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_endpoint: Option<String>,

    /// Name of the node to drain
    pub node_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct DrainerConfigStatus {
    /// Drain progress conditions
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl DrainerConfig {
    /// Whether the drainer finished, successfully or not
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.status.as_ref().is_some_and(|s| {
            has_true_condition(&s.conditions, DRAINED_CONDITION)
                || has_true_condition(&s.conditions, TIMEOUT_CONDITION)
        })
    }
}
