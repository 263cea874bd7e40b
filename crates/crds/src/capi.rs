//! Cluster API types consumed by the operator.
//!
//! Only the fields the node pool and cluster handlers read are modelled; the
//! CRDs themselves are installed by Cluster API.

use crate::status::Condition;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "exp.cluster.x-k8s.io",
    version = "v1alpha3",
    kind = "MachinePool",
    namespaced,
    status = "MachinePoolStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct MachinePoolSpec {
    /// Name of the owning Cluster
    pub cluster_name: String,

    /// Desired number of workers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct MachinePoolStatus {
    /// Number of ready replicas
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready_replicas: Option<i32>,

    /// Pool conditions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "cluster.x-k8s.io",
    version = "v1alpha3",
    kind = "Cluster",
    namespaced,
    status = "CapiClusterStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct CapiClusterSpec {
    /// Whether reconciliation of this cluster is paused
    #[serde(default)]
    pub paused: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct CapiClusterStatus {
    /// Cluster phase as reported by Cluster API
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,

    /// Whether the control plane is ready
    #[serde(default)]
    pub control_plane_ready: bool,
}
