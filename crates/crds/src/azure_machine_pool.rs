//! AzureMachinePool CRD
//!
//! Infrastructure counterpart of a Cluster API `MachinePool`: one Azure VM
//! scale set of workers. The owning `MachinePool` is found through the owner
//! references and carries the desired replica count.

use crate::status::{Condition, ResourceStatuses};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1alpha3",
    kind = "AzureMachinePool",
    namespaced,
    status = "AzureMachinePoolStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct AzureMachinePoolSpec {
    /// Azure region
    pub location: String,

    /// VM template used by the scale set
    pub template: AzureMachineTemplate,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AzureMachineTemplate {
    /// Azure VM size for the workers
    pub vm_size: String,

    /// Size of the docker data disk in GB
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_disk_size_gb: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct AzureMachinePoolStatus {
    /// Persisted state per handler
    #[serde(default)]
    pub resources: ResourceStatuses,

    /// Number of running instances last observed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,

    /// Pool conditions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}
