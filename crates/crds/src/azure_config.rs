//! AzureConfig CRD
//!
//! Declares the desired shape of a tenant cluster running on Azure: master
//! count, location, availability zones, DNS zone and the secret holding the
//! service principal used to talk to the Azure API.

use crate::status::{Condition, ResourceStatuses};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "provider.giantswarm.io",
    version = "v1alpha1",
    kind = "AzureConfig",
    namespaced,
    status = "AzureConfigStatus",
    printcolumn = r#"{"name":"Cluster", "type":"string", "jsonPath":".spec.cluster.id"}"#,
    printcolumn = r#"{"name":"Location", "type":"string", "jsonPath":".spec.azure.location"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct AzureConfigSpec {
    /// Tenant cluster identity and naming
    pub cluster: ClusterSpec,

    /// Azure specific settings
    pub azure: AzureSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    /// Cluster ID, also used as the Azure resource group name
    pub id: String,

    /// DNS zone holding the ETCD member records (e.g. "abc12.k8s.westeurope.example.io")
    pub dns_zone: String,

    /// ETCD settings
    pub etcd: EtcdSpec,

    /// Owning organization (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EtcdSpec {
    /// Domain used as the common name of the ETCD peer certificates
    pub domain: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AzureSpec {
    /// Azure region (e.g. "westeurope")
    pub location: String,

    /// Master nodes, one entry per master instance
    pub masters: Vec<NodeSpec>,

    /// Worker nodes of the legacy built-in pool
    #[serde(default)]
    pub workers: Vec<NodeSpec>,

    /// Availability zones masters may be placed in
    #[serde(default)]
    pub availability_zones: Vec<u32>,

    /// Secret with the Azure service principal for this cluster
    pub credential_secret: CredentialSecret,

    /// Peer the tenant VNet with the control plane VNet
    #[serde(default = "default_true")]
    pub vnet_peering: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NodeSpec {
    /// Azure VM size (e.g. "Standard_D4s_v3")
    pub vm_size: String,
}

/// Reference to the secret holding Azure credentials.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct CredentialSecret {
    /// Secret name
    pub name: String,

    /// Secret namespace
    pub namespace: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct AzureConfigStatus {
    /// Persisted state per handler (e.g. "masters" -> {"Stage": "..."})
    #[serde(default)]
    pub resources: ResourceStatuses,

    /// Cluster conditions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

fn default_true() -> bool {
    true
}

impl AzureConfig {
    /// Cluster ID (resource group name)
    #[must_use]
    pub fn cluster_id(&self) -> &str {
        &self.spec.cluster.id
    }

    /// Number of masters declared in the spec
    #[must_use]
    pub fn master_count(&self) -> usize {
        self.spec.azure.masters.len()
    }
}
