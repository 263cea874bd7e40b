//! Tenant client traits for mocking
//!
//! The state machines only see these traits. The kube-rs implementations
//! live next to them, the in-memory mocks behind the `test-util` feature.

use crate::certs::{EtcdCert, Tls};
use crate::error::TenantError;
use crds::DrainerConfig;
use k8s_openapi::api::core::v1::Node;

/// Node operations against a tenant cluster's API
#[async_trait::async_trait]
pub trait TenantClusterTrait: Send + Sync {
    /// List nodes, optionally filtered by a label selector
    async fn list_nodes(&self, label_selector: Option<&str>) -> Result<Vec<Node>, TenantError>;

    /// Mark a node unschedulable
    async fn cordon_node(&self, name: &str) -> Result<(), TenantError>;

    /// Remove a node object
    async fn delete_node(&self, name: &str) -> Result<(), TenantError>;
}

/// DrainerConfig operations against the management cluster
#[async_trait::async_trait]
pub trait DrainerClientTrait: Send + Sync {
    /// Create a drain request
    async fn create_drainer_config(&self, config: &DrainerConfig) -> Result<DrainerConfig, TenantError>;

    /// List the drain requests of one tenant cluster
    async fn list_drainer_configs(&self, namespace: &str, cluster_id: &str) -> Result<Vec<DrainerConfig>, TenantError>;

    /// Delete a drain request
    async fn delete_drainer_config(&self, namespace: &str, name: &str) -> Result<(), TenantError>;
}

/// Lookup of issued TLS bundles
#[async_trait::async_trait]
pub trait CertsSearcherTrait: Send + Sync {
    /// TLS bundle of an ETCD member of the given cluster
    async fn search_tls(&self, cluster_id: &str, cert: EtcdCert) -> Result<Tls, TenantError>;
}
