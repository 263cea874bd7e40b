//! Tenant cluster client
//!
//! Builds a kube client from the kubeconfig the cluster operator stores in
//! the management cluster and performs the node operations the node-pool
//! and master state machines need.

use crate::error::TenantError;
use crate::tenant_trait::TenantClusterTrait;
use k8s_openapi::api::core::v1::{Node, Secret};
use kube::api::{DeleteParams, ListParams, Patch, PatchParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

/// Key of the kubeconfig in the `<cluster>-kubeconfig` secret
pub const KUBECONFIG_SECRET_KEY: &str = "value";

/// How long the tenant API gets to answer the availability probe
const API_PROBE_TIMEOUT: Duration = Duration::from_secs(5);
/// Connection timeout for tenant API requests
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Read timeout for tenant API requests
const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Name of the secret holding the tenant kubeconfig
#[must_use]
pub fn kubeconfig_secret_name(cluster_id: &str) -> String {
    format!("{cluster_id}-kubeconfig")
}

/// Kube client bound to one tenant cluster
#[derive(Clone)]
pub struct KubeTenantCluster {
    client: Client,
}

impl std::fmt::Debug for KubeTenantCluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeTenantCluster").finish_non_exhaustive()
    }
}

impl KubeTenantCluster {
    /// Wrap an existing client
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from a kubeconfig document
    pub async fn from_kubeconfig_yaml(kubeconfig: &str) -> Result<Self, TenantError> {
        let kubeconfig: Kubeconfig = serde_yaml::from_str(kubeconfig)
            .map_err(|e| TenantError::InvalidKubeconfig(format!("failed to parse kubeconfig: {e}")))?;

        let mut config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
            .await
            .map_err(|e| TenantError::InvalidKubeconfig(format!("failed to load kubeconfig: {e}")))?;
        config.connect_timeout = Some(CONNECT_TIMEOUT);
        config.read_timeout = Some(READ_TIMEOUT);

        let client = Client::try_from(config)
            .map_err(|e| TenantError::InvalidKubeconfig(format!("failed to create client: {e}")))?;
        Ok(Self { client })
    }

    /// Build a client from the `<cluster>-kubeconfig` secret in the management cluster
    ///
    /// Returns `Ok(None)` while the secret does not exist yet.
    pub async fn from_management_secret(
        management: Client,
        namespace: &str,
        cluster_id: &str,
    ) -> Result<Option<Self>, TenantError> {
        let name = kubeconfig_secret_name(cluster_id);
        let api: Api<Secret> = Api::namespaced(management, namespace);
        let Some(secret) = api.get_opt(&name).await? else {
            debug!("Kubeconfig secret {}/{} not found", namespace, name);
            return Ok(None);
        };

        let raw = secret
            .data
            .as_ref()
            .and_then(|d| d.get(KUBECONFIG_SECRET_KEY))
            .ok_or_else(|| TenantError::InvalidKubeconfig(format!("secret {name} has no {KUBECONFIG_SECRET_KEY}")))?;
        let yaml = String::from_utf8(raw.0.clone())
            .map_err(|e| TenantError::InvalidKubeconfig(format!("secret {name} is not UTF-8: {e}")))?;

        Self::from_kubeconfig_yaml(&yaml).await.map(Some)
    }

    /// Probe the tenant API server
    pub async fn check_available(&self) -> Result<(), TenantError> {
        match tokio::time::timeout(API_PROBE_TIMEOUT, self.client.apiserver_version()).await {
            Ok(Ok(version)) => {
                debug!("Tenant API reachable (version {}.{})", version.major, version.minor);
                Ok(())
            }
            Ok(Err(e)) => Err(TenantError::ApiNotAvailable(e.to_string())),
            Err(_) => Err(TenantError::ApiNotAvailable(format!(
                "no answer within {API_PROBE_TIMEOUT:?}"
            ))),
        }
    }
}

#[async_trait::async_trait]
impl TenantClusterTrait for KubeTenantCluster {
    async fn list_nodes(&self, label_selector: Option<&str>) -> Result<Vec<Node>, TenantError> {
        let api: Api<Node> = Api::all(self.client.clone());
        let mut params = ListParams::default();
        if let Some(selector) = label_selector {
            params = params.labels(selector);
        }
        let nodes = api.list(&params).await?;
        Ok(nodes.items)
    }

    async fn cordon_node(&self, name: &str) -> Result<(), TenantError> {
        let api: Api<Node> = Api::all(self.client.clone());
        let patch = json!({"spec": {"unschedulable": true}});
        api.patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|e| TenantError::from_kube(e, format!("node {name}")))?;
        info!("Cordoned node {}", name);
        Ok(())
    }

    async fn delete_node(&self, name: &str) -> Result<(), TenantError> {
        let api: Api<Node> = Api::all(self.client.clone());
        api.delete(name, &DeleteParams::default())
            .await
            .map_err(|e| TenantError::from_kube(e, format!("node {name}")))?;
        info!("Deleted node {}", name);
        Ok(())
    }
}
