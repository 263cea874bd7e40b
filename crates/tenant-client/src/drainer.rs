//! DrainerConfig client
//!
//! Drain requests are custom resources in the management cluster, in the
//! namespace named after the tenant cluster.

use crate::error::TenantError;
use crate::tenant_trait::DrainerClientTrait;
use crds::{label, DrainerConfig};
use kube::api::{DeleteParams, ListParams, PostParams};
use kube::{Api, Client};
use tracing::debug;

/// DrainerConfig client on the management cluster
#[derive(Clone)]
pub struct KubeDrainerClient {
    client: Client,
}

impl KubeDrainerClient {
    /// Create a drainer client
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl std::fmt::Debug for KubeDrainerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeDrainerClient").finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl DrainerClientTrait for KubeDrainerClient {
    async fn create_drainer_config(&self, config: &DrainerConfig) -> Result<DrainerConfig, TenantError> {
        let namespace = config.metadata.namespace.as_deref().unwrap_or_default();
        let name = config.metadata.name.as_deref().unwrap_or_default();
        let api: Api<DrainerConfig> = Api::namespaced(self.client.clone(), namespace);
        debug!("Creating drainer config {}/{}", namespace, name);
        api.create(&PostParams::default(), config)
            .await
            .map_err(|e| TenantError::from_kube(e, format!("drainer config {namespace}/{name}")))
    }

    async fn list_drainer_configs(&self, namespace: &str, cluster_id: &str) -> Result<Vec<DrainerConfig>, TenantError> {
        let api: Api<DrainerConfig> = Api::namespaced(self.client.clone(), namespace);
        let params = ListParams::default().labels(&format!("{}={}", label::CLUSTER, cluster_id));
        Ok(api.list(&params).await?.items)
    }

    async fn delete_drainer_config(&self, namespace: &str, name: &str) -> Result<(), TenantError> {
        let api: Api<DrainerConfig> = Api::namespaced(self.client.clone(), namespace);
        api.delete(name, &DeleteParams::default())
            .await
            .map_err(|e| TenantError::from_kube(e, format!("drainer config {namespace}/{name}")))?;
        Ok(())
    }
}
