//! Reads and writes in the management cluster besides the reconciled object.

use crate::error::ControllerError;
use crds::{AzureConfig, CertConfig, Cluster, MachinePool};
use kube::api::PostParams;
use kube::{Api, Client, ResourceExt};
use tracing::{debug, info};

/// Management cluster operations the state machines depend on
#[async_trait::async_trait]
pub trait ManagementClusterTrait: Send + Sync {
    /// Cluster API machine pool, `None` when absent
    async fn get_machine_pool(&self, namespace: &str, name: &str) -> Result<Option<MachinePool>, ControllerError>;

    /// Cluster API cluster, `None` when absent
    async fn get_cluster(&self, namespace: &str, name: &str) -> Result<Option<Cluster>, ControllerError>;

    async fn get_azure_config(&self, namespace: &str, name: &str) -> Result<Option<AzureConfig>, ControllerError>;

    /// Create a certificate request unless one with the same name exists
    async fn ensure_cert_config(&self, cert_config: &CertConfig) -> Result<(), ControllerError>;
}

/// [`ManagementClusterTrait`] backed by the kube API
#[derive(Clone)]
pub struct KubeManagementCluster {
    client: Client,
}

impl std::fmt::Debug for KubeManagementCluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeManagementCluster").finish_non_exhaustive()
    }
}

impl KubeManagementCluster {
    /// Wrap a management cluster client
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl ManagementClusterTrait for KubeManagementCluster {
    async fn get_machine_pool(&self, namespace: &str, name: &str) -> Result<Option<MachinePool>, ControllerError> {
        let api: Api<MachinePool> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn get_cluster(&self, namespace: &str, name: &str) -> Result<Option<Cluster>, ControllerError> {
        let api: Api<Cluster> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn get_azure_config(&self, namespace: &str, name: &str) -> Result<Option<AzureConfig>, ControllerError> {
        let api: Api<AzureConfig> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn ensure_cert_config(&self, cert_config: &CertConfig) -> Result<(), ControllerError> {
        let namespace = cert_config.namespace().unwrap_or_default();
        let api: Api<CertConfig> = Api::namespaced(self.client.clone(), &namespace);
        match api.create(&PostParams::default(), cert_config).await {
            Ok(_) => {
                info!("Created CertConfig {}/{}", namespace, cert_config.name_any());
                Ok(())
            }
            Err(kube::Error::Api(ae)) if ae.code == 409 => {
                debug!("CertConfig {}/{} already exists", namespace, cert_config.name_any());
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
