//! Per-cluster API clients.
//!
//! Every tenant cluster brings its own Azure service principal (referenced by
//! `spec.azure.credentialSecret`) and its own API server. The factory hides
//! how those clients are built so the state machines can run against mocks.

use crate::error::ControllerError;
use azure_client::{AzureClient, AzureClientTrait, AzureCredentials, AzureEnvironment};
use crds::CredentialSecret;
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client};
use std::collections::HashMap;
use std::sync::Arc;
use tenant_client::{KubeTenantCluster, TenantClusterTrait};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Secret key holding the Azure AD tenant ID
pub const TENANT_ID_KEY: &str = "azure.azureoperator.tenantid";
/// Secret key holding the application ID
pub const CLIENT_ID_KEY: &str = "azure.azureoperator.clientid";
/// Secret key holding the client secret
pub const CLIENT_SECRET_KEY: &str = "azure.azureoperator.clientsecret";
/// Secret key holding the subscription ID
pub const SUBSCRIPTION_ID_KEY: &str = "azure.azureoperator.subscriptionid";

/// Builds the clients a reconciliation needs
#[async_trait::async_trait]
pub trait ClientFactory: Send + Sync {
    /// Azure client of the subscription referenced by `secret`
    async fn azure_client(&self, secret: &CredentialSecret) -> Result<Arc<dyn AzureClientTrait>, ControllerError>;

    /// Azure client of the control plane subscription
    fn control_plane_client(&self) -> Arc<dyn AzureClientTrait>;

    /// Client of the tenant cluster, `None` while its API is not reachable
    async fn tenant_client(
        &self,
        namespace: &str,
        cluster_id: &str,
    ) -> Result<Option<Arc<dyn TenantClusterTrait>>, ControllerError>;
}

/// Reads service principals from the credential secret
pub(crate) fn credentials_from_secret(secret: &Secret) -> Result<AzureCredentials, ControllerError> {
    let name = secret.metadata.name.as_deref().unwrap_or_default();
    let field = |key: &str| -> Result<String, ControllerError> {
        let raw = secret
            .data
            .as_ref()
            .and_then(|d| d.get(key))
            .ok_or_else(|| ControllerError::InvalidConfig(format!("credential secret {name} has no {key}")))?;
        String::from_utf8(raw.0.clone())
            .map(|v| v.trim().to_string())
            .map_err(|e| ControllerError::InvalidConfig(format!("credential secret {name} key {key} is not UTF-8: {e}")))
    };

    Ok(AzureCredentials {
        tenant_id: field(TENANT_ID_KEY)?,
        client_id: field(CLIENT_ID_KEY)?,
        client_secret: field(CLIENT_SECRET_KEY)?,
        subscription_id: field(SUBSCRIPTION_ID_KEY)?,
    })
}

/// [`ClientFactory`] reading secrets from the management cluster
///
/// Azure clients are cached per credential secret, so token caches survive
/// across reconciliations.
pub struct KubeClientFactory {
    client: Client,
    environment: AzureEnvironment,
    control_plane: Arc<dyn AzureClientTrait>,
    azure_clients: Mutex<HashMap<CredentialSecret, Arc<dyn AzureClientTrait>>>,
}

impl std::fmt::Debug for KubeClientFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeClientFactory")
            .field("environment", &self.environment)
            .finish_non_exhaustive()
    }
}

impl KubeClientFactory {
    /// Create a factory; `credentials` are the operator's own service principal
    pub fn new(
        client: Client,
        environment: AzureEnvironment,
        credentials: AzureCredentials,
    ) -> Result<Self, ControllerError> {
        let control_plane: Arc<dyn AzureClientTrait> = Arc::new(AzureClient::new(credentials, &environment)?);
        Ok(Self {
            client,
            environment,
            control_plane,
            azure_clients: Mutex::new(HashMap::new()),
        })
    }
}

#[async_trait::async_trait]
impl ClientFactory for KubeClientFactory {
    async fn azure_client(&self, secret: &CredentialSecret) -> Result<Arc<dyn AzureClientTrait>, ControllerError> {
        let mut clients = self.azure_clients.lock().await;
        if let Some(client) = clients.get(secret) {
            return Ok(Arc::clone(client));
        }

        let api: Api<Secret> = Api::namespaced(self.client.clone(), &secret.namespace);
        let credentials = credentials_from_secret(&api.get(&secret.name).await?)?;
        info!(
            "Creating Azure client for subscription {} from secret {}/{}",
            credentials.subscription_id, secret.namespace, secret.name
        );

        let client: Arc<dyn AzureClientTrait> = Arc::new(AzureClient::new(credentials, &self.environment)?);
        clients.insert(secret.clone(), Arc::clone(&client));
        Ok(client)
    }

    fn control_plane_client(&self) -> Arc<dyn AzureClientTrait> {
        Arc::clone(&self.control_plane)
    }

    async fn tenant_client(
        &self,
        namespace: &str,
        cluster_id: &str,
    ) -> Result<Option<Arc<dyn TenantClusterTrait>>, ControllerError> {
        let Some(tenant) = KubeTenantCluster::from_management_secret(self.client.clone(), namespace, cluster_id).await?
        else {
            return Ok(None);
        };

        if let Err(e) = tenant.check_available().await {
            debug!("Tenant API of cluster {} not available: {}", cluster_id, e);
            return Ok(None);
        }
        Ok(Some(Arc::new(tenant)))
    }
}
