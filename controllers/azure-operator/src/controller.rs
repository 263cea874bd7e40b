//! Main controller implementation.
//!
//! Builds the reconciler from the process configuration and runs the two CRD
//! watchers next to the metrics server.

use crate::clients::KubeClientFactory;
use crate::config::Config;
use crate::error::ControllerError;
use crate::management::KubeManagementCluster;
use crate::metrics::{self, Metrics};
use crate::reconciler::{Clients, Reconciler, Settings};
use crate::state::KubeStatusStore;
use crate::templates::FileTemplateSource;
use crate::watcher::Watcher;
use kube::Client;
use std::net::SocketAddr;
use std::sync::Arc;
use tenant_client::{KubeCertsSearcher, KubeDrainerClient};
use tokio::task::JoinHandle;
use tracing::info;

/// Main controller of the Azure operator.
pub struct Controller {
    azure_config_watcher: JoinHandle<Result<(), ControllerError>>,
    azure_machine_pool_watcher: JoinHandle<Result<(), ControllerError>>,
    metrics_addr: SocketAddr,
    metrics: Arc<Metrics>,
}

impl Controller {
    /// Connects to the management cluster and starts the watchers
    pub async fn new(config: Config) -> Result<Self, ControllerError> {
        info!("Initializing Azure operator {}", config.operator_version);

        let client = Client::try_default().await?;
        let metrics = Arc::new(Metrics::new()?);

        let clients = Clients {
            factory: Arc::new(KubeClientFactory::new(
                client.clone(),
                config.azure_environment.clone(),
                config.azure_credentials.clone(),
            )?),
            management: Arc::new(KubeManagementCluster::new(client.clone())),
            drainer: Arc::new(KubeDrainerClient::new(client.clone())),
            certs: Arc::new(KubeCertsSearcher::new(client.clone())),
            status_store: Arc::new(KubeStatusStore::new(client.clone())),
            templates: Arc::new(FileTemplateSource::new(config.template_dir.clone())),
        };
        let reconciler = Arc::new(Reconciler::new(Settings::from(&config), clients, Arc::clone(&metrics)));

        let watcher = Arc::new(Watcher::new(reconciler, client, config.watch_namespace.as_deref()));

        let azure_config_watcher = {
            let watcher = Arc::clone(&watcher);
            tokio::spawn(async move { watcher.watch_azure_configs().await })
        };

        let azure_machine_pool_watcher = {
            let watcher = Arc::clone(&watcher);
            tokio::spawn(async move { watcher.watch_azure_machine_pools().await })
        };

        Ok(Self {
            azure_config_watcher,
            azure_machine_pool_watcher,
            metrics_addr: config.metrics_addr,
            metrics,
        })
    }

    /// Runs until a watcher or the metrics server exits
    pub async fn run(mut self) -> Result<(), ControllerError> {
        info!("Azure operator running");

        tokio::select! {
            result = &mut self.azure_config_watcher => {
                result.map_err(|e| ControllerError::Watch(format!("AzureConfig watcher panicked: {e}")))??;
            }
            result = &mut self.azure_machine_pool_watcher => {
                result.map_err(|e| ControllerError::Watch(format!("AzureMachinePool watcher panicked: {e}")))??;
            }
            result = metrics::serve(self.metrics_addr, Arc::clone(&self.metrics)) => {
                result?;
            }
        }

        Ok(())
    }
}
