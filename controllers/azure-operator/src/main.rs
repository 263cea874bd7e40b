//! Azure Operator
//!
//! Manages the Azure infrastructure of tenant clusters:
//! - ETCD member disks, DNS records and bootstrap of the master instances
//! - Master upgrades through ARM deployments and instance reimaging
//! - Rolling replacement of node pool workers
//! - Peering between tenant and control plane virtual networks

mod backoff;
mod clients;
mod config;
mod controller;
mod error;
mod management;
mod metrics;
mod reconciler;
mod state;
mod state_machine;
mod templates;
mod watcher;

#[cfg(test)]
mod test_utils;

use crate::config::Config;
use controller::Controller;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if rustls::crypto::ring::default_provider().install_default().is_err() {
        anyhow::bail!("failed to install rustls crypto provider");
    }

    info!("Starting Azure Operator");

    let config = Config::from_env()?;
    info!("Configuration:");
    info!("  Installation: {}", config.installation_name);
    info!("  Operator version: {}", config.operator_version);
    info!(
        "  Namespace: {}",
        config.watch_namespace.as_deref().unwrap_or("all namespaces")
    );
    info!("  Metrics: {}", config.metrics_addr);

    let controller = Controller::new(config).await?;
    controller.run().await?;

    Ok(())
}
