//! Peering of the tenant virtual network with the control plane network.
//!
//! Peering replaced the per-cluster VPN gateway; once both peerings exist the
//! leftover gateway, its connections and its public IP are removed.

use super::Reconciler;
use crate::error::ControllerError;
use azure_client::{AzureClientTrait, VirtualNetwork, VirtualNetworkPeering, PROVISIONING_DELETING};
use crds::AzureConfig;
use tracing::{debug, info};

#[must_use]
pub fn virtual_network_name(cluster_id: &str) -> String {
    format!("{cluster_id}-VirtualNetwork")
}

#[must_use]
pub fn vpn_gateway_name(cluster_id: &str) -> String {
    format!("{cluster_id}-VPNGateway")
}

#[must_use]
pub fn vpn_gateway_public_ip_name(cluster_id: &str) -> String {
    format!("{}-PublicIP", vpn_gateway_name(cluster_id))
}

/// Virtual network `name`, `None` while it does not exist
async fn find_network(
    azure: &dyn AzureClientTrait,
    resource_group: &str,
    name: &str,
) -> Result<Option<VirtualNetwork>, ControllerError> {
    match azure.get_virtual_network(resource_group, name).await {
        Ok(network) => Ok(Some(network)),
        Err(e) if e.is_not_found() => {
            debug!("Virtual network {}/{} not found", resource_group, name);
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

impl Reconciler {
    /// Peers the tenant and control plane networks in both directions
    pub async fn ensure_vnet_peering(
        &self,
        cr: &AzureConfig,
        azure: &dyn AzureClientTrait,
    ) -> Result<(), ControllerError> {
        let cluster_id = cr.cluster_id();
        let installation = self.settings.installation_name.as_str();
        let control_plane = self.clients.control_plane_client();

        let tenant_vnet_name = virtual_network_name(cluster_id);
        let Some(tenant_vnet) = find_network(azure, cluster_id, &tenant_vnet_name).await? else {
            return Ok(());
        };
        let cp_vnet_name = installation;
        let Some(cp_vnet) = find_network(control_plane.as_ref(), installation, cp_vnet_name).await? else {
            return Ok(());
        };

        let (Some(tenant_id), Some(cp_id)) = (tenant_vnet.id.as_deref(), cp_vnet.id.as_deref()) else {
            return Err(ControllerError::ExecutionFailed(format!(
                "virtual networks {tenant_vnet_name} and {cp_vnet_name} must both have an ID"
            )));
        };

        debug!("Peering {} with {}", tenant_vnet_name, cp_vnet_name);
        azure
            .create_or_update_vnet_peering(
                cluster_id,
                &tenant_vnet_name,
                installation,
                &VirtualNetworkPeering::to_remote(installation, cp_id),
            )
            .await?;
        control_plane
            .create_or_update_vnet_peering(
                installation,
                cp_vnet_name,
                cluster_id,
                &VirtualNetworkPeering::to_remote(cluster_id, tenant_id),
            )
            .await?;

        remove_vpn_gateway(azure, cluster_id).await
    }
}

/// Removes the VPN gateway the control plane used to reach the tenant
async fn remove_vpn_gateway(azure: &dyn AzureClientTrait, cluster_id: &str) -> Result<(), ControllerError> {
    let gateway_name = vpn_gateway_name(cluster_id);

    let gateway = match azure.get_virtual_network_gateway(cluster_id, &gateway_name).await {
        Ok(gateway) => gateway,
        Err(e) if e.is_not_found() => return remove_vpn_public_ip(azure, cluster_id).await,
        Err(e) => return Err(e.into()),
    };

    if gateway.properties.provisioning_state.as_deref() == Some(PROVISIONING_DELETING) {
        debug!("VPN gateway {}/{} is being deleted", cluster_id, gateway_name);
        return Ok(());
    }

    let gateway_id = gateway.id.unwrap_or_default();
    let connections: Vec<_> = azure
        .list_gateway_connections(cluster_id)
        .await?
        .into_iter()
        .filter(|c| c.references_gateway(&gateway_id))
        .collect();

    if connections.is_empty() {
        info!("Deleting VPN gateway {}/{}", cluster_id, gateway_name);
        azure.delete_virtual_network_gateway(cluster_id, &gateway_name).await?;
        return Ok(());
    }

    for connection in connections {
        let name = connection.name.unwrap_or_default();
        info!("Deleting connection {} of VPN gateway {}", name, gateway_name);
        azure.delete_gateway_connection(cluster_id, &name).await?;
    }
    Ok(())
}

async fn remove_vpn_public_ip(azure: &dyn AzureClientTrait, cluster_id: &str) -> Result<(), ControllerError> {
    let name = vpn_gateway_public_ip_name(cluster_id);
    match azure.get_public_ip(cluster_id, &name).await {
        Ok(_) => {
            info!("Deleting public IP {}/{}", cluster_id, name);
            azure.delete_public_ip(cluster_id, &name).await?;
            Ok(())
        }
        Err(e) if e.is_not_found() => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod vnet_peering_test;
