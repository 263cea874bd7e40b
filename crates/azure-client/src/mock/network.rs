//! Network operations for MockAzureClient
//!
//! Handles DNS record sets, instance network interfaces, virtual networks,
//! peerings, VPN gateways, gateway connections and public IPs

use super::{lock, MockAzureClient};
use crate::error::AzureError;
use crate::models::*;
use crate::operation::Operation;

impl MockAzureClient {
    /// Set the primary private IP of a scale set instance (for test setup)
    pub fn set_instance_ip(&self, vmss: impl Into<String>, instance_id: impl Into<String>, ip: impl Into<String>) {
        let nic = NetworkInterface {
            id: None,
            name: None,
            properties: NetworkInterfaceProperties {
                ip_configurations: vec![IpConfiguration {
                    name: Some("ipconfig1".to_string()),
                    properties: IpConfigurationProperties {
                        private_ip_address: Some(ip.into()),
                    },
                }],
            },
        };
        lock(&self.interfaces).insert((vmss.into(), instance_id.into()), nic);
    }

    /// Current A record set `name` in `zone`
    pub fn record_set(&self, zone: &str, name: &str) -> Option<RecordSet> {
        lock(&self.record_sets)
            .get(&(zone.to_string(), name.to_string()))
            .cloned()
    }

    /// Add a virtual network to the mock store (for test setup)
    pub fn add_virtual_network(&self, network: VirtualNetwork) {
        let name = network.name.clone().unwrap_or_default();
        lock(&self.virtual_networks).insert(name, network);
    }

    /// Peering `name` of virtual network `vnet`
    pub fn peering(&self, vnet: &str, name: &str) -> Option<VirtualNetworkPeering> {
        lock(&self.peerings)
            .get(&(vnet.to_string(), name.to_string()))
            .cloned()
    }

    /// Add a VPN gateway to the mock store (for test setup)
    pub fn add_gateway(&self, gateway: VirtualNetworkGateway) {
        let name = gateway.name.clone().unwrap_or_default();
        lock(&self.gateways).insert(name, gateway);
    }

    /// Whether the VPN gateway `name` exists
    pub fn has_gateway(&self, name: &str) -> bool {
        lock(&self.gateways).contains_key(name)
    }

    /// Add a gateway connection to the mock store (for test setup)
    pub fn add_connection(&self, connection: VirtualNetworkGatewayConnection) {
        let name = connection.name.clone().unwrap_or_default();
        lock(&self.connections).insert(name, connection);
    }

    /// Add a public IP to the mock store (for test setup)
    pub fn add_public_ip(&self, ip: PublicIpAddress) {
        let name = ip.name.clone().unwrap_or_default();
        lock(&self.public_ips).insert(name, ip);
    }

    /// Whether the public IP `name` exists
    pub fn has_public_ip(&self, name: &str) -> bool {
        lock(&self.public_ips).contains_key(name)
    }
}

pub fn get_a_record_set(client: &MockAzureClient, _resource_group: &str, zone: &str, name: &str) -> Result<RecordSet, AzureError> {
    client.record("get_a_record_set", &format!("{name}.{zone}"))?;
    client
        .record_set(zone, name)
        .ok_or_else(|| AzureError::NotFound(format!("record set {name}.{zone} not found")))
}

pub fn create_or_update_a_record_set(client: &MockAzureClient, _resource_group: &str, zone: &str, name: &str, record_set: &RecordSet) -> Result<RecordSet, AzureError> {
    client.record("create_or_update_a_record_set", &format!("{name}.{zone}"))?;
    let mut stored = record_set.clone();
    stored.name = Some(name.to_string());
    lock(&client.record_sets).insert((zone.to_string(), name.to_string()), stored.clone());
    Ok(stored)
}

pub fn get_vmss_network_interface(client: &MockAzureClient, _resource_group: &str, vmss: &str, instance_id: &str, nic: &str) -> Result<NetworkInterface, AzureError> {
    client.record("get_vmss_network_interface", &format!("{vmss}/{instance_id}/{nic}"))?;
    lock(&client.interfaces)
        .get(&(vmss.to_string(), instance_id.to_string()))
        .cloned()
        .map(|mut interface| {
            interface.name = Some(nic.to_string());
            interface
        })
        .ok_or_else(|| AzureError::NotFound(format!("nic {nic} of {vmss}/{instance_id} not found")))
}

pub fn get_virtual_network(client: &MockAzureClient, _resource_group: &str, name: &str) -> Result<VirtualNetwork, AzureError> {
    client.record("get_virtual_network", name)?;
    lock(&client.virtual_networks)
        .get(name)
        .cloned()
        .ok_or_else(|| AzureError::NotFound(format!("vnet {name} not found")))
}

pub fn create_or_update_vnet_peering(client: &MockAzureClient, _resource_group: &str, vnet: &str, name: &str, peering: &VirtualNetworkPeering) -> Result<Operation, AzureError> {
    client.record("create_or_update_vnet_peering", &format!("{vnet}/{name}"))?;
    lock(&client.peerings).insert((vnet.to_string(), name.to_string()), peering.clone());
    Ok(Operation::completed(format!("create or update peering {vnet}/{name}")))
}

pub fn get_virtual_network_gateway(client: &MockAzureClient, _resource_group: &str, name: &str) -> Result<VirtualNetworkGateway, AzureError> {
    client.record("get_virtual_network_gateway", name)?;
    lock(&client.gateways)
        .get(name)
        .cloned()
        .ok_or_else(|| AzureError::NotFound(format!("vpn gateway {name} not found")))
}

pub fn delete_virtual_network_gateway(client: &MockAzureClient, _resource_group: &str, name: &str) -> Result<Operation, AzureError> {
    client.record("delete_virtual_network_gateway", name)?;
    lock(&client.gateways).remove(name);
    Ok(Operation::completed(format!("delete vpn gateway {name}")))
}

pub fn list_gateway_connections(client: &MockAzureClient, _resource_group: &str) -> Result<Vec<VirtualNetworkGatewayConnection>, AzureError> {
    client.record("list_gateway_connections", "")?;
    Ok(lock(&client.connections).values().cloned().collect())
}

pub fn delete_gateway_connection(client: &MockAzureClient, _resource_group: &str, name: &str) -> Result<Operation, AzureError> {
    client.record("delete_gateway_connection", name)?;
    lock(&client.connections).remove(name);
    Ok(Operation::completed(format!("delete gateway connection {name}")))
}

pub fn get_public_ip(client: &MockAzureClient, _resource_group: &str, name: &str) -> Result<PublicIpAddress, AzureError> {
    client.record("get_public_ip", name)?;
    lock(&client.public_ips)
        .get(name)
        .cloned()
        .ok_or_else(|| AzureError::NotFound(format!("public ip {name} not found")))
}

pub fn delete_public_ip(client: &MockAzureClient, _resource_group: &str, name: &str) -> Result<Operation, AzureError> {
    client.record("delete_public_ip", name)?;
    lock(&client.public_ips).remove(name);
    Ok(Operation::completed(format!("delete public ip {name}")))
}
