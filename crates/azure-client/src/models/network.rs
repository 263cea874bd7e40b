//! Network models: interfaces, virtual networks, peerings and VPN gateways.

use super::SubResource;
use serde::{Deserialize, Serialize};

/// Network interface of a scale set instance
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInterface {
    /// ARM resource ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Interface name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Interface properties
    #[serde(default)]
    pub properties: NetworkInterfaceProperties,
}

/// Network interface properties
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInterfaceProperties {
    /// IP configurations
    #[serde(default)]
    pub ip_configurations: Vec<IpConfiguration>,
}

/// IP configuration of a network interface
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct IpConfiguration {
    /// Configuration name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Configuration properties
    #[serde(default)]
    pub properties: IpConfigurationProperties,
}

/// IP configuration properties
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct IpConfigurationProperties {
    /// Private IPv4 address
    #[serde(default, rename = "privateIPAddress", skip_serializing_if = "Option::is_none")]
    pub private_ip_address: Option<String>,
}

impl NetworkInterface {
    /// Private IP of the first IP configuration
    #[must_use]
    pub fn primary_private_ip(&self) -> Option<&str> {
        self.properties
            .ip_configurations
            .first()
            .and_then(|c| c.properties.private_ip_address.as_deref())
    }
}

/// Virtual network
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct VirtualNetwork {
    /// ARM resource ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// VNet name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Azure region
    #[serde(default)]
    pub location: String,
}

/// Virtual network peering
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VirtualNetworkPeering {
    /// Peering name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Peering properties
    #[serde(default)]
    pub properties: VirtualNetworkPeeringProperties,
}

/// Virtual network peering properties
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VirtualNetworkPeeringProperties {
    /// Allow VMs of both networks to reach each other
    pub allow_virtual_network_access: bool,
    /// Allow forwarded traffic from the remote network
    pub allow_forwarded_traffic: bool,
    /// Allow the remote network to use this network's gateway
    pub allow_gateway_transit: bool,
    /// Use the remote network's gateway
    pub use_remote_gateways: bool,
    /// The peered network
    pub remote_virtual_network: SubResource,
}

impl VirtualNetworkPeering {
    /// Plain peering towards `remote_vnet_id` without gateway or forwarding
    pub fn to_remote(name: impl Into<String>, remote_vnet_id: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            properties: VirtualNetworkPeeringProperties {
                allow_virtual_network_access: true,
                allow_forwarded_traffic: false,
                allow_gateway_transit: false,
                use_remote_gateways: false,
                remote_virtual_network: SubResource::new(remote_vnet_id),
            },
        }
    }
}

/// Virtual network (VPN) gateway
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct VirtualNetworkGateway {
    /// ARM resource ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Gateway name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Gateway properties
    #[serde(default)]
    pub properties: ProvisioningProperties,
}

/// Properties carrying only a provisioning state
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProvisioningProperties {
    /// Provisioning state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<String>,
}

/// Connection of a virtual network gateway
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct VirtualNetworkGatewayConnection {
    /// ARM resource ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Connection name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Connection properties
    #[serde(default)]
    pub properties: GatewayConnectionProperties,
}

/// Gateway connection properties
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GatewayConnectionProperties {
    /// First gateway of the connection
    #[serde(default, rename = "virtualNetworkGateway1", skip_serializing_if = "Option::is_none")]
    pub virtual_network_gateway1: Option<SubResource>,
    /// Second gateway of the connection
    #[serde(default, rename = "virtualNetworkGateway2", skip_serializing_if = "Option::is_none")]
    pub virtual_network_gateway2: Option<SubResource>,
}

impl VirtualNetworkGatewayConnection {
    /// Whether either end of the connection is the given gateway
    #[must_use]
    pub fn references_gateway(&self, gateway_id: &str) -> bool {
        [
            &self.properties.virtual_network_gateway1,
            &self.properties.virtual_network_gateway2,
        ]
        .into_iter()
        .flatten()
        .any(|g| g.id.as_deref().is_some_and(|id| id.eq_ignore_ascii_case(gateway_id)))
    }
}

/// Public IP address
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PublicIpAddress {
    /// ARM resource ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Public IP name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}
