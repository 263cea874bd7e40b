//! Unit tests for virtual network peering and VPN gateway removal

#[cfg(test)]
mod tests {
    use super::super::{virtual_network_name, vpn_gateway_name, vpn_gateway_public_ip_name};
    use crate::test_utils::*;
    use azure_client::{
        GatewayConnectionProperties, ProvisioningProperties, PublicIpAddress, SubResource, VirtualNetwork,
        VirtualNetworkGateway, VirtualNetworkGatewayConnection, PROVISIONING_DELETING, PROVISIONING_SUCCEEDED,
    };

    const TENANT_VNET_ID: &str = "/subscriptions/sub-tenant/resourceGroups/abc12/providers/Microsoft.Network/virtualNetworks/abc12-VirtualNetwork";
    const CP_VNET_ID: &str = "/subscriptions/sub-control-plane/resourceGroups/ghost/providers/Microsoft.Network/virtualNetworks/ghost";
    const GATEWAY_ID: &str = "/subscriptions/sub-tenant/resourceGroups/abc12/providers/Microsoft.Network/virtualNetworkGateways/abc12-VPNGateway";

    fn network(name: &str, id: &str) -> VirtualNetwork {
        VirtualNetwork {
            id: Some(id.to_string()),
            name: Some(name.to_string()),
            location: "westeurope".to_string(),
        }
    }

    fn both_networks(ctx: &TestContext) {
        ctx.azure.add_virtual_network(network(&virtual_network_name("abc12"), TENANT_VNET_ID));
        ctx.control_plane.add_virtual_network(network(TEST_INSTALLATION, CP_VNET_ID));
    }

    fn gateway(state: &str) -> VirtualNetworkGateway {
        VirtualNetworkGateway {
            id: Some(GATEWAY_ID.to_string()),
            name: Some(vpn_gateway_name("abc12")),
            properties: ProvisioningProperties {
                provisioning_state: Some(state.to_string()),
            },
        }
    }

    fn connection(name: &str, gateway_id: &str) -> VirtualNetworkGatewayConnection {
        VirtualNetworkGatewayConnection {
            id: None,
            name: Some(name.to_string()),
            properties: GatewayConnectionProperties {
                virtual_network_gateway1: Some(SubResource::new(gateway_id)),
                virtual_network_gateway2: None,
            },
        }
    }

    #[tokio::test]
    async fn test_networks_are_peered_both_ways() {
        let ctx = create_test_context();
        both_networks(&ctx);
        let cr = create_test_azure_config("abc12", 3, &[]);

        ctx.reconciler.ensure_vnet_peering(&cr, &ctx.azure).await.unwrap();

        let tenant_side = ctx.azure.peering("abc12-VirtualNetwork", TEST_INSTALLATION).unwrap();
        assert_eq!(tenant_side.properties.remote_virtual_network.id.as_deref(), Some(CP_VNET_ID));
        assert!(tenant_side.properties.allow_virtual_network_access);

        let cp_side = ctx.control_plane.peering(TEST_INSTALLATION, "abc12").unwrap();
        assert_eq!(cp_side.properties.remote_virtual_network.id.as_deref(), Some(TENANT_VNET_ID));
    }

    #[tokio::test]
    async fn test_missing_network_postpones_peering() {
        let ctx = create_test_context();
        ctx.azure.add_virtual_network(network(&virtual_network_name("abc12"), TENANT_VNET_ID));
        let cr = create_test_azure_config("abc12", 3, &[]);

        ctx.reconciler.ensure_vnet_peering(&cr, &ctx.azure).await.unwrap();

        assert!(ctx.azure.calls_matching("create_or_update_vnet_peering").is_empty());
        assert!(ctx.control_plane.calls_matching("create_or_update_vnet_peering").is_empty());
    }

    #[tokio::test]
    async fn test_vpn_gateway_is_dismantled_over_several_passes() {
        let ctx = create_test_context();
        both_networks(&ctx);
        ctx.azure.add_gateway(gateway(PROVISIONING_SUCCEEDED));
        ctx.azure.add_connection(connection("abc12-to-ghost", GATEWAY_ID));
        ctx.azure.add_connection(connection("unrelated", "/other/gateway"));
        ctx.azure.add_public_ip(PublicIpAddress {
            id: None,
            name: Some(vpn_gateway_public_ip_name("abc12")),
        });
        let cr = create_test_azure_config("abc12", 3, &[]);

        ctx.reconciler.ensure_vnet_peering(&cr, &ctx.azure).await.unwrap();
        assert_eq!(
            ctx.azure.calls_matching("delete_gateway_connection"),
            vec!["delete_gateway_connection:abc12-to-ghost"]
        );
        assert!(ctx.azure.has_gateway("abc12-VPNGateway"));

        ctx.reconciler.ensure_vnet_peering(&cr, &ctx.azure).await.unwrap();
        assert!(!ctx.azure.has_gateway("abc12-VPNGateway"));
        assert!(ctx.azure.has_public_ip("abc12-VPNGateway-PublicIP"));

        ctx.reconciler.ensure_vnet_peering(&cr, &ctx.azure).await.unwrap();
        assert!(!ctx.azure.has_public_ip("abc12-VPNGateway-PublicIP"));
    }

    #[tokio::test]
    async fn test_gateway_being_deleted_is_left_alone() {
        let ctx = create_test_context();
        both_networks(&ctx);
        ctx.azure.add_gateway(gateway(PROVISIONING_DELETING));
        ctx.azure.add_connection(connection("abc12-to-ghost", GATEWAY_ID));
        let cr = create_test_azure_config("abc12", 3, &[]);

        ctx.reconciler.ensure_vnet_peering(&cr, &ctx.azure).await.unwrap();

        assert!(ctx.azure.calls_matching("delete_").is_empty());
    }

    #[tokio::test]
    async fn test_reconcile_peers_only_when_enabled() {
        let ctx = create_test_context();
        both_networks(&ctx);
        let mut cr = create_test_azure_config("abc12", 3, &[]);

        ctx.reconciler.reconcile_azure_config(&cr).await.unwrap();
        assert!(ctx.azure.peering("abc12-VirtualNetwork", TEST_INSTALLATION).is_none());

        cr.spec.azure.vnet_peering = true;
        ctx.reconciler.reconcile_azure_config(&cr).await.unwrap();
        assert!(ctx.azure.peering("abc12-VirtualNetwork", TEST_INSTALLATION).is_some());
    }
}
