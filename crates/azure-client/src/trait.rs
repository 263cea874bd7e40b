//! AzureClient trait for mocking
//!
//! This trait abstracts the Azure Resource Manager client so the operator's
//! state machines can be exercised in unit tests against an in-memory mock.
//! All mutating calls return an [`Operation`] which the caller either waits
//! for or polls across reconciliations.

use crate::error::AzureError;
use crate::models::*;
use crate::operation::Operation;

/// Trait for Azure Resource Manager operations
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait AzureClientTrait: Send + Sync {
    /// Subscription the client operates in
    fn subscription_id(&self) -> &str;

    /// Blocks until the operation reached a terminal state
    async fn wait_for_completion(&self, operation: &Operation) -> Result<(), AzureError>;

    // Virtual machine scale sets
    async fn get_vmss(&self, resource_group: &str, vmss: &str) -> Result<VirtualMachineScaleSet, AzureError>;
    async fn create_or_update_vmss(&self, resource_group: &str, vmss: &str, scale_set: &VirtualMachineScaleSet) -> Result<Operation, AzureError>;
    async fn update_vmss_instances(&self, resource_group: &str, vmss: &str, instance_ids: &[String]) -> Result<Operation, AzureError>;
    async fn delete_vmss_instances(&self, resource_group: &str, vmss: &str, instance_ids: &[String]) -> Result<Operation, AzureError>;

    // Scale set instances
    async fn list_vmss_vms(&self, resource_group: &str, vmss: &str) -> Result<Vec<VirtualMachineScaleSetVm>, AzureError>;
    async fn get_vmss_vm_instance_view(&self, resource_group: &str, vmss: &str, instance_id: &str) -> Result<InstanceView, AzureError>;
    async fn update_vmss_vm(&self, resource_group: &str, vmss: &str, instance_id: &str, vm: &VirtualMachineScaleSetVm) -> Result<Operation, AzureError>;
    async fn start_vmss_vm(&self, resource_group: &str, vmss: &str, instance_id: &str) -> Result<Operation, AzureError>;
    async fn deallocate_vmss_vm(&self, resource_group: &str, vmss: &str, instance_id: &str) -> Result<Operation, AzureError>;
    async fn reimage_vmss_vm(&self, resource_group: &str, vmss: &str, instance_id: &str) -> Result<Operation, AzureError>;
    async fn run_command(&self, resource_group: &str, vmss: &str, instance_id: &str, input: &RunCommandInput) -> Result<Operation, AzureError>;

    // Managed disks
    async fn get_disk(&self, resource_group: &str, name: &str) -> Result<Disk, AzureError>;
    async fn list_disks(&self, resource_group: &str) -> Result<Vec<Disk>, AzureError>;
    async fn create_or_update_disk(&self, resource_group: &str, name: &str, disk: &Disk) -> Result<Operation, AzureError>;
    async fn delete_disk(&self, resource_group: &str, name: &str) -> Result<Operation, AzureError>;

    // Snapshots
    async fn list_snapshots(&self, resource_group: &str) -> Result<Vec<Snapshot>, AzureError>;
    async fn create_or_update_snapshot(&self, resource_group: &str, name: &str, snapshot: &Snapshot) -> Result<Operation, AzureError>;
    async fn delete_snapshot(&self, resource_group: &str, name: &str) -> Result<Operation, AzureError>;

    // DNS
    async fn get_a_record_set(&self, resource_group: &str, zone: &str, name: &str) -> Result<RecordSet, AzureError>;
    async fn create_or_update_a_record_set(&self, resource_group: &str, zone: &str, name: &str, record_set: &RecordSet) -> Result<RecordSet, AzureError>;

    // Network
    async fn get_vmss_network_interface(&self, resource_group: &str, vmss: &str, instance_id: &str, nic: &str) -> Result<NetworkInterface, AzureError>;
    async fn get_virtual_network(&self, resource_group: &str, name: &str) -> Result<VirtualNetwork, AzureError>;
    async fn create_or_update_vnet_peering(&self, resource_group: &str, vnet: &str, name: &str, peering: &VirtualNetworkPeering) -> Result<Operation, AzureError>;
    async fn get_virtual_network_gateway(&self, resource_group: &str, name: &str) -> Result<VirtualNetworkGateway, AzureError>;
    async fn delete_virtual_network_gateway(&self, resource_group: &str, name: &str) -> Result<Operation, AzureError>;
    async fn list_gateway_connections(&self, resource_group: &str) -> Result<Vec<VirtualNetworkGatewayConnection>, AzureError>;
    async fn delete_gateway_connection(&self, resource_group: &str, name: &str) -> Result<Operation, AzureError>;
    async fn get_public_ip(&self, resource_group: &str, name: &str) -> Result<PublicIpAddress, AzureError>;
    async fn delete_public_ip(&self, resource_group: &str, name: &str) -> Result<Operation, AzureError>;

    // Template deployments
    async fn get_deployment(&self, resource_group: &str, name: &str) -> Result<Deployment, AzureError>;
    async fn create_or_update_deployment(&self, resource_group: &str, name: &str, deployment: &Deployment) -> Result<Operation, AzureError>;
}
