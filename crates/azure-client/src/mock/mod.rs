//! Mock AzureClient for unit testing
//!
//! This module provides an in-memory implementation of [`AzureClientTrait`]
//! so the operator's state machines can be tested without an Azure
//! subscription. Resource groups are ignored: every resource is keyed by
//! name only.
//!
//! The mock is organized into domain-specific modules:
//! - `compute.rs` - scale sets, instances, disks and snapshots
//! - `network.rs` - DNS, interfaces, virtual networks and VPN gateways
//! - `resources.rs` - template deployments
//!
//! Every trait call is appended to a call log (`"<method>:<name>"`) which
//! tests use to assert ordering, e.g. that a disk is only deleted after its
//! snapshot was awaited.

mod compute;
mod network;
mod resources;

use crate::azure_trait::AzureClientTrait;
use crate::error::AzureError;
use crate::models::*;
use crate::operation::Operation;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Mock AzureClient for testing
///
/// Mutating calls apply their effect immediately and return a completed
/// [`Operation`]. Newly created disks, snapshots and deployments get the
/// provisioning state configured with [`MockAzureClient::set_provisioning_state`]
/// (default `Succeeded`).
#[derive(Clone)]
pub struct MockAzureClient {
    pub(crate) subscription_id: String,
    pub(crate) scale_sets: Arc<Mutex<HashMap<String, VirtualMachineScaleSet>>>,
    pub(crate) instances: Arc<Mutex<HashMap<String, Vec<VirtualMachineScaleSetVm>>>>,
    pub(crate) instance_views: Arc<Mutex<HashMap<(String, String), InstanceView>>>,
    pub(crate) disks: Arc<Mutex<BTreeMap<String, Disk>>>,
    pub(crate) snapshots: Arc<Mutex<BTreeMap<String, Snapshot>>>,
    pub(crate) record_sets: Arc<Mutex<HashMap<(String, String), RecordSet>>>,
    pub(crate) interfaces: Arc<Mutex<HashMap<(String, String), NetworkInterface>>>,
    pub(crate) virtual_networks: Arc<Mutex<HashMap<String, VirtualNetwork>>>,
    pub(crate) peerings: Arc<Mutex<BTreeMap<(String, String), VirtualNetworkPeering>>>,
    pub(crate) gateways: Arc<Mutex<HashMap<String, VirtualNetworkGateway>>>,
    pub(crate) connections: Arc<Mutex<BTreeMap<String, VirtualNetworkGatewayConnection>>>,
    pub(crate) public_ips: Arc<Mutex<HashMap<String, PublicIpAddress>>>,
    pub(crate) deployments: Arc<Mutex<HashMap<String, Deployment>>>,
    pub(crate) run_commands: Arc<Mutex<Vec<(String, RunCommandInput)>>>,
    pub(crate) provisioning_state: Arc<Mutex<String>>,
    pub(crate) failures: Arc<Mutex<HashMap<String, u16>>>,
    pub(crate) calls: Arc<Mutex<Vec<String>>>,
}

/// Locks a mock store, ignoring poisoning from a panicked test thread
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockAzureClient {
    /// Create a new mock client
    pub fn new(subscription_id: impl Into<String>) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            scale_sets: Arc::new(Mutex::new(HashMap::new())),
            instances: Arc::new(Mutex::new(HashMap::new())),
            instance_views: Arc::new(Mutex::new(HashMap::new())),
            disks: Arc::new(Mutex::new(BTreeMap::new())),
            snapshots: Arc::new(Mutex::new(BTreeMap::new())),
            record_sets: Arc::new(Mutex::new(HashMap::new())),
            interfaces: Arc::new(Mutex::new(HashMap::new())),
            virtual_networks: Arc::new(Mutex::new(HashMap::new())),
            peerings: Arc::new(Mutex::new(BTreeMap::new())),
            gateways: Arc::new(Mutex::new(HashMap::new())),
            connections: Arc::new(Mutex::new(BTreeMap::new())),
            public_ips: Arc::new(Mutex::new(HashMap::new())),
            deployments: Arc::new(Mutex::new(HashMap::new())),
            run_commands: Arc::new(Mutex::new(Vec::new())),
            provisioning_state: Arc::new(Mutex::new(PROVISIONING_SUCCEEDED.to_string())),
            failures: Arc::new(Mutex::new(HashMap::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Provisioning state given to resources created from now on
    pub fn set_provisioning_state(&self, state: impl Into<String>) {
        *lock(&self.provisioning_state) = state.into();
    }

    /// Makes every call of `method` fail with the given HTTP status
    pub fn fail_on(&self, method: impl Into<String>, status: u16) {
        lock(&self.failures).insert(method.into(), status);
    }

    /// Removes a failure registered with [`MockAzureClient::fail_on`]
    pub fn clear_failure(&self, method: &str) {
        lock(&self.failures).remove(method);
    }

    /// All calls made so far, in order
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    /// Calls whose method name starts with `prefix`
    pub fn calls_matching(&self, prefix: &str) -> Vec<String> {
        lock(&self.calls)
            .iter()
            .filter(|c| c.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Forget the recorded calls
    pub fn clear_calls(&self) {
        lock(&self.calls).clear();
    }

    /// Run-command inputs sent so far, with the target instance ID
    pub fn run_commands(&self) -> Vec<(String, RunCommandInput)> {
        lock(&self.run_commands).clone()
    }

    /// Records a call and returns the registered failure for it, if any
    pub(crate) fn record(&self, method: &str, target: &str) -> Result<(), AzureError> {
        lock(&self.calls).push(format!("{method}:{target}"));
        match lock(&self.failures).get(method) {
            Some(status) => Err(AzureError::from_status(*status, format!("{method} {target}"))),
            None => Ok(()),
        }
    }

    pub(crate) fn new_provisioning_state(&self) -> String {
        lock(&self.provisioning_state).clone()
    }

    /// ARM-style ID of a resource in this subscription
    pub(crate) fn resource_id(&self, resource_group: &str, provider_path: &str) -> String {
        format!(
            "/subscriptions/{}/resourceGroups/{}/providers/{}",
            self.subscription_id, resource_group, provider_path
        )
    }
}

#[async_trait::async_trait]
impl AzureClientTrait for MockAzureClient {
    fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    async fn wait_for_completion(&self, operation: &Operation) -> Result<(), AzureError> {
        self.record("wait", operation.description())
    }

    // Compute - delegated to compute module
    async fn get_vmss(&self, resource_group: &str, vmss: &str) -> Result<VirtualMachineScaleSet, AzureError> {
        compute::get_vmss(self, resource_group, vmss)
    }

    async fn create_or_update_vmss(&self, resource_group: &str, vmss: &str, scale_set: &VirtualMachineScaleSet) -> Result<Operation, AzureError> {
        compute::create_or_update_vmss(self, resource_group, vmss, scale_set)
    }

    async fn update_vmss_instances(&self, resource_group: &str, vmss: &str, instance_ids: &[String]) -> Result<Operation, AzureError> {
        compute::update_vmss_instances(self, resource_group, vmss, instance_ids)
    }

    async fn delete_vmss_instances(&self, resource_group: &str, vmss: &str, instance_ids: &[String]) -> Result<Operation, AzureError> {
        compute::delete_vmss_instances(self, resource_group, vmss, instance_ids)
    }

    async fn list_vmss_vms(&self, resource_group: &str, vmss: &str) -> Result<Vec<VirtualMachineScaleSetVm>, AzureError> {
        compute::list_vmss_vms(self, resource_group, vmss)
    }

    async fn get_vmss_vm_instance_view(&self, resource_group: &str, vmss: &str, instance_id: &str) -> Result<InstanceView, AzureError> {
        compute::get_vmss_vm_instance_view(self, resource_group, vmss, instance_id)
    }

    async fn update_vmss_vm(&self, resource_group: &str, vmss: &str, instance_id: &str, vm: &VirtualMachineScaleSetVm) -> Result<Operation, AzureError> {
        compute::update_vmss_vm(self, resource_group, vmss, instance_id, vm)
    }

    async fn start_vmss_vm(&self, resource_group: &str, vmss: &str, instance_id: &str) -> Result<Operation, AzureError> {
        compute::set_power_state(self, "start_vmss_vm", resource_group, vmss, instance_id, POWER_STATE_RUNNING)
    }

    async fn deallocate_vmss_vm(&self, resource_group: &str, vmss: &str, instance_id: &str) -> Result<Operation, AzureError> {
        compute::set_power_state(self, "deallocate_vmss_vm", resource_group, vmss, instance_id, POWER_STATE_DEALLOCATED)
    }

    async fn reimage_vmss_vm(&self, resource_group: &str, vmss: &str, instance_id: &str) -> Result<Operation, AzureError> {
        compute::reimage_vmss_vm(self, resource_group, vmss, instance_id)
    }

    async fn run_command(&self, resource_group: &str, vmss: &str, instance_id: &str, input: &RunCommandInput) -> Result<Operation, AzureError> {
        compute::run_command(self, resource_group, vmss, instance_id, input)
    }

    async fn get_disk(&self, resource_group: &str, name: &str) -> Result<Disk, AzureError> {
        compute::get_disk(self, resource_group, name)
    }

    async fn list_disks(&self, resource_group: &str) -> Result<Vec<Disk>, AzureError> {
        compute::list_disks(self, resource_group)
    }

    async fn create_or_update_disk(&self, resource_group: &str, name: &str, disk: &Disk) -> Result<Operation, AzureError> {
        compute::create_or_update_disk(self, resource_group, name, disk)
    }

    async fn delete_disk(&self, resource_group: &str, name: &str) -> Result<Operation, AzureError> {
        compute::delete_disk(self, resource_group, name)
    }

    async fn list_snapshots(&self, resource_group: &str) -> Result<Vec<Snapshot>, AzureError> {
        compute::list_snapshots(self, resource_group)
    }

    async fn create_or_update_snapshot(&self, resource_group: &str, name: &str, snapshot: &Snapshot) -> Result<Operation, AzureError> {
        compute::create_or_update_snapshot(self, resource_group, name, snapshot)
    }

    async fn delete_snapshot(&self, resource_group: &str, name: &str) -> Result<Operation, AzureError> {
        compute::delete_snapshot(self, resource_group, name)
    }

    // Network - delegated to network module
    async fn get_a_record_set(&self, resource_group: &str, zone: &str, name: &str) -> Result<RecordSet, AzureError> {
        network::get_a_record_set(self, resource_group, zone, name)
    }

    async fn create_or_update_a_record_set(&self, resource_group: &str, zone: &str, name: &str, record_set: &RecordSet) -> Result<RecordSet, AzureError> {
        network::create_or_update_a_record_set(self, resource_group, zone, name, record_set)
    }

    async fn get_vmss_network_interface(&self, resource_group: &str, vmss: &str, instance_id: &str, nic: &str) -> Result<NetworkInterface, AzureError> {
        network::get_vmss_network_interface(self, resource_group, vmss, instance_id, nic)
    }

    async fn get_virtual_network(&self, resource_group: &str, name: &str) -> Result<VirtualNetwork, AzureError> {
        network::get_virtual_network(self, resource_group, name)
    }

    async fn create_or_update_vnet_peering(&self, resource_group: &str, vnet: &str, name: &str, peering: &VirtualNetworkPeering) -> Result<Operation, AzureError> {
        network::create_or_update_vnet_peering(self, resource_group, vnet, name, peering)
    }

    async fn get_virtual_network_gateway(&self, resource_group: &str, name: &str) -> Result<VirtualNetworkGateway, AzureError> {
        network::get_virtual_network_gateway(self, resource_group, name)
    }

    async fn delete_virtual_network_gateway(&self, resource_group: &str, name: &str) -> Result<Operation, AzureError> {
        network::delete_virtual_network_gateway(self, resource_group, name)
    }

    async fn list_gateway_connections(&self, resource_group: &str) -> Result<Vec<VirtualNetworkGatewayConnection>, AzureError> {
        network::list_gateway_connections(self, resource_group)
    }

    async fn delete_gateway_connection(&self, resource_group: &str, name: &str) -> Result<Operation, AzureError> {
        network::delete_gateway_connection(self, resource_group, name)
    }

    async fn get_public_ip(&self, resource_group: &str, name: &str) -> Result<PublicIpAddress, AzureError> {
        network::get_public_ip(self, resource_group, name)
    }

    async fn delete_public_ip(&self, resource_group: &str, name: &str) -> Result<Operation, AzureError> {
        network::delete_public_ip(self, resource_group, name)
    }

    // Deployments - delegated to resources module
    async fn get_deployment(&self, resource_group: &str, name: &str) -> Result<Deployment, AzureError> {
        resources::get_deployment(self, resource_group, name)
    }

    async fn create_or_update_deployment(&self, resource_group: &str, name: &str, deployment: &Deployment) -> Result<Operation, AzureError> {
        resources::create_or_update_deployment(self, resource_group, name, deployment)
    }
}
