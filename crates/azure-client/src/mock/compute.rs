//! Compute operations for MockAzureClient
//!
//! Handles scale sets, scale set instances, managed disks and snapshots

use super::{lock, MockAzureClient};
use crate::error::AzureError;
use crate::models::*;
use crate::operation::Operation;

impl MockAzureClient {
    /// Add a scale set to the mock store (for test setup)
    pub fn add_vmss(&self, name: impl Into<String>, scale_set: VirtualMachineScaleSet) {
        lock(&self.scale_sets).insert(name.into(), scale_set);
    }

    /// Current state of a scale set
    pub fn vmss(&self, name: &str) -> Option<VirtualMachineScaleSet> {
        lock(&self.scale_sets).get(name).cloned()
    }

    /// Add an instance to a scale set (for test setup)
    pub fn add_instance(&self, vmss: impl Into<String>, vm: VirtualMachineScaleSetVm) {
        lock(&self.instances).entry(vmss.into()).or_default().push(vm);
    }

    /// Current instances of a scale set, in listing order
    pub fn instances(&self, vmss: &str) -> Vec<VirtualMachineScaleSetVm> {
        lock(&self.instances).get(vmss).cloned().unwrap_or_default()
    }

    /// Set the runtime view of an instance (for test setup)
    ///
    /// Instances without a configured view report `PowerState/running`.
    pub fn set_instance_view(&self, vmss: impl Into<String>, instance_id: impl Into<String>, view: InstanceView) {
        lock(&self.instance_views).insert((vmss.into(), instance_id.into()), view);
    }

    /// Add a disk to the mock store (for test setup)
    pub fn add_disk(&self, disk: Disk) {
        lock(&self.disks).insert(disk.name().to_string(), disk);
    }

    /// Current state of a disk
    pub fn disk(&self, name: &str) -> Option<Disk> {
        lock(&self.disks).get(name).cloned()
    }

    /// Add a snapshot to the mock store (for test setup)
    pub fn add_snapshot(&self, snapshot: Snapshot) {
        lock(&self.snapshots).insert(snapshot.name().to_string(), snapshot);
    }

    /// Current state of a snapshot
    pub fn snapshot(&self, name: &str) -> Option<Snapshot> {
        lock(&self.snapshots).get(name).cloned()
    }
}

/// Instance view reporting a single power state
pub(crate) fn power_view(code: &str) -> InstanceView {
    InstanceView {
        statuses: vec![InstanceViewStatus {
            code: Some(code.to_string()),
            display_status: None,
        }],
    }
}

pub fn get_vmss(client: &MockAzureClient, _resource_group: &str, vmss: &str) -> Result<VirtualMachineScaleSet, AzureError> {
    client.record("get_vmss", vmss)?;
    lock(&client.scale_sets)
        .get(vmss)
        .cloned()
        .ok_or_else(|| AzureError::NotFound(format!("vmss {vmss} not found")))
}

pub fn create_or_update_vmss(client: &MockAzureClient, resource_group: &str, vmss: &str, scale_set: &VirtualMachineScaleSet) -> Result<Operation, AzureError> {
    client.record("create_or_update_vmss", vmss)?;

    let mut stored = scale_set.clone();
    stored.name = Some(vmss.to_string());
    stored
        .id
        .get_or_insert_with(|| client.resource_id(resource_group, &format!("Microsoft.Compute/virtualMachineScaleSets/{vmss}")));

    // Growing the capacity adds instances running the new model
    let desired = usize::try_from(stored.capacity()).unwrap_or_default();
    let mut instances = lock(&client.instances);
    let list = instances.entry(vmss.to_string()).or_default();
    let mut next_id = list
        .iter()
        .filter_map(|vm| vm.instance_id.parse::<u64>().ok())
        .max()
        .map_or(0, |max| max + 1);
    while list.len() < desired {
        list.push(VirtualMachineScaleSetVm {
            name: Some(format!("{vmss}_{next_id}")),
            instance_id: next_id.to_string(),
            location: stored.location.clone(),
            sku: stored.sku.clone(),
            properties: VmProperties {
                latest_model_applied: Some(true),
                provisioning_state: Some(PROVISIONING_SUCCEEDED.to_string()),
                ..VmProperties::default()
            },
            ..VirtualMachineScaleSetVm::default()
        });
        next_id += 1;
    }
    drop(instances);

    lock(&client.scale_sets).insert(vmss.to_string(), stored);
    Ok(Operation::completed(format!("update vmss {vmss}")))
}

pub fn update_vmss_instances(client: &MockAzureClient, _resource_group: &str, vmss: &str, instance_ids: &[String]) -> Result<Operation, AzureError> {
    client.record("update_vmss_instances", &format!("{vmss}/{}", instance_ids.join(",")))?;
    if let Some(list) = lock(&client.instances).get_mut(vmss) {
        for vm in list.iter_mut().filter(|vm| instance_ids.contains(&vm.instance_id)) {
            vm.properties.latest_model_applied = Some(true);
        }
    }
    Ok(Operation::completed(format!("update instances {instance_ids:?} of vmss {vmss}")))
}

pub fn delete_vmss_instances(client: &MockAzureClient, _resource_group: &str, vmss: &str, instance_ids: &[String]) -> Result<Operation, AzureError> {
    client.record("delete_vmss_instances", &format!("{vmss}/{}", instance_ids.join(",")))?;
    let remaining = {
        let mut instances = lock(&client.instances);
        let list = instances.entry(vmss.to_string()).or_default();
        list.retain(|vm| !instance_ids.contains(&vm.instance_id));
        list.len()
    };
    if let Some(scale_set) = lock(&client.scale_sets).get_mut(vmss) {
        let sku = scale_set.sku.get_or_insert_with(Sku::default);
        sku.capacity = i64::try_from(remaining).ok();
    }
    Ok(Operation::completed(format!("delete instances {instance_ids:?} of vmss {vmss}")))
}

pub fn list_vmss_vms(client: &MockAzureClient, _resource_group: &str, vmss: &str) -> Result<Vec<VirtualMachineScaleSetVm>, AzureError> {
    client.record("list_vmss_vms", vmss)?;
    if !lock(&client.scale_sets).contains_key(vmss) {
        return Err(AzureError::NotFound(format!("vmss {vmss} not found")));
    }
    Ok(client.instances(vmss))
}

pub fn get_vmss_vm_instance_view(client: &MockAzureClient, _resource_group: &str, vmss: &str, instance_id: &str) -> Result<InstanceView, AzureError> {
    client.record("get_vmss_vm_instance_view", &format!("{vmss}/{instance_id}"))?;
    Ok(lock(&client.instance_views)
        .get(&(vmss.to_string(), instance_id.to_string()))
        .cloned()
        .unwrap_or_else(|| power_view(POWER_STATE_RUNNING)))
}

pub fn update_vmss_vm(client: &MockAzureClient, _resource_group: &str, vmss: &str, instance_id: &str, vm: &VirtualMachineScaleSetVm) -> Result<Operation, AzureError> {
    client.record("update_vmss_vm", &format!("{vmss}/{instance_id}"))?;

    let vm_id = vm.id.clone().unwrap_or_else(|| format!("{vmss}/{instance_id}"));
    {
        let mut instances = lock(&client.instances);
        let list = instances.entry(vmss.to_string()).or_default();
        let Some(existing) = list.iter_mut().find(|v| v.instance_id == instance_id) else {
            return Err(AzureError::NotFound(format!("instance {vmss}/{instance_id} not found")));
        };
        existing.properties.storage_profile = vm.properties.storage_profile.clone();
        existing.tags = vm.tags.clone();
    }

    // Attached managed disks now report this instance as their owner
    let attached: Vec<String> = vm
        .properties
        .storage_profile
        .iter()
        .flat_map(|p| p.data_disks.iter())
        .filter_map(|d| d.name.clone())
        .collect();
    let mut disks = lock(&client.disks);
    for name in attached {
        if let Some(disk) = disks.get_mut(&name) {
            disk.managed_by = Some(vm_id.clone());
        }
    }

    Ok(Operation::completed(format!("update instance {vmss}/{instance_id}")))
}

pub fn set_power_state(client: &MockAzureClient, method: &str, _resource_group: &str, vmss: &str, instance_id: &str, code: &str) -> Result<Operation, AzureError> {
    client.record(method, &format!("{vmss}/{instance_id}"))?;
    lock(&client.instance_views).insert((vmss.to_string(), instance_id.to_string()), power_view(code));
    let verb = if code == POWER_STATE_RUNNING { "start" } else { "deallocate" };
    Ok(Operation::completed(format!("{verb} instance {vmss}/{instance_id}")))
}

pub fn reimage_vmss_vm(client: &MockAzureClient, _resource_group: &str, vmss: &str, instance_id: &str) -> Result<Operation, AzureError> {
    client.record("reimage_vmss_vm", &format!("{vmss}/{instance_id}"))?;
    Ok(Operation::completed(format!("reimage instance {vmss}/{instance_id}")))
}

pub fn run_command(client: &MockAzureClient, _resource_group: &str, vmss: &str, instance_id: &str, input: &RunCommandInput) -> Result<Operation, AzureError> {
    client.record("run_command", &format!("{vmss}/{instance_id}"))?;
    lock(&client.run_commands).push((instance_id.to_string(), input.clone()));
    Ok(Operation::completed(format!("run {} on {vmss}/{instance_id}", input.command_id)))
}

pub fn get_disk(client: &MockAzureClient, _resource_group: &str, name: &str) -> Result<Disk, AzureError> {
    client.record("get_disk", name)?;
    client
        .disk(name)
        .ok_or_else(|| AzureError::NotFound(format!("disk {name} not found")))
}

pub fn list_disks(client: &MockAzureClient, _resource_group: &str) -> Result<Vec<Disk>, AzureError> {
    client.record("list_disks", "")?;
    Ok(lock(&client.disks).values().cloned().collect())
}

pub fn create_or_update_disk(client: &MockAzureClient, resource_group: &str, name: &str, disk: &Disk) -> Result<Operation, AzureError> {
    client.record("create_or_update_disk", name)?;

    let mut disks = lock(&client.disks);
    let mut stored = disk.clone();
    stored.name = Some(name.to_string());
    stored.id = Some(disk_id(&client.subscription_id, resource_group, name));
    match disks.get(name) {
        Some(existing) => {
            stored.managed_by.clone_from(&existing.managed_by);
            stored
                .properties
                .provisioning_state
                .clone_from(&existing.properties.provisioning_state);
        }
        None => stored.properties.provisioning_state = Some(client.new_provisioning_state()),
    }
    disks.insert(name.to_string(), stored);

    Ok(Operation::completed(format!("create or update disk {name}")))
}

pub fn delete_disk(client: &MockAzureClient, _resource_group: &str, name: &str) -> Result<Operation, AzureError> {
    client.record("delete_disk", name)?;
    lock(&client.disks).remove(name);
    Ok(Operation::completed(format!("delete disk {name}")))
}

pub fn list_snapshots(client: &MockAzureClient, _resource_group: &str) -> Result<Vec<Snapshot>, AzureError> {
    client.record("list_snapshots", "")?;
    Ok(lock(&client.snapshots).values().cloned().collect())
}

pub fn create_or_update_snapshot(client: &MockAzureClient, resource_group: &str, name: &str, snapshot: &Snapshot) -> Result<Operation, AzureError> {
    client.record("create_or_update_snapshot", name)?;

    let mut stored = snapshot.clone();
    stored.name = Some(name.to_string());
    stored.id = Some(client.resource_id(resource_group, &format!("Microsoft.Compute/snapshots/{name}")));
    stored.properties.provisioning_state = Some(client.new_provisioning_state());
    lock(&client.snapshots).insert(name.to_string(), stored);

    Ok(Operation::completed(format!("create or update snapshot {name}")))
}

pub fn delete_snapshot(client: &MockAzureClient, _resource_group: &str, name: &str) -> Result<Operation, AzureError> {
    client.record("delete_snapshot", name)?;
    lock(&client.snapshots).remove(name);
    Ok(Operation::completed(format!("delete snapshot {name}")))
}
