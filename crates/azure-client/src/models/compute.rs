//! Compute models: managed disks, snapshots, scale sets and their instances.

use super::PROVISIONING_SUCCEEDED;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Power state code of a stopped and deallocated VM
pub const POWER_STATE_DEALLOCATED: &str = "PowerState/deallocated";
/// Power state code of a running VM
pub const POWER_STATE_RUNNING: &str = "PowerState/running";

/// How a disk or snapshot gets its initial content
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum DiskCreateOption {
    /// Blank disk
    #[default]
    Empty,
    /// Attach an existing managed disk
    Attach,
    /// Copy from another disk or snapshot
    Copy,
    /// Create from a platform or gallery image
    FromImage,
    /// Any value this client does not know about
    #[serde(other)]
    Unknown,
}

/// Source of a disk or snapshot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct CreationData {
    /// Creation mode
    pub create_option: DiskCreateOption,
    /// Source disk or snapshot ID for [`DiskCreateOption::Copy`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_resource_id: Option<String>,
}

/// Managed disk
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Disk {
    /// ARM resource ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Disk name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Azure region
    pub location: String,
    /// Resource tags
    #[serde(default)]
    pub tags: HashMap<String, String>,
    /// Availability zones (at most one for managed disks)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub zones: Vec<String>,
    /// ID of the VM the disk is attached to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub managed_by: Option<String>,
    /// Disk properties
    #[serde(default)]
    pub properties: DiskProperties,
}

/// Managed disk properties
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DiskProperties {
    /// Disk source
    pub creation_data: CreationData,
    /// Size in GiB
    #[serde(default, rename = "diskSizeGB", skip_serializing_if = "Option::is_none")]
    pub disk_size_gb: Option<i32>,
    /// Provisioning state, read only
    #[serde(default, skip_serializing)]
    pub provisioning_state: Option<String>,
}

impl Disk {
    /// Disk name, empty when unknown
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }

    /// Whether the disk finished provisioning
    #[must_use]
    pub fn is_succeeded(&self) -> bool {
        self.properties.provisioning_state.as_deref() == Some(PROVISIONING_SUCCEEDED)
    }

    /// Whether the disk is currently attached to a VM
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.managed_by.is_some()
    }

    /// Whether the tag `key` has value `value`
    #[must_use]
    pub fn has_tag(&self, key: &str, value: &str) -> bool {
        self.tags.get(key).is_some_and(|v| v == value)
    }

    /// First availability zone, if any
    #[must_use]
    pub fn zone(&self) -> Option<&str> {
        self.zones.first().map(String::as_str)
    }
}

/// Disk snapshot
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// ARM resource ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Snapshot name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Azure region
    pub location: String,
    /// Resource tags
    #[serde(default)]
    pub tags: HashMap<String, String>,
    /// Snapshot properties
    #[serde(default)]
    pub properties: SnapshotProperties,
}

/// Snapshot properties
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotProperties {
    /// Snapshot source
    pub creation_data: CreationData,
    /// Incremental snapshot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incremental: Option<bool>,
    /// Provisioning state, read only
    #[serde(default, skip_serializing)]
    pub provisioning_state: Option<String>,
}

impl Snapshot {
    /// Snapshot name, empty when unknown
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }

    /// Whether the snapshot finished provisioning
    #[must_use]
    pub fn is_succeeded(&self) -> bool {
        self.properties.provisioning_state.as_deref() == Some(PROVISIONING_SUCCEEDED)
    }

    /// Whether the tag `key` has value `value`
    #[must_use]
    pub fn has_tag(&self, key: &str, value: &str) -> bool {
        self.tags.get(key).is_some_and(|v| v == value)
    }
}

/// Scale set or VM SKU
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Sku {
    /// VM size, e.g. "Standard_D4s_v3"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Pricing tier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
    /// Number of instances (scale sets only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<i64>,
}

/// Virtual machine scale set
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineScaleSet {
    /// ARM resource ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Scale set name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Azure region
    pub location: String,
    /// Resource tags
    #[serde(default)]
    pub tags: HashMap<String, String>,
    /// SKU and capacity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<Sku>,
    /// Availability zones
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub zones: Vec<String>,
    /// Remaining properties, sent back untouched on update
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<serde_json::Value>,
}

impl VirtualMachineScaleSet {
    /// Current instance count
    #[must_use]
    pub fn capacity(&self) -> i64 {
        self.sku.as_ref().and_then(|s| s.capacity).unwrap_or_default()
    }

    /// SKU name (VM size)
    #[must_use]
    pub fn sku_name(&self) -> Option<&str> {
        self.sku.as_ref().and_then(|s| s.name.as_deref())
    }
}

/// Instance of a virtual machine scale set
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineScaleSetVm {
    /// ARM resource ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Instance name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Instance ID within the scale set
    #[serde(default)]
    pub instance_id: String,
    /// Azure region
    #[serde(default)]
    pub location: String,
    /// Resource tags
    #[serde(default)]
    pub tags: HashMap<String, String>,
    /// Availability zones
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub zones: Vec<String>,
    /// SKU of the instance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<Sku>,
    /// VM properties
    #[serde(default)]
    pub properties: VmProperties,
}

/// Scale set instance properties
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct VmProperties {
    /// Whether the instance runs the latest scale set model, read only
    #[serde(default, skip_serializing)]
    pub latest_model_applied: Option<bool>,
    /// Provisioning state, read only
    #[serde(default, skip_serializing)]
    pub provisioning_state: Option<String>,
    /// Storage layout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_profile: Option<StorageProfile>,
    /// Remaining properties, sent back untouched on update
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Storage layout of a VM
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct StorageProfile {
    /// Attached data disks
    #[serde(default)]
    pub data_disks: Vec<DataDisk>,
    /// OS disk and image reference, sent back untouched on update
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Data disk attached to a VM
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct DataDisk {
    /// Logical unit number
    pub lun: i32,
    /// Disk name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// How the disk is provided
    pub create_option: DiskCreateOption,
    /// Managed disk reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub managed_disk: Option<ManagedDiskParameters>,
    /// Size in GiB
    #[serde(default, rename = "diskSizeGB", skip_serializing_if = "Option::is_none")]
    pub disk_size_gb: Option<i32>,
}

/// Reference to a managed disk from a VM
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ManagedDiskParameters {
    /// Managed disk ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl VirtualMachineScaleSetVm {
    /// Whether the instance finished provisioning
    #[must_use]
    pub fn is_succeeded(&self) -> bool {
        self.properties.provisioning_state.as_deref() == Some(PROVISIONING_SUCCEEDED)
    }

    /// Whether the instance runs the latest scale set model
    #[must_use]
    pub fn latest_model_applied(&self) -> bool {
        self.properties.latest_model_applied.unwrap_or(false)
    }

    /// First availability zone, if any
    #[must_use]
    pub fn zone(&self) -> Option<&str> {
        self.zones.first().map(String::as_str)
    }

    /// SKU name (VM size)
    #[must_use]
    pub fn sku_name(&self) -> Option<&str> {
        self.sku.as_ref().and_then(|s| s.name.as_deref())
    }

    /// Data disk at the given LUN, if attached
    #[must_use]
    pub fn data_disk_at(&self, lun: i32) -> Option<&DataDisk> {
        self.properties
            .storage_profile
            .as_ref()
            .and_then(|p| p.data_disks.iter().find(|d| d.lun == lun))
    }

    /// Attaches a managed disk at the given LUN
    pub fn attach_disk(&mut self, lun: i32, name: &str, disk_id: &str) {
        let profile = self.properties.storage_profile.get_or_insert_with(StorageProfile::default);
        profile.data_disks.push(DataDisk {
            lun,
            name: Some(name.to_string()),
            create_option: DiskCreateOption::Attach,
            managed_disk: Some(ManagedDiskParameters {
                id: Some(disk_id.to_string()),
            }),
            disk_size_gb: None,
        });
    }

    /// Whether the tag `key` has value `value`
    #[must_use]
    pub fn has_tag(&self, key: &str, value: &str) -> bool {
        self.tags.get(key).is_some_and(|v| v == value)
    }
}

/// Runtime view of a VM
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct InstanceView {
    /// Provisioning and power state statuses
    #[serde(default)]
    pub statuses: Vec<InstanceViewStatus>,
}

/// Single status entry of an instance view
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct InstanceViewStatus {
    /// Status code, e.g. "PowerState/running"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Short localized label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_status: Option<String>,
}

impl InstanceView {
    /// Whether any status carries the given code
    #[must_use]
    pub fn has_status(&self, code: &str) -> bool {
        self.statuses.iter().any(|s| s.code.as_deref() == Some(code))
    }

    /// Whether the VM is deallocated
    #[must_use]
    pub fn is_deallocated(&self) -> bool {
        self.has_status(POWER_STATE_DEALLOCATED)
    }

    /// Whether the VM is running
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.has_status(POWER_STATE_RUNNING)
    }
}

/// Input of the VM run-command API
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RunCommandInput {
    /// Command ID, e.g. "RunShellScript"
    pub command_id: String,
    /// Script lines
    pub script: Vec<String>,
}

/// Instance IDs argument of the scale set bulk operations
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InstanceIds {
    /// Instance IDs the operation applies to
    pub instance_ids: Vec<String>,
}
