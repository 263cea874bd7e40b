//! Creation, selection and zone migration of member disks.

use super::{disk_name, snapshot_name, EtcdDisks, ETCD_DISK_SIZE_GB};
use crate::error::ControllerError;
use azure_client::{CreationData, Disk, DiskCreateOption, DiskProperties, Snapshot, SnapshotProperties};
use crds::label::{DISK_ROLE_ETCD, DISK_ROLE_TAG, SNAPSHOT_DISK_NAME_TAG};
use crds::AzureConfig;
use std::collections::HashMap;
use tracing::{debug, info, warn};

pub(crate) fn etcd_role_tags() -> HashMap<String, String> {
    HashMap::from([(DISK_ROLE_TAG.to_string(), DISK_ROLE_ETCD.to_string())])
}

/// Full copy of member disk `disk_name` taken from `source_id`
pub(crate) fn etcd_snapshot(location: &str, source_id: Option<String>, disk_name: &str) -> Snapshot {
    let mut tags = etcd_role_tags();
    tags.insert(SNAPSHOT_DISK_NAME_TAG.to_string(), disk_name.to_string());
    Snapshot {
        location: location.to_string(),
        tags,
        properties: SnapshotProperties {
            creation_data: CreationData {
                create_option: DiskCreateOption::Copy,
                source_resource_id: source_id,
            },
            incremental: Some(false),
            provisioning_state: None,
        },
        ..Snapshot::default()
    }
}

impl EtcdDisks<'_> {
    /// Creates the missing disks among `etcd1..=etcd<count>`
    ///
    /// Created disks take their zone from `zones` in turn. A disk with a
    /// snapshot tagged with its name is restored from that snapshot.
    pub async fn ensure_disks(&self, cr: &AzureConfig, count: usize, zones: &[String]) -> Result<(), ControllerError> {
        let resource_group = cr.cluster_id();
        let snapshots = self.azure.list_snapshots(resource_group).await?;
        let mut next_zone = zones.iter().cycle();

        for index in 1..=count {
            let name = disk_name(index);
            match self.azure.get_disk(resource_group, &name).await {
                Ok(_) => {
                    debug!("ETCD disk {}/{} exists", resource_group, name);
                    continue;
                }
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e.into()),
            }

            let Some(zone) = next_zone.next() else {
                warn!(
                    "No availability zone known for ETCD disk {}/{}, not creating it yet",
                    resource_group, name
                );
                return Ok(());
            };

            let creation_data = snapshots
                .iter()
                .find(|s| s.has_tag(DISK_ROLE_TAG, DISK_ROLE_ETCD) && s.has_tag(SNAPSHOT_DISK_NAME_TAG, &name))
                .map_or_else(CreationData::default, |snapshot| CreationData {
                    create_option: DiskCreateOption::Copy,
                    source_resource_id: snapshot.id.clone(),
                });

            info!(
                "Creating ETCD disk {}/{} in zone {} ({:?})",
                resource_group, name, zone, creation_data.create_option
            );
            let disk = Disk {
                location: cr.spec.azure.location.clone(),
                tags: etcd_role_tags(),
                zones: vec![zone.clone()],
                properties: DiskProperties {
                    creation_data,
                    disk_size_gb: Some(ETCD_DISK_SIZE_GB),
                    provisioning_state: None,
                },
                ..Disk::default()
            };
            self.azure.create_or_update_disk(resource_group, &name, &disk).await?;
        }

        Ok(())
    }

    /// Name of an unattached member disk usable in `zone`
    ///
    /// An empty `zone` accepts any disk. When the only free disk lives in
    /// another zone it is migrated (see [`Self::migrate_disk`]) and an empty
    /// name is returned; the disk recreated from the snapshot is picked up on
    /// a later pass.
    pub async fn find_available_disk(&self, cr: &AzureConfig, zone: &str) -> Result<String, ControllerError> {
        let resource_group = cr.cluster_id();
        let mut other_zone = None;

        for disk in self.azure.list_disks(resource_group).await? {
            if !disk.has_tag(DISK_ROLE_TAG, DISK_ROLE_ETCD) || !disk.is_succeeded() || disk.is_attached() {
                continue;
            }

            if zone.is_empty() || disk.zone() == Some(zone) {
                info!("Found available ETCD disk {}/{}", resource_group, disk.name());
                return Ok(disk.name().to_string());
            }

            debug!(
                "ETCD disk {}/{} is in zone {:?}, not {}",
                resource_group,
                disk.name(),
                disk.zone(),
                zone
            );
            other_zone = Some(disk);
        }

        if let Some(disk) = other_zone {
            self.migrate_disk(cr, disk, zone).await?;
        }
        Ok(String::new())
    }

    /// Moves `disk` out of its zone through a snapshot
    ///
    /// Each step waits for the previous one: untagging hides the disk from
    /// selection, the snapshot keeps its data, and only then is the disk
    /// deleted. [`Self::ensure_disks`] recreates it from the snapshot.
    async fn migrate_disk(&self, cr: &AzureConfig, mut disk: Disk, zone: &str) -> Result<(), ControllerError> {
        let resource_group = cr.cluster_id();
        let name = disk.name().to_string();
        info!("Moving ETCD disk {}/{} to zone {}", resource_group, name, zone);

        disk.tags.clear();
        let operation = self.azure.create_or_update_disk(resource_group, &name, &disk).await?;
        self.azure.wait_for_completion(&operation).await?;
        debug!("Removed tags from ETCD disk {}/{}", resource_group, name);

        let snapshot = etcd_snapshot(&disk.location, disk.id.clone(), &name);
        let snapshot_name = snapshot_name(&name);
        let operation = self
            .azure
            .create_or_update_snapshot(resource_group, &snapshot_name, &snapshot)
            .await?;
        self.azure.wait_for_completion(&operation).await?;
        info!("Created snapshot {}/{} of ETCD disk {}", resource_group, snapshot_name, name);

        let operation = self.azure.delete_disk(resource_group, &name).await?;
        self.azure.wait_for_completion(&operation).await?;
        info!("Deleted ETCD disk {}/{}", resource_group, name);

        Ok(())
    }
}
