use super::EtcdDisks;
use crate::error::ControllerError;
use crds::label::{DISK_ROLE_ETCD, DISK_ROLE_TAG, SNAPSHOT_DISK_NAME_TAG};
use crds::AzureConfig;
use tracing::{debug, info};

impl EtcdDisks<'_> {
    /// Deletes member snapshots whose disk has been recreated
    ///
    /// A snapshot is kept as long as the disk named in its tag is missing or
    /// still provisioning.
    pub async fn cleanup_snapshots(&self, cr: &AzureConfig) -> Result<(), ControllerError> {
        let resource_group = cr.cluster_id();

        for snapshot in self.azure.list_snapshots(resource_group).await? {
            if !snapshot.has_tag(DISK_ROLE_TAG, DISK_ROLE_ETCD) {
                continue;
            }
            let Some(disk_name) = snapshot.tags.get(SNAPSHOT_DISK_NAME_TAG) else {
                continue;
            };

            match self.azure.get_disk(resource_group, disk_name).await {
                Ok(disk) if disk.is_succeeded() => {
                    info!(
                        "Disk {} restored, deleting snapshot {}/{}",
                        disk_name,
                        resource_group,
                        snapshot.name()
                    );
                    self.azure.delete_snapshot(resource_group, snapshot.name()).await?;
                }
                Ok(_) => debug!("Disk {} still provisioning, keeping snapshot {}", disk_name, snapshot.name()),
                Err(e) if e.is_not_found() => {
                    debug!("Disk {} not found, keeping snapshot {}", disk_name, snapshot.name());
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(())
    }
}
