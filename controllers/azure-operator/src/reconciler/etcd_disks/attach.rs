use super::EtcdDisks;
use crate::error::ControllerError;
use crate::reconciler::masters::master_vmss_name;
use azure_client::disk_id;
use crds::AzureConfig;
use tracing::{debug, info};

/// LUN every member disk is attached at
pub const ETCD_DISK_LUN: i32 = 0;

impl EtcdDisks<'_> {
    /// Gives every provisioned master a member disk and bootstraps it
    ///
    /// Masters are handled in listing order; the order decides which member
    /// starts a new cluster and which ones join it.
    pub async fn attach_disks(&self, cr: &AzureConfig) -> Result<(), ControllerError> {
        let resource_group = cr.cluster_id();
        let vmss = master_vmss_name(resource_group);

        let instances = match self.azure.list_vmss_vms(resource_group, &vmss).await {
            Ok(instances) => instances,
            Err(e) if e.is_not_found() => {
                info!("Scale set {}/{} not found, not attaching ETCD disks", resource_group, vmss);
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let mut members = Vec::new();
        for mut instance in instances {
            if !instance.is_succeeded() {
                debug!(
                    "Instance {} of {} is {:?}, skipping",
                    instance.instance_id, vmss, instance.properties.provisioning_state
                );
                continue;
            }

            let mut member = instance
                .data_disk_at(ETCD_DISK_LUN)
                .and_then(|d| d.name.clone())
                .unwrap_or_default();

            if member.is_empty() {
                let zone = instance.zone().unwrap_or_default().to_string();
                member = self.find_available_disk(cr, &zone).await?;

                if !member.is_empty() {
                    info!(
                        "Attaching ETCD disk {} to instance {} of {}",
                        member, instance.instance_id, vmss
                    );
                    let id = disk_id(self.azure.subscription_id(), resource_group, &member);
                    instance.attach_disk(ETCD_DISK_LUN, &member, &id);
                    self.azure
                        .update_vmss_vm(resource_group, &vmss, &instance.instance_id, &instance)
                        .await?;
                }
            } else {
                debug!("Instance {} of {} already holds disk {}", instance.instance_id, vmss, member);
            }

            if !member.is_empty() {
                self.bootstrap_member(cr, &instance.instance_id, &member, &mut members)
                    .await?;
            }
        }

        Ok(())
    }
}
