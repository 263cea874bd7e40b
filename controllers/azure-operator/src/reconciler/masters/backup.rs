//! Stages run once for clusters whose masters predate ETCD member disks.

use super::{master_node_selector, MastersContext, MastersStage, BACKUP_DISK};
use crate::error::ControllerError;
use crate::reconciler::etcd_disks::{etcd_snapshot, snapshot_name, ETCD_DISK_LUN};
use crate::reconciler::Reconciler;
use crate::state_machine::Transition;
use crds::label::{CLUSTER, OPERATOR_VERSION_TAG};
use crds::{AzureConfig, DrainerConfig, DrainerConfigSpec, DrainerGuest};
use k8s_openapi::api::core::v1::Node;
use kube::ResourceExt;
use semver::Version;
use std::collections::BTreeMap;
use tenant_client::node_name;
use tracing::{debug, info, warn};

const DRAINER_VERSION_BUNDLE: &str = "0.2.0";

/// Drain request for tenant node `node`
pub(crate) fn drainer_config(cr: &AzureConfig, node: &Node) -> DrainerConfig {
    let cluster_id = cr.cluster_id();
    let name = node_name(node);
    let mut config = DrainerConfig::new(
        name,
        DrainerConfigSpec {
            guest: DrainerGuest {
                cluster_id: cluster_id.to_string(),
                api_endpoint: Some(format!("api.{}", cr.spec.cluster.dns_zone)),
                node_name: name.to_string(),
            },
            version_bundle: Some(DRAINER_VERSION_BUNDLE.to_string()),
        },
    );
    config.metadata.namespace = Some(cluster_id.to_string());
    config.metadata.labels = Some(BTreeMap::from([(CLUSTER.to_string(), cluster_id.to_string())]));
    config
}

/// Whether the version a scale set was deployed with is older than `operator`
///
/// A missing or unparseable tag counts as older.
pub(crate) fn deployed_before(tag: Option<&str>, operator: &Version) -> bool {
    match tag.map(Version::parse) {
        Some(Ok(deployed)) => deployed < *operator,
        Some(Err(e)) => {
            warn!("Scale set version tag {:?} is not a semantic version: {}", tag, e);
            true
        }
        None => true,
    }
}

impl Reconciler {
    pub(super) async fn masters_empty(&self, ctx: &MastersContext<'_>) -> Result<Transition<MastersStage>, ControllerError> {
        let vmss = match ctx.azure.get_vmss(ctx.resource_group, &ctx.vmss).await {
            Ok(vmss) => vmss,
            Err(e) if e.is_not_found() => {
                debug!("Scale set {} not found, creating it from scratch", ctx.vmss);
                return Ok(Transition::advance(MastersStage::DeploymentUninitialized));
            }
            Err(e) => return Err(e.into()),
        };

        let tag = vmss.tags.get(OPERATOR_VERSION_TAG).map(String::as_str);
        if deployed_before(tag, &self.settings.operator_version) {
            info!(
                "Scale set {} was deployed by operator version {:?}, backing up ETCD first",
                ctx.vmss, tag
            );
            return Ok(Transition::advance(MastersStage::BackupETCDDisk));
        }
        Ok(Transition::advance(MastersStage::DeploymentUninitialized))
    }

    pub(super) async fn backup_etcd_disk(
        &self,
        ctx: &MastersContext<'_>,
    ) -> Result<Transition<MastersStage>, ControllerError> {
        let namespace = ctx.cr.namespace().unwrap_or_default();
        let Some(tenant) = self.clients.tenant_client(&namespace, ctx.cr.cluster_id()).await? else {
            debug!("Tenant API of cluster {} not available yet", ctx.cr.cluster_id());
            return Ok(self.wait(MastersStage::BackupETCDDisk));
        };

        for node in tenant.list_nodes(Some(&master_node_selector())).await? {
            let config = drainer_config(ctx.cr, &node);
            match self.drainer.create_drainer_config(&config).await {
                Ok(_) => info!("Requested drain of master node {}", node_name(&node)),
                Err(e) if e.is_already_exists() => {
                    debug!("Drain of master node {} already requested", node_name(&node));
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(Transition::advance(MastersStage::WaitForMastersToDrain))
    }

    pub(super) async fn wait_for_masters_to_drain(
        &self,
        ctx: &MastersContext<'_>,
    ) -> Result<Transition<MastersStage>, ControllerError> {
        let cluster_id = ctx.cr.cluster_id();
        let configs = self.drainer.list_drainer_configs(cluster_id, cluster_id).await?;

        if let Some(pending) = configs.iter().find(|c| !c.is_finished()) {
            debug!("Master node {} of cluster {} is still draining", pending.name_any(), cluster_id);
            return Ok(self.wait(MastersStage::WaitForMastersToDrain));
        }

        for config in &configs {
            match self.drainer.delete_drainer_config(cluster_id, &config.name_any()).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e.into()),
            }
        }

        info!("Masters of cluster {} drained", cluster_id);
        Ok(Transition::advance(MastersStage::StopMasters))
    }

    pub(super) async fn stop_masters(&self, ctx: &MastersContext<'_>) -> Result<Transition<MastersStage>, ControllerError> {
        let instance = ctx.first_instance().await?;
        let view = ctx
            .azure
            .get_vmss_vm_instance_view(ctx.resource_group, &ctx.vmss, &instance.instance_id)
            .await?;

        if view.is_deallocated() {
            return Ok(Transition::advance(MastersStage::EnsureSnapshot));
        }

        info!("Deallocating instance {} of {}", instance.instance_id, ctx.vmss);
        ctx.azure
            .deallocate_vmss_vm(ctx.resource_group, &ctx.vmss, &instance.instance_id)
            .await?;
        Ok(self.wait(MastersStage::StopMasters))
    }

    pub(super) async fn ensure_snapshot(&self, ctx: &MastersContext<'_>) -> Result<Transition<MastersStage>, ControllerError> {
        match ctx.etcd_backup().await? {
            Some(snapshot) if snapshot.is_succeeded() => {
                info!("ETCD backup {} of cluster {} is ready", snapshot.name(), ctx.cr.cluster_id());
                return Ok(Transition::advance(MastersStage::DeploymentUninitialized));
            }
            Some(snapshot) => {
                debug!(
                    "ETCD backup {} is {:?}",
                    snapshot.name(),
                    snapshot.properties.provisioning_state
                );
                return Ok(self.wait(MastersStage::EnsureSnapshot));
            }
            None => {}
        }

        let instance = ctx.first_instance().await?;
        let source = instance
            .data_disk_at(ETCD_DISK_LUN)
            .and_then(|d| d.managed_disk.as_ref())
            .and_then(|m| m.id.clone())
            .ok_or_else(|| {
                ControllerError::ExecutionFailed(format!(
                    "instance {} of {} has no disk at lun 0",
                    instance.instance_id, ctx.vmss
                ))
            })?;

        let name = snapshot_name(BACKUP_DISK);
        info!("Snapshotting ETCD disk {} of {} as {}", source, ctx.vmss, name);
        let snapshot = etcd_snapshot(&instance.location, Some(source), BACKUP_DISK);
        ctx.azure
            .create_or_update_snapshot(ctx.resource_group, &name, &snapshot)
            .await?;
        Ok(self.wait(MastersStage::EnsureSnapshot))
    }
}
