//! Moving master instances to the latest scale set model.
//!
//! Each handler touches at most one instance: the first one listed, or the
//! first one still running an outdated model.

use super::{master_node_selector, MastersContext, MastersStage, BACKUP_DISK};
use crate::error::ControllerError;
use crate::reconciler::etcd_disks::ETCD_DISK_LUN;
use crate::reconciler::Reconciler;
use crate::state_machine::Transition;
use kube::ResourceExt;
use tenant_client::is_node_ready;
use tracing::{debug, info};

impl Reconciler {
    pub(super) async fn update_master(&self, ctx: &MastersContext<'_>) -> Result<Transition<MastersStage>, ControllerError> {
        let instance = ctx.first_instance().await?;
        let on_member_disk = instance
            .data_disk_at(ETCD_DISK_LUN)
            .and_then(|d| d.name.as_deref())
            == Some(BACKUP_DISK);

        if on_member_disk && instance.latest_model_applied() {
            debug!("Instance {} of {} already runs from {}", instance.instance_id, ctx.vmss, BACKUP_DISK);
        } else {
            ctx.update_instance(&instance.instance_id).await?;
        }
        Ok(Transition::advance(MastersStage::ReimageMaster))
    }

    /// Reimages the stopped first instance
    ///
    /// A running instance was already reimaged and started, so a pass acting
    /// on an outdated stage leaves it alone.
    pub(super) async fn reimage_master(&self, ctx: &MastersContext<'_>) -> Result<Transition<MastersStage>, ControllerError> {
        let instance = ctx.first_instance().await?;
        if !instance.is_succeeded() {
            debug!(
                "Instance {} of {} is {:?}",
                instance.instance_id, ctx.vmss, instance.properties.provisioning_state
            );
            return Ok(self.wait(MastersStage::ReimageMaster));
        }

        let view = ctx
            .azure
            .get_vmss_vm_instance_view(ctx.resource_group, &ctx.vmss, &instance.instance_id)
            .await?;
        if view.is_running() {
            debug!("Instance {} of {} is running, not reimaging it", instance.instance_id, ctx.vmss);
        } else {
            ctx.reimage_instance(&instance.instance_id).await?;
        }
        Ok(Transition::advance(MastersStage::StartMaster))
    }

    pub(super) async fn start_master(&self, ctx: &MastersContext<'_>) -> Result<Transition<MastersStage>, ControllerError> {
        let instance = ctx.first_instance().await?;
        if !instance.is_succeeded() {
            debug!(
                "Instance {} of {} is {:?}",
                instance.instance_id, ctx.vmss, instance.properties.provisioning_state
            );
            return Ok(self.wait(MastersStage::StartMaster));
        }

        info!("Starting instance {} of {}", instance.instance_id, ctx.vmss);
        ctx.azure
            .start_vmss_vm(ctx.resource_group, &ctx.vmss, &instance.instance_id)
            .await?;
        Ok(Transition::advance(MastersStage::ClusterUpgradeRequirementCheck))
    }

    pub(super) async fn cluster_upgrade_requirement_check(
        &self,
        ctx: &MastersContext<'_>,
    ) -> Result<Transition<MastersStage>, ControllerError> {
        let outdated = ctx
            .instances()
            .await?
            .iter()
            .filter(|i| !i.latest_model_applied())
            .count();

        if outdated > 0 {
            info!("{} instances of {} run an outdated model", outdated, ctx.vmss);
            return Ok(Transition::advance(MastersStage::MasterInstancesUpgrading));
        }
        Ok(Transition::advance(MastersStage::DeploymentCompleted))
    }

    pub(super) async fn master_instances_upgrading(
        &self,
        ctx: &MastersContext<'_>,
    ) -> Result<Transition<MastersStage>, ControllerError> {
        let instances = ctx.instances().await?;
        let Some(instance) = instances.iter().find(|i| !i.latest_model_applied()) else {
            return Ok(Transition::advance(MastersStage::WaitForMastersToBecomeReady));
        };

        ctx.update_instance(&instance.instance_id).await?;
        ctx.reimage_instance(&instance.instance_id).await?;
        Ok(self.wait(MastersStage::MasterInstancesUpgrading))
    }

    pub(super) async fn wait_for_masters_to_become_ready(
        &self,
        ctx: &MastersContext<'_>,
    ) -> Result<Transition<MastersStage>, ControllerError> {
        let cluster_id = ctx.cr.cluster_id();
        let namespace = ctx.cr.namespace().unwrap_or_default();
        let Some(tenant) = self.clients.tenant_client(&namespace, cluster_id).await? else {
            debug!("Tenant API of cluster {} not available yet", cluster_id);
            return Ok(self.wait(MastersStage::WaitForMastersToBecomeReady));
        };

        let nodes = tenant.list_nodes(Some(&master_node_selector())).await?;
        let ready = nodes.iter().filter(|n| is_node_ready(n)).count();
        if ready != nodes.len() || nodes.len() != ctx.cr.master_count() {
            debug!(
                "{}/{} master nodes of cluster {} ready, {} desired",
                ready,
                nodes.len(),
                cluster_id,
                ctx.cr.master_count()
            );
            return Ok(self.wait(MastersStage::WaitForMastersToBecomeReady));
        }

        info!("All {} master nodes of cluster {} are ready", ready, cluster_id);
        Ok(Transition::advance(MastersStage::DeploymentCompleted))
    }
}
