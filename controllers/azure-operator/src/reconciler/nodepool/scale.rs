use super::{NodePoolContext, NodePoolStage, Partition};
use crate::error::ControllerError;
use crate::reconciler::deployment::{deployment_state, DeploymentState};
use crate::reconciler::Reconciler;
use crate::state::ResourceState;
use crate::state_machine::Transition;
use azure_client::VirtualMachineScaleSet;
use crds::label::AUTOSCALER_ENABLED_TAG;
use std::sync::Arc;
use tenant_client::{is_node_ready, is_node_unschedulable, TenantClusterTrait};
use tracing::{debug, info};

/// Sets the capacity of the pool's scale set and toggles the autoscaler
///
/// The autoscaler discovers node groups by the scale set tag, so both
/// changes go out in one awaited update.
async fn scale_vmss(
    ctx: &NodePoolContext<'_>,
    mut vmss: VirtualMachineScaleSet,
    capacity: i64,
    autoscaler_enabled: bool,
) -> Result<(), ControllerError> {
    info!(
        "Scaling {} from {} to {} instances, autoscaler enabled: {}",
        ctx.vmss,
        vmss.capacity(),
        capacity,
        autoscaler_enabled
    );
    vmss.sku.get_or_insert_with(Default::default).capacity = Some(capacity);
    vmss.tags
        .insert(AUTOSCALER_ENABLED_TAG.to_string(), autoscaler_enabled.to_string());

    let operation = ctx
        .azure
        .create_or_update_vmss(&ctx.cluster_id, &ctx.vmss, &vmss)
        .await?;
    ctx.azure.wait_for_completion(&operation).await?;
    Ok(())
}

impl Reconciler {
    /// Client of the pool's tenant cluster unless the cluster is going away
    async fn usable_tenant(
        &self,
        ctx: &NodePoolContext<'_>,
    ) -> Result<Option<Arc<dyn TenantClusterTrait>>, ControllerError> {
        match self.management.get_cluster(&ctx.namespace, &ctx.cluster_id).await? {
            Some(cluster) if cluster.metadata.deletion_timestamp.is_none() => {}
            Some(_) => {
                debug!("Cluster {} is being deleted", ctx.cluster_id);
                return Ok(None);
            }
            None => {
                debug!("Cluster {}/{} not found", ctx.namespace, ctx.cluster_id);
                return Ok(None);
            }
        }

        let tenant = self.clients.tenant_client(&ctx.namespace, &ctx.cluster_id).await?;
        if tenant.is_none() {
            debug!("Tenant API of cluster {} not available yet", ctx.cluster_id);
        }
        Ok(tenant)
    }

    async fn partition(
        &self,
        ctx: &NodePoolContext<'_>,
        tenant: &dyn TenantClusterTrait,
    ) -> Result<(VirtualMachineScaleSet, Partition), ControllerError> {
        let vmss = ctx.azure.get_vmss(&ctx.cluster_id, &ctx.vmss).await?;
        let instances = ctx.azure.list_vmss_vms(&ctx.cluster_id, &ctx.vmss).await?;
        let nodes = tenant.list_nodes(Some(&ctx.node_selector())).await?;

        let partition = Partition::of(
            &ctx.vmss,
            vmss.sku_name(),
            instances,
            nodes,
            &self.settings.operator_version,
        );
        debug!(
            "Node pool {} has {} old and {} new workers",
            ctx.pool_name,
            partition.old.len(),
            partition.new.len()
        );
        Ok((vmss, partition))
    }

    pub(super) async fn scale_up_worker_vmss(
        &self,
        ctx: &NodePoolContext<'_>,
        state: &mut ResourceState,
    ) -> Result<Transition<NodePoolStage>, ControllerError> {
        let stay = self.wait(NodePoolStage::ScaleUpWorkerVMSS);

        if ctx.machine_pool.metadata.deletion_timestamp.is_some() {
            debug!("MachinePool of node pool {} is being deleted", ctx.pool_name);
            return Ok(stay);
        }

        for instance in ctx.azure.list_vmss_vms(&ctx.cluster_id, &ctx.vmss).await? {
            if !instance.is_succeeded() {
                debug!("Instance {} of {} is still provisioning", instance.instance_id, ctx.vmss);
                return Ok(stay);
            }
            let view = ctx
                .azure
                .get_vmss_vm_instance_view(&ctx.cluster_id, &ctx.vmss, &instance.instance_id)
                .await?;
            if !view.is_running() {
                debug!("Instance {} of {} is not running", instance.instance_id, ctx.vmss);
                return Ok(stay);
            }
        }

        match deployment_state(ctx.azure, &ctx.cluster_id, &ctx.vmss).await? {
            DeploymentState::Succeeded => {}
            DeploymentState::Failed | DeploymentState::Missing => {
                state.clear_checksums();
                return Ok(Transition::advance(NodePoolStage::DeploymentUninitialized));
            }
            DeploymentState::Running(_) => return Ok(stay),
        }

        let Some(tenant) = self.usable_tenant(ctx).await? else {
            return Ok(stay);
        };

        let (vmss, partition) = self.partition(ctx, tenant.as_ref()).await?;
        let desired = i64::try_from(partition.old.len() * 2).unwrap_or(i64::MAX);
        let current = vmss.capacity();

        if desired > current {
            scale_vmss(ctx, vmss, desired, false).await?;
            return Ok(stay);
        }

        Ok(Transition::advance(NodePoolStage::CordonOldWorkers))
    }

    pub(super) async fn cordon_old_workers(
        &self,
        ctx: &NodePoolContext<'_>,
    ) -> Result<Transition<NodePoolStage>, ControllerError> {
        let stay = self.wait(NodePoolStage::CordonOldWorkers);
        let Some(tenant) = self.usable_tenant(ctx).await? else {
            return Ok(stay);
        };

        let (_, partition) = self.partition(ctx, tenant.as_ref()).await?;
        if partition.new.len() < partition.old.len() {
            debug!(
                "Only {} of {} replacement workers of node pool {} joined",
                partition.new.len(),
                partition.old.len(),
                ctx.pool_name
            );
            return Ok(stay);
        }

        let mut cordoned = 0;
        for worker in &partition.old {
            if is_node_unschedulable(&worker.node) {
                cordoned += 1;
                continue;
            }
            match tenant.cordon_node(worker.node_name()).await {
                Ok(()) => cordoned += 1,
                Err(e) if e.is_not_found() => {
                    debug!("Node {} disappeared before cordoning", worker.node_name());
                    cordoned += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }

        if cordoned < partition.old.len() {
            return Ok(stay);
        }
        Ok(Transition::advance(NodePoolStage::WaitForWorkersToBecomeReady))
    }

    pub(super) async fn wait_for_workers_to_become_ready(
        &self,
        ctx: &NodePoolContext<'_>,
    ) -> Result<Transition<NodePoolStage>, ControllerError> {
        let stay = self.wait(NodePoolStage::WaitForWorkersToBecomeReady);
        let Some(tenant) = self.usable_tenant(ctx).await? else {
            return Ok(stay);
        };

        let (_, partition) = self.partition(ctx, tenant.as_ref()).await?;
        let ready = partition.new.iter().filter(|w| is_node_ready(&w.node)).count();
        if ready < partition.new.len() || partition.new.len() < partition.old.len() {
            debug!(
                "{}/{} new workers of node pool {} ready, {} to replace",
                ready,
                partition.new.len(),
                ctx.pool_name,
                partition.old.len()
            );
            return Ok(stay);
        }

        Ok(Transition::advance(NodePoolStage::ScaleDownWorkerVMSS))
    }

    pub(super) async fn scale_down_worker_vmss(
        &self,
        ctx: &NodePoolContext<'_>,
    ) -> Result<Transition<NodePoolStage>, ControllerError> {
        let Some(tenant) = self.usable_tenant(ctx).await? else {
            return Ok(self.wait(NodePoolStage::ScaleDownWorkerVMSS));
        };

        let (_, partition) = self.partition(ctx, tenant.as_ref()).await?;
        let mut instance_ids = Vec::with_capacity(partition.old.len());
        for worker in &partition.old {
            match tenant.delete_node(worker.node_name()).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e.into()),
            }
            self.metrics
                .report_node_termination(&ctx.cluster_id, worker.node_name(), &worker.instance.instance_id);
            instance_ids.push(worker.instance.instance_id.clone());
        }

        if !instance_ids.is_empty() {
            info!("Deleting {} old instances of {}", instance_ids.len(), ctx.vmss);
            let operation = ctx
                .azure
                .delete_vmss_instances(&ctx.cluster_id, &ctx.vmss, &instance_ids)
                .await?;
            ctx.azure.wait_for_completion(&operation).await?;
        }

        let vmss = ctx.azure.get_vmss(&ctx.cluster_id, &ctx.vmss).await?;
        let replicas = i64::from(ctx.machine_pool.spec.replicas.unwrap_or(1));
        scale_vmss(ctx, vmss, replicas, true).await?;

        Ok(Transition::advance(NodePoolStage::DeploymentUninitialized))
    }
}
