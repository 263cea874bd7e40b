//! Node pool state machine.
//!
//! Rolls the workers of an `AzureMachinePool` onto a new scale set model by
//! surging: the scale set is doubled, old workers are cordoned once their
//! replacements joined, and removed when the replacements are ready.
//!
//! - `partition`: old/new split of the pool's workers
//! - `scale`: surge, cordon and scale-down stages

mod partition;
mod scale;

pub use partition::{worker_node_name, Partition, Worker};

use super::deployment::{deployment_state, drift, submit_if_changed, DeploymentState};
use super::{resource_key, Reconciler};
use crate::error::ControllerError;
use crate::state::{ResourceState, StatusTarget};
use crate::state_machine::{Stage, Transition};
use azure_client::AzureClientTrait;
use crds::label::MACHINE_POOL;
use crds::{AzureMachinePool, MachinePool};
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Status key of the node pool state
pub const HANDLER: &str = "nodepool";

/// Owner reference kind of the Cluster API machine pool
pub const MACHINE_POOL_KIND: &str = "MachinePool";

/// Name of the scale set and of the deployment of pool `pool`
#[must_use]
pub fn node_pool_vmss_name(pool: &str) -> String {
    format!("nodepool-{pool}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodePoolStage {
    Empty,
    DeploymentUninitialized,
    DeploymentInitialized,
    ScaleUpWorkerVMSS,
    CordonOldWorkers,
    WaitForWorkersToBecomeReady,
    ScaleDownWorkerVMSS,
    DeploymentCompleted,
}

impl Stage for NodePoolStage {
    const INITIAL: Self = Self::Empty;

    const ALL: &'static [Self] = &[
        Self::Empty,
        Self::DeploymentUninitialized,
        Self::DeploymentInitialized,
        Self::ScaleUpWorkerVMSS,
        Self::CordonOldWorkers,
        Self::WaitForWorkersToBecomeReady,
        Self::ScaleDownWorkerVMSS,
        Self::DeploymentCompleted,
    ];

    fn as_str(self) -> &'static str {
        match self {
            Self::Empty => "",
            Self::DeploymentUninitialized => "DeploymentUninitialized",
            Self::DeploymentInitialized => "DeploymentInitialized",
            Self::ScaleUpWorkerVMSS => "ScaleUpWorkerVMSS",
            Self::CordonOldWorkers => "CordonOldWorkers",
            Self::WaitForWorkersToBecomeReady => "WaitForWorkersToBecomeReady",
            Self::ScaleDownWorkerVMSS => "ScaleDownWorkerVMSS",
            Self::DeploymentCompleted => "DeploymentCompleted",
        }
    }

    fn successors(self) -> &'static [Self] {
        match self {
            Self::Empty => &[Self::DeploymentUninitialized],
            Self::DeploymentUninitialized => &[Self::DeploymentInitialized, Self::DeploymentCompleted],
            Self::DeploymentInitialized => &[Self::ScaleUpWorkerVMSS, Self::DeploymentUninitialized],
            Self::ScaleUpWorkerVMSS => &[Self::CordonOldWorkers, Self::DeploymentUninitialized],
            Self::CordonOldWorkers => &[Self::WaitForWorkersToBecomeReady],
            Self::WaitForWorkersToBecomeReady => &[Self::ScaleDownWorkerVMSS],
            Self::ScaleDownWorkerVMSS => &[Self::DeploymentUninitialized],
            Self::DeploymentCompleted => &[Self::DeploymentUninitialized],
        }
    }
}

/// What a node pool stage handler works on
pub(crate) struct NodePoolContext<'a> {
    pub pool: &'a AzureMachinePool,
    pub machine_pool: &'a MachinePool,
    pub azure: &'a dyn AzureClientTrait,
    pub namespace: String,
    pub pool_name: String,
    /// Cluster ID, also the resource group
    pub cluster_id: String,
    /// Scale set and deployment name
    pub vmss: String,
}

impl<'a> NodePoolContext<'a> {
    pub fn new(pool: &'a AzureMachinePool, machine_pool: &'a MachinePool, azure: &'a dyn AzureClientTrait) -> Self {
        let pool_name = pool.name_any();
        Self {
            pool,
            machine_pool,
            azure,
            namespace: pool.namespace().unwrap_or_default(),
            vmss: node_pool_vmss_name(&pool_name),
            cluster_id: machine_pool.spec.cluster_name.clone(),
            pool_name,
        }
    }

    /// Label selector of the pool's tenant nodes
    pub fn node_selector(&self) -> String {
        format!("{MACHINE_POOL}={}", self.pool_name)
    }
}

/// Name of the Cluster API machine pool owning `pool`
pub fn owner_machine_pool(pool: &AzureMachinePool) -> Result<String, ControllerError> {
    pool.owner_references()
        .iter()
        .find(|owner| owner.kind == MACHINE_POOL_KIND)
        .map(|owner| owner.name.clone())
        .ok_or_else(|| {
            ControllerError::OwnerReferenceNotSet(format!(
                "AzureMachinePool {} has no {MACHINE_POOL_KIND} owner",
                resource_key(pool)
            ))
        })
}

impl Reconciler {
    /// Reconciles an `AzureMachinePool` through its owning machine pool
    pub async fn reconcile_azure_machine_pool(&self, pool: &AzureMachinePool) -> Result<Action, ControllerError> {
        let owner = owner_machine_pool(pool)?;
        let namespace = pool.namespace().unwrap_or_default();
        info!("Reconciling AzureMachinePool {}", resource_key(pool));

        let Some(machine_pool) = self.management.get_machine_pool(&namespace, &owner).await? else {
            info!("MachinePool {}/{} not found yet", namespace, owner);
            return Ok(Action::requeue(self.settings.wait_requeue));
        };

        let cluster_id = &machine_pool.spec.cluster_name;
        let Some(azure_config) = self.management.get_azure_config(&namespace, cluster_id).await? else {
            info!("AzureConfig {}/{} not found yet", namespace, cluster_id);
            return Ok(Action::requeue(self.settings.wait_requeue));
        };

        let azure: Arc<dyn AzureClientTrait> = self
            .clients
            .azure_client(&azure_config.spec.azure.credential_secret)
            .await?;
        let requeue = self.ensure_node_pool(pool, &machine_pool, azure.as_ref()).await?;
        Ok(Action::requeue(requeue))
    }

    /// Runs the current node pool stage and stores the next one
    pub(crate) async fn ensure_node_pool(
        &self,
        pool: &AzureMachinePool,
        machine_pool: &MachinePool,
        azure: &dyn AzureClientTrait,
    ) -> Result<Duration, ControllerError> {
        let target = StatusTarget::azure_machine_pool(pool);
        let mut state = ResourceState::load(pool.status.as_ref().map(|s| &s.resources), HANDLER);
        let stage: NodePoolStage = state.stage();
        debug!("Node pool {} in stage {:?}", pool.name_any(), stage);

        let ctx = NodePoolContext::new(pool, machine_pool, azure);
        let transition = self.handle_node_pool_stage(&ctx, stage, &mut state).await?;
        self.persist(HANDLER, &target, &mut state, stage, transition).await
    }

    async fn handle_node_pool_stage(
        &self,
        ctx: &NodePoolContext<'_>,
        stage: NodePoolStage,
        state: &mut ResourceState,
    ) -> Result<Transition<NodePoolStage>, ControllerError> {
        match stage {
            NodePoolStage::Empty => Ok(Transition::advance(NodePoolStage::DeploymentUninitialized)),
            NodePoolStage::DeploymentUninitialized => self.node_pool_deployment_uninitialized(ctx, state).await,
            NodePoolStage::DeploymentInitialized => self.node_pool_deployment_initialized(ctx, state).await,
            NodePoolStage::ScaleUpWorkerVMSS => self.scale_up_worker_vmss(ctx, state).await,
            NodePoolStage::CordonOldWorkers => self.cordon_old_workers(ctx).await,
            NodePoolStage::WaitForWorkersToBecomeReady => self.wait_for_workers_to_become_ready(ctx).await,
            NodePoolStage::ScaleDownWorkerVMSS => self.scale_down_worker_vmss(ctx).await,
            NodePoolStage::DeploymentCompleted => self.node_pool_deployment_completed(ctx, state).await,
        }
    }

    async fn node_pool_deployment_uninitialized(
        &self,
        ctx: &NodePoolContext<'_>,
        state: &mut ResourceState,
    ) -> Result<Transition<NodePoolStage>, ControllerError> {
        let template = self
            .templates
            .node_pool(ctx.pool, ctx.machine_pool, &self.operator_version())
            .await?;
        if submit_if_changed(ctx.azure, &ctx.cluster_id, &ctx.vmss, state, &template).await? {
            return Ok(Transition::advance(NodePoolStage::DeploymentInitialized));
        }
        Ok(Transition::advance(NodePoolStage::DeploymentCompleted))
    }

    async fn node_pool_deployment_initialized(
        &self,
        ctx: &NodePoolContext<'_>,
        state: &mut ResourceState,
    ) -> Result<Transition<NodePoolStage>, ControllerError> {
        match deployment_state(ctx.azure, &ctx.cluster_id, &ctx.vmss).await? {
            DeploymentState::Succeeded => Ok(Transition::advance(NodePoolStage::ScaleUpWorkerVMSS)),
            DeploymentState::Failed | DeploymentState::Missing => {
                state.clear_checksums();
                Ok(Transition::advance(NodePoolStage::DeploymentUninitialized))
            }
            DeploymentState::Running(provisioning) => {
                debug!("Deployment {} is {}", ctx.vmss, provisioning);
                Ok(self.wait(NodePoolStage::DeploymentInitialized))
            }
        }
    }

    async fn node_pool_deployment_completed(
        &self,
        ctx: &NodePoolContext<'_>,
        state: &mut ResourceState,
    ) -> Result<Transition<NodePoolStage>, ControllerError> {
        let template = self
            .templates
            .node_pool(ctx.pool, ctx.machine_pool, &self.operator_version())
            .await?;
        if drift(state, &template)?.is_some() {
            info!("Template of node pool {} changed", ctx.pool_name);
            return Ok(Transition::advance(NodePoolStage::DeploymentUninitialized));
        }
        Ok(Transition::wait(NodePoolStage::DeploymentCompleted, self.settings.steady_requeue))
    }
}

#[cfg(test)]
mod nodepool_test;
#[cfg(test)]
mod scale_test;
