use super::{MastersContext, MastersStage};
use crate::error::ControllerError;
use crate::reconciler::deployment::{deployment_state, drift, submit_if_changed, DeploymentState};
use crate::reconciler::Reconciler;
use crate::state::ResourceState;
use crate::state_machine::Transition;
use crate::templates::MASTERS_DEPLOYMENT;
use tracing::{debug, info};

impl Reconciler {
    pub(super) async fn masters_deployment_uninitialized(
        &self,
        ctx: &MastersContext<'_>,
        state: &mut ResourceState,
    ) -> Result<Transition<MastersStage>, ControllerError> {
        let template = self.templates.masters(ctx.cr, &self.operator_version()).await?;
        if submit_if_changed(ctx.azure, ctx.resource_group, MASTERS_DEPLOYMENT, state, &template).await? {
            return Ok(Transition::advance(MastersStage::DeploymentInitialized));
        }
        Ok(Transition::advance(MastersStage::DeploymentCompleted))
    }

    pub(super) async fn masters_deployment_initialized(
        &self,
        ctx: &MastersContext<'_>,
        state: &mut ResourceState,
    ) -> Result<Transition<MastersStage>, ControllerError> {
        match deployment_state(ctx.azure, ctx.resource_group, MASTERS_DEPLOYMENT).await? {
            DeploymentState::Succeeded => {
                if ctx.etcd_backup().await?.is_some() {
                    info!("Masters of cluster {} deployed, migrating ETCD", ctx.cr.cluster_id());
                    return Ok(Transition::advance(MastersStage::ETCDMigrationCheck));
                }
                info!("Masters of cluster {} deployed", ctx.cr.cluster_id());
                Ok(Transition::advance(MastersStage::ProvisioningSuccessful))
            }
            DeploymentState::Failed | DeploymentState::Missing => {
                state.clear_checksums();
                Ok(Transition::advance(MastersStage::DeploymentUninitialized))
            }
            DeploymentState::Running(provisioning) => {
                debug!("Deployment {} is {}", MASTERS_DEPLOYMENT, provisioning);
                Ok(self.wait(MastersStage::DeploymentInitialized))
            }
        }
    }

    pub(super) async fn masters_deployment_completed(
        &self,
        ctx: &MastersContext<'_>,
        state: &mut ResourceState,
    ) -> Result<Transition<MastersStage>, ControllerError> {
        let template = self.templates.masters(ctx.cr, &self.operator_version()).await?;
        if drift(state, &template)?.is_some() {
            info!("Masters template of cluster {} changed", ctx.cr.cluster_id());
            return Ok(Transition::advance(MastersStage::DeploymentUninitialized));
        }
        Ok(Transition::wait(MastersStage::DeploymentCompleted, self.settings.steady_requeue))
    }
}
