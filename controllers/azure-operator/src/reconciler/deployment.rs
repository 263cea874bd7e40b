//! ARM deployment steps shared by the masters and node pool machines.

use crate::error::ControllerError;
use crate::state::ResourceState;
use crate::templates::DeploymentTemplate;
use azure_client::AzureClientTrait;
use tracing::{debug, info};

/// Observed state of a submitted deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentState {
    Succeeded,
    /// Failed or canceled
    Failed,
    Missing,
    Running(String),
}

pub async fn deployment_state(
    azure: &dyn AzureClientTrait,
    resource_group: &str,
    name: &str,
) -> Result<DeploymentState, ControllerError> {
    match azure.get_deployment(resource_group, name).await {
        Ok(deployment) if deployment.is_succeeded() => Ok(DeploymentState::Succeeded),
        Ok(deployment) if deployment.is_failed() => {
            info!(
                "Deployment {}/{} ended in state {}",
                resource_group,
                name,
                deployment.provisioning_state()
            );
            Ok(DeploymentState::Failed)
        }
        Ok(deployment) => Ok(DeploymentState::Running(deployment.provisioning_state().to_string())),
        Err(e) if e.is_not_found() => Ok(DeploymentState::Missing),
        Err(e) => Err(e.into()),
    }
}

/// Checksums of `template` when they differ from the stored ones
pub fn drift(state: &ResourceState, template: &DeploymentTemplate) -> Result<Option<(String, String)>, ControllerError> {
    let template_checksum = template.template_checksum()?;
    let parameters_checksum = template.parameters_checksum()?;

    if state.template_checksum() == Some(template_checksum.as_str())
        && state.parameters_checksum() == Some(parameters_checksum.as_str())
    {
        return Ok(None);
    }
    Ok(Some((template_checksum, parameters_checksum)))
}

/// Submits `template` as deployment `name` unless it is unchanged
///
/// Returns whether a deployment was submitted. The deployment itself runs
/// asynchronously and is observed with [`deployment_state`].
pub async fn submit_if_changed(
    azure: &dyn AzureClientTrait,
    resource_group: &str,
    name: &str,
    state: &mut ResourceState,
    template: &DeploymentTemplate,
) -> Result<bool, ControllerError> {
    let Some((template_checksum, parameters_checksum)) = drift(state, template)? else {
        debug!("Deployment {}/{} is up to date", resource_group, name);
        return Ok(false);
    };

    info!("Submitting deployment {}/{}", resource_group, name);
    azure
        .create_or_update_deployment(resource_group, name, &template.to_deployment())
        .await?;
    state.set_checksums(template_checksum, parameters_checksum);
    Ok(true)
}
