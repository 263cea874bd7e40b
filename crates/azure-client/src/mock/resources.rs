//! Template deployment operations for MockAzureClient

use super::{lock, MockAzureClient};
use crate::error::AzureError;
use crate::models::*;
use crate::operation::Operation;

impl MockAzureClient {
    /// Current state of a deployment
    pub fn deployment(&self, name: &str) -> Option<Deployment> {
        lock(&self.deployments).get(name).cloned()
    }

    /// Overrides the provisioning state of an existing deployment
    pub fn set_deployment_state(&self, name: &str, state: impl Into<String>) {
        if let Some(deployment) = lock(&self.deployments).get_mut(name) {
            deployment.properties.provisioning_state = Some(state.into());
        }
    }
}

pub fn get_deployment(client: &MockAzureClient, _resource_group: &str, name: &str) -> Result<Deployment, AzureError> {
    client.record("get_deployment", name)?;
    client
        .deployment(name)
        .ok_or_else(|| AzureError::NotFound(format!("deployment {name} not found")))
}

pub fn create_or_update_deployment(client: &MockAzureClient, _resource_group: &str, name: &str, deployment: &Deployment) -> Result<Operation, AzureError> {
    client.record("create_or_update_deployment", name)?;
    let mut stored = deployment.clone();
    stored.name = Some(name.to_string());
    stored.properties.provisioning_state = Some(client.new_provisioning_state());
    lock(&client.deployments).insert(name.to_string(), stored);
    Ok(Operation::completed(format!("create or update deployment {name}")))
}
