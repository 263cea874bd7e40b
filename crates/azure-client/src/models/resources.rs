//! ARM template deployment models.

use super::{PROVISIONING_CANCELED, PROVISIONING_FAILED, PROVISIONING_SUCCEEDED};
use serde::{Deserialize, Serialize};

/// ARM template deployment
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    /// Deployment name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Deployment properties
    pub properties: DeploymentProperties,
}

/// Deployment properties
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentProperties {
    /// "Incremental" or "Complete"
    #[serde(default = "incremental")]
    pub mode: String,
    /// Template document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<serde_json::Value>,
    /// Parameter values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
    /// Provisioning state, read only
    #[serde(default, skip_serializing)]
    pub provisioning_state: Option<String>,
}

fn incremental() -> String {
    "Incremental".to_string()
}

impl Deployment {
    /// Incremental deployment of `template` with `parameters`
    #[must_use]
    pub fn incremental(template: serde_json::Value, parameters: serde_json::Value) -> Self {
        Self {
            name: None,
            properties: DeploymentProperties {
                mode: incremental(),
                template: Some(template),
                parameters: Some(parameters),
                provisioning_state: None,
            },
        }
    }

    /// Provisioning state, empty when unknown
    #[must_use]
    pub fn provisioning_state(&self) -> &str {
        self.properties.provisioning_state.as_deref().unwrap_or_default()
    }

    /// Whether the deployment succeeded
    #[must_use]
    pub fn is_succeeded(&self) -> bool {
        self.provisioning_state() == PROVISIONING_SUCCEEDED
    }

    /// Whether the deployment failed or was canceled
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self.provisioning_state(), PROVISIONING_FAILED | PROVISIONING_CANCELED)
    }
}
