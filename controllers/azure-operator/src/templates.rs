//! ARM deployment templates and their checksums.
//!
//! Templates are not rendered here: a [`TemplateSource`] hands out a finished
//! template document together with its parameters, and the state machines
//! only hash and submit them.

use crate::error::ControllerError;
use azure_client::Deployment;
use crds::{AzureConfig, AzureMachinePool, MachinePool};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::path::PathBuf;

/// Name of the deployment creating the master scale set
pub const MASTERS_DEPLOYMENT: &str = "cluster-main-template";

const MASTERS_TEMPLATE_FILE: &str = "masters.json";
const NODE_POOL_TEMPLATE_FILE: &str = "nodepool.json";

/// Lowercase hex SHA-256 of the serialized JSON document
pub fn checksum(document: &Value) -> Result<String, ControllerError> {
    let bytes = serde_json::to_vec(document)
        .map_err(|e| ControllerError::Reconciliation(format!("failed to serialize template: {e}")))?;
    Ok(hex::encode(Sha256::digest(bytes)))
}

/// Template and parameters of one ARM deployment
#[derive(Debug, Clone, PartialEq)]
pub struct DeploymentTemplate {
    /// Template document
    pub template: Value,
    /// Parameters, `{"name": {"value": ...}}`
    pub parameters: Value,
}

impl DeploymentTemplate {
    /// Checksum of the template document
    pub fn template_checksum(&self) -> Result<String, ControllerError> {
        checksum(&self.template)
    }

    /// Checksum of the parameters
    pub fn parameters_checksum(&self) -> Result<String, ControllerError> {
        checksum(&self.parameters)
    }

    /// Incremental deployment of this template
    #[must_use]
    pub fn to_deployment(&self) -> Deployment {
        Deployment::incremental(self.template.clone(), self.parameters.clone())
    }
}

/// Supplies the ARM deployments of masters and node pools
#[async_trait::async_trait]
pub trait TemplateSource: Send + Sync {
    /// Deployment of the master scale set of a cluster
    async fn masters(&self, cr: &AzureConfig, operator_version: &str) -> Result<DeploymentTemplate, ControllerError>;

    /// Deployment of the worker scale set of a node pool
    async fn node_pool(
        &self,
        pool: &AzureMachinePool,
        machine_pool: &MachinePool,
        operator_version: &str,
    ) -> Result<DeploymentTemplate, ControllerError>;
}

/// ARM parameter object from plain values
fn parameters(values: &[(&str, Value)]) -> Value {
    Value::Object(
        values
            .iter()
            .map(|(name, value)| ((*name).to_string(), json!({ "value": value })))
            .collect(),
    )
}

/// Parameters of the master deployment
pub(crate) fn masters_parameters(cr: &AzureConfig, operator_version: &str) -> Value {
    let zones: Vec<String> = cr
        .spec
        .azure
        .availability_zones
        .iter()
        .map(ToString::to_string)
        .collect();
    let vm_size = cr
        .spec
        .azure
        .masters
        .first()
        .map(|m| m.vm_size.clone())
        .unwrap_or_default();

    parameters(&[
        ("clusterID", json!(cr.cluster_id())),
        ("location", json!(cr.spec.azure.location)),
        ("masterCount", json!(cr.master_count())),
        ("masterVMSize", json!(vm_size)),
        ("operatorVersion", json!(operator_version)),
        ("zones", json!(zones)),
    ])
}

/// Parameters of a node pool deployment
pub(crate) fn node_pool_parameters(pool: &AzureMachinePool, machine_pool: &MachinePool, operator_version: &str) -> Value {
    parameters(&[
        ("clusterID", json!(machine_pool.spec.cluster_name)),
        ("location", json!(pool.spec.location)),
        ("nodepoolName", json!(pool.metadata.name.as_deref().unwrap_or_default())),
        ("operatorVersion", json!(operator_version)),
        ("replicas", json!(machine_pool.spec.replicas.unwrap_or(1))),
        ("dataDiskSizeGB", json!(pool.spec.template.data_disk_size_gb.unwrap_or(100))),
        ("vmSize", json!(pool.spec.template.vm_size)),
    ])
}

/// Reads template documents from a directory
///
/// The directory holds `masters.json` and `nodepool.json`; parameters are
/// derived from the custom resources.
#[derive(Debug, Clone)]
pub struct FileTemplateSource {
    dir: PathBuf,
}

impl FileTemplateSource {
    /// Source reading from `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    async fn read(&self, file: &str) -> Result<Value, ControllerError> {
        let path = self.dir.join(file);
        let raw = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| ControllerError::InvalidConfig(format!("failed to read template {}: {e}", path.display())))?;
        serde_json::from_str(&raw)
            .map_err(|e| ControllerError::InvalidConfig(format!("template {} is not valid JSON: {e}", path.display())))
    }
}

#[async_trait::async_trait]
impl TemplateSource for FileTemplateSource {
    async fn masters(&self, cr: &AzureConfig, operator_version: &str) -> Result<DeploymentTemplate, ControllerError> {
        Ok(DeploymentTemplate {
            template: self.read(MASTERS_TEMPLATE_FILE).await?,
            parameters: masters_parameters(cr, operator_version),
        })
    }

    async fn node_pool(
        &self,
        pool: &AzureMachinePool,
        machine_pool: &MachinePool,
        operator_version: &str,
    ) -> Result<DeploymentTemplate, ControllerError> {
        Ok(DeploymentTemplate {
            template: self.read(NODE_POOL_TEMPLATE_FILE).await?,
            parameters: node_pool_parameters(pool, machine_pool, operator_version),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    #[test]
    fn test_checksum_is_lowercase_sha256_hex() {
        // sha256 of "{}"
        assert_eq!(
            checksum(&json!({})).unwrap(),
            "44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a"
        );
    }

    #[test]
    fn test_parameter_change_changes_checksum() {
        let cr = create_test_azure_config("abc12", 3, &[1, 2, 3]);
        let first = checksum(&masters_parameters(&cr, "4.2.0")).unwrap();
        let again = checksum(&masters_parameters(&cr, "4.2.0")).unwrap();
        let upgraded = checksum(&masters_parameters(&cr, "4.3.0")).unwrap();

        assert_eq!(first, again);
        assert_ne!(first, upgraded);
    }

    #[test]
    fn test_masters_parameters() {
        let cr = create_test_azure_config("abc12", 3, &[1, 2]);
        let params = masters_parameters(&cr, "4.2.0");

        assert_eq!(params["clusterID"]["value"], "abc12");
        assert_eq!(params["masterCount"]["value"], 3);
        assert_eq!(params["zones"]["value"], json!(["1", "2"]));
        assert_eq!(params["operatorVersion"]["value"], "4.2.0");
    }

    #[tokio::test]
    async fn test_file_source_missing_template() {
        let source = FileTemplateSource::new("/nonexistent/templates");
        let cr = create_test_azure_config("abc12", 1, &[]);
        let err = source.masters(&cr, "4.2.0").await.unwrap_err();
        assert!(matches!(err, ControllerError::InvalidConfig(_)));
    }
}
