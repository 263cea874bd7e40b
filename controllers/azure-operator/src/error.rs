//! Controller-specific error types.
//!
//! Errors from the Azure, tenant and management cluster clients are wrapped
//! so the driver can classify them (not found, conflict) regardless of which
//! API produced them.

use azure_client::AzureError;
use kube::Error as KubeError;
use tenant_client::TenantError;
use thiserror::Error;

/// Errors that can occur in the Azure operator.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error (management cluster)
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Azure Resource Manager error
    #[error("Azure error: {0}")]
    Azure(#[from] AzureError),

    /// Tenant cluster, drainer or certificate lookup error
    #[error("Tenant cluster error: {0}")]
    Tenant(#[from] TenantError),

    /// Metrics registration or encoding error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The reconciled object has no owner of the expected kind
    #[error("Owner reference not set: {0}")]
    OwnerReferenceNotSet(String),

    /// An invariant of the live infrastructure does not hold
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    /// A stage handler returned a successor outside the transition table
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition {
        /// Stage the handler ran for
        from: String,
        /// Stage the handler asked for
        to: String,
    },

    /// Reconciliation failed
    #[error("Reconciliation failed: {0}")]
    Reconciliation(String),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),
}

impl ControllerError {
    /// Whether the underlying API reported a missing resource
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Kube(KubeError::Api(ae)) => ae.code == 404,
            Self::Azure(e) => e.is_not_found(),
            Self::Tenant(e) => e.is_not_found(),
            _ => false,
        }
    }

    /// Whether the underlying API rejected a write because the object changed
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        match self {
            Self::Kube(KubeError::Api(ae)) => ae.code == 409,
            Self::Azure(e) => e.is_conflict(),
            Self::Tenant(TenantError::Kube(KubeError::Api(ae))) => ae.code == 409,
            _ => false,
        }
    }
}
