//! Tenant client errors

use thiserror::Error;

/// Errors that can occur when talking to a tenant cluster or reading its
/// credentials from the management cluster
#[derive(Debug, Error)]
pub enum TenantError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// The tenant API server did not answer
    #[error("Tenant API not available: {0}")]
    ApiNotAvailable(String),

    /// TLS material for an ETCD member is missing or incomplete
    #[error("Certificate unavailable: {0}")]
    CertUnavailable(String),

    /// The tenant kubeconfig could not be parsed or loaded
    #[error("Invalid kubeconfig: {0}")]
    InvalidKubeconfig(String),

    /// Requested object does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Object to create exists already
    #[error("Already exists: {0}")]
    AlreadyExists(String),
}

impl TenantError {
    /// Whether the error means the requested object does not exist
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Kube(kube::Error::Api(ae)) => ae.code == 404,
            _ => false,
        }
    }

    /// Whether the error means the object to create exists already
    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        match self {
            Self::AlreadyExists(_) => true,
            Self::Kube(kube::Error::Api(ae)) => ae.code == 409,
            _ => false,
        }
    }

    /// Maps kube API errors to the typed variants, keeping everything else
    pub(crate) fn from_kube(error: kube::Error, what: impl Into<String>) -> Self {
        match &error {
            kube::Error::Api(ae) if ae.code == 404 => Self::NotFound(what.into()),
            kube::Error::Api(ae) if ae.code == 409 => Self::AlreadyExists(what.into()),
            _ => Self::Kube(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_variants() {
        assert!(TenantError::NotFound("node".into()).is_not_found());
        assert!(!TenantError::NotFound("node".into()).is_already_exists());
        assert!(TenantError::AlreadyExists("drainer".into()).is_already_exists());
        assert!(!TenantError::ApiNotAvailable("timeout".into()).is_not_found());
    }
}
