//! Operator configuration from environment variables.

use crate::error::ControllerError;
use azure_client::{AzureCredentials, AzureEnvironment};
use semver::Version;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_METRICS_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_WAIT_REQUEUE_SECONDS: u64 = 30;
const DEFAULT_STEADY_REQUEUE_SECONDS: u64 = 300;
const DEFAULT_TEMPLATE_DIR: &str = "/opt/azure-operator/templates";

/// Process wide settings of the operator
#[derive(Debug, Clone)]
pub struct Config {
    /// Service principal of the control plane subscription
    pub azure_credentials: AzureCredentials,
    /// Azure cloud endpoints
    pub azure_environment: AzureEnvironment,
    /// Installation name: control plane resource group and VNet prefix
    pub installation_name: String,
    /// Version stamped on and compared against managed resources
    pub operator_version: Version,
    /// Namespace to watch, all namespaces when unset
    pub watch_namespace: Option<String>,
    /// Listen address of the metrics and probe server
    pub metrics_addr: SocketAddr,
    /// Requeue delay of a stage that waits on something
    pub wait_requeue: Duration,
    /// Requeue delay once a state machine reached its terminal stage
    pub steady_requeue: Duration,
    /// Directory holding the ARM template documents
    pub template_dir: PathBuf,
}

impl Config {
    /// Load the configuration from the process environment
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load the configuration through `lookup`, which returns a variable's value
    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ControllerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ControllerError::InvalidConfig(format!("{key} environment variable is required")))
        };

        let azure_credentials = AzureCredentials {
            tenant_id: required("AZURE_TENANT_ID")?,
            client_id: required("AZURE_CLIENT_ID")?,
            client_secret: required("AZURE_CLIENT_SECRET")?,
            subscription_id: required("AZURE_SUBSCRIPTION_ID")?,
        };

        let defaults = AzureEnvironment::default();
        let azure_environment = AzureEnvironment {
            resource_manager_url: lookup("AZURE_ENVIRONMENT_URL").unwrap_or(defaults.resource_manager_url),
            authority_url: lookup("AZURE_AUTHORITY_URL").unwrap_or(defaults.authority_url),
        };

        let installation_name = required("INSTALLATION_NAME")?;

        let raw_version = lookup("OPERATOR_VERSION").unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string());
        let operator_version = Version::parse(&raw_version).map_err(|e| {
            ControllerError::InvalidConfig(format!("OPERATOR_VERSION {raw_version:?} is not a semantic version: {e}"))
        })?;

        let metrics_raw = lookup("METRICS_ADDR").unwrap_or_else(|| DEFAULT_METRICS_ADDR.to_string());
        let metrics_addr = metrics_raw
            .parse()
            .map_err(|e| ControllerError::InvalidConfig(format!("METRICS_ADDR {metrics_raw:?} is invalid: {e}")))?;

        Ok(Self {
            azure_credentials,
            azure_environment,
            installation_name,
            operator_version,
            watch_namespace: lookup("WATCH_NAMESPACE").filter(|ns| !ns.is_empty()),
            metrics_addr,
            wait_requeue: seconds(&lookup, "WAIT_REQUEUE_SECONDS", DEFAULT_WAIT_REQUEUE_SECONDS)?,
            steady_requeue: seconds(&lookup, "STEADY_REQUEUE_SECONDS", DEFAULT_STEADY_REQUEUE_SECONDS)?,
            template_dir: PathBuf::from(lookup("TEMPLATE_DIR").unwrap_or_else(|| DEFAULT_TEMPLATE_DIR.to_string())),
        })
    }
}

fn seconds<F>(lookup: &F, key: &str, default: u64) -> Result<Duration, ControllerError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(Duration::from_secs(default)),
        Some(raw) => raw
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| ControllerError::InvalidConfig(format!("{key} {raw:?} is not a number of seconds: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 5] = [
        ("AZURE_TENANT_ID", "tenant"),
        ("AZURE_CLIENT_ID", "client"),
        ("AZURE_CLIENT_SECRET", "secret"),
        ("AZURE_SUBSCRIPTION_ID", "sub"),
        ("INSTALLATION_NAME", "ghost"),
    ];

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(env(&REQUIRED)).unwrap();

        assert_eq!(config.installation_name, "ghost");
        assert_eq!(config.azure_environment, AzureEnvironment::default());
        assert_eq!(config.operator_version, Version::parse(env!("CARGO_PKG_VERSION")).unwrap());
        assert_eq!(config.watch_namespace, None);
        assert_eq!(config.metrics_addr.port(), 8080);
        assert_eq!(config.wait_requeue, Duration::from_secs(30));
        assert_eq!(config.steady_requeue, Duration::from_secs(300));
        assert_eq!(config.template_dir, PathBuf::from("/opt/azure-operator/templates"));
    }

    #[test]
    fn test_overrides() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([
            ("OPERATOR_VERSION", "4.2.0"),
            ("WATCH_NAMESPACE", "giantswarm"),
            ("METRICS_ADDR", "127.0.0.1:9090"),
            ("WAIT_REQUEUE_SECONDS", "5"),
        ]);
        let config = Config::from_lookup(env(&vars)).unwrap();

        assert_eq!(config.operator_version, Version::new(4, 2, 0));
        assert_eq!(config.watch_namespace.as_deref(), Some("giantswarm"));
        assert_eq!(config.metrics_addr.port(), 9090);
        assert_eq!(config.wait_requeue, Duration::from_secs(5));
    }

    #[test]
    fn test_missing_required_variable() {
        let vars: Vec<_> = REQUIRED.iter().copied().filter(|(k, _)| *k != "INSTALLATION_NAME").collect();
        let err = Config::from_lookup(env(&vars)).unwrap_err();
        assert!(matches!(err, ControllerError::InvalidConfig(msg) if msg.contains("INSTALLATION_NAME")));
    }

    #[test]
    fn test_invalid_operator_version() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("OPERATOR_VERSION", "latest"));
        assert!(matches!(
            Config::from_lookup(env(&vars)),
            Err(ControllerError::InvalidConfig(_))
        ));
    }
}
