//! Mock tenant clients for unit testing
//!
//! In-memory implementations of [`TenantClusterTrait`],
//! [`DrainerClientTrait`] and [`CertsSearcherTrait`]. Each records its
//! mutating calls so tests can assert what the state machines did.

use crate::certs::{EtcdCert, Tls};
use crate::error::TenantError;
use crate::tenant_trait::{CertsSearcherTrait, DrainerClientTrait, TenantClusterTrait};
use crds::{label, DrainerConfig};
use k8s_openapi::api::core::v1::{Node, NodeSpec};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Matches `key=value[,key=value]` selectors against node labels
fn matches_selector(node: &Node, selector: &str) -> bool {
    let labels = node.metadata.labels.clone().unwrap_or_default();
    selector
        .split(',')
        .filter(|term| !term.is_empty())
        .all(|term| match term.split_once('=') {
            Some((key, value)) => labels.get(key).is_some_and(|v| v == value),
            None => labels.contains_key(term),
        })
}

/// Mock tenant cluster
#[derive(Clone, Default)]
pub struct MockTenantCluster {
    pub(crate) nodes: Arc<Mutex<BTreeMap<String, Node>>>,
    pub(crate) cordoned: Arc<Mutex<Vec<String>>>,
    pub(crate) deleted: Arc<Mutex<Vec<String>>>,
    pub(crate) failing_cordons: Arc<Mutex<HashSet<String>>>,
}

impl MockTenantCluster {
    /// Create an empty mock tenant cluster
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node (for test setup)
    pub fn add_node(&self, node: Node) {
        let name = node.metadata.name.clone().unwrap_or_default();
        lock(&self.nodes).insert(name, node);
    }

    /// Current state of a node
    pub fn node(&self, name: &str) -> Option<Node> {
        lock(&self.nodes).get(name).cloned()
    }

    /// Makes cordoning `name` fail with a server error
    pub fn fail_cordon(&self, name: impl Into<String>) {
        lock(&self.failing_cordons).insert(name.into());
    }

    /// Nodes patched unschedulable, in order
    pub fn cordoned(&self) -> Vec<String> {
        lock(&self.cordoned).clone()
    }

    /// Nodes deleted, in order
    pub fn deleted(&self) -> Vec<String> {
        lock(&self.deleted).clone()
    }
}

#[async_trait::async_trait]
impl TenantClusterTrait for MockTenantCluster {
    async fn list_nodes(&self, label_selector: Option<&str>) -> Result<Vec<Node>, TenantError> {
        Ok(lock(&self.nodes)
            .values()
            .filter(|n| label_selector.is_none_or(|s| matches_selector(n, s)))
            .cloned()
            .collect())
    }

    async fn cordon_node(&self, name: &str) -> Result<(), TenantError> {
        if lock(&self.failing_cordons).contains(name) {
            return Err(TenantError::ApiNotAvailable(format!("cordon {name} failed")));
        }
        let mut nodes = lock(&self.nodes);
        let node = nodes
            .get_mut(name)
            .ok_or_else(|| TenantError::NotFound(format!("node {name}")))?;
        node.spec.get_or_insert_with(NodeSpec::default).unschedulable = Some(true);
        lock(&self.cordoned).push(name.to_string());
        Ok(())
    }

    async fn delete_node(&self, name: &str) -> Result<(), TenantError> {
        if lock(&self.nodes).remove(name).is_none() {
            return Err(TenantError::NotFound(format!("node {name}")));
        }
        lock(&self.deleted).push(name.to_string());
        Ok(())
    }
}

/// Mock drainer config client
#[derive(Clone, Default)]
pub struct MockDrainerClient {
    pub(crate) configs: Arc<Mutex<BTreeMap<(String, String), DrainerConfig>>>,
    pub(crate) deleted: Arc<Mutex<Vec<String>>>,
}

impl MockDrainerClient {
    /// Create an empty mock drainer client
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a drainer config (for test setup)
    pub fn add(&self, config: DrainerConfig) {
        let key = (
            config.metadata.namespace.clone().unwrap_or_default(),
            config.metadata.name.clone().unwrap_or_default(),
        );
        lock(&self.configs).insert(key, config);
    }

    /// All stored drainer configs
    pub fn configs(&self) -> Vec<DrainerConfig> {
        lock(&self.configs).values().cloned().collect()
    }

    /// Deleted drainer configs as `namespace/name`
    pub fn deleted(&self) -> Vec<String> {
        lock(&self.deleted).clone()
    }
}

#[async_trait::async_trait]
impl DrainerClientTrait for MockDrainerClient {
    async fn create_drainer_config(&self, config: &DrainerConfig) -> Result<DrainerConfig, TenantError> {
        let key = (
            config.metadata.namespace.clone().unwrap_or_default(),
            config.metadata.name.clone().unwrap_or_default(),
        );
        let mut configs = lock(&self.configs);
        if configs.contains_key(&key) {
            return Err(TenantError::AlreadyExists(format!("drainer config {}/{}", key.0, key.1)));
        }
        configs.insert(key, config.clone());
        Ok(config.clone())
    }

    async fn list_drainer_configs(&self, namespace: &str, cluster_id: &str) -> Result<Vec<DrainerConfig>, TenantError> {
        Ok(lock(&self.configs)
            .iter()
            .filter(|((ns, _), dc)| {
                ns == namespace
                    && dc
                        .metadata
                        .labels
                        .as_ref()
                        .and_then(|l| l.get(label::CLUSTER))
                        .is_some_and(|v| v == cluster_id)
            })
            .map(|(_, dc)| dc.clone())
            .collect())
    }

    async fn delete_drainer_config(&self, namespace: &str, name: &str) -> Result<(), TenantError> {
        let key = (namespace.to_string(), name.to_string());
        if lock(&self.configs).remove(&key).is_none() {
            return Err(TenantError::NotFound(format!("drainer config {namespace}/{name}")));
        }
        lock(&self.deleted).push(format!("{namespace}/{name}"));
        Ok(())
    }
}

/// Mock certificate searcher
#[derive(Clone, Default)]
pub struct MockCertsSearcher {
    pub(crate) bundles: Arc<Mutex<HashMap<(String, EtcdCert), Tls>>>,
}

impl MockCertsSearcher {
    /// Create a searcher without any certificates
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a bundle available (for test setup)
    pub fn add(&self, cluster_id: impl Into<String>, cert: EtcdCert, tls: Tls) {
        lock(&self.bundles).insert((cluster_id.into(), cert), tls);
    }
}

#[async_trait::async_trait]
impl CertsSearcherTrait for MockCertsSearcher {
    async fn search_tls(&self, cluster_id: &str, cert: EtcdCert) -> Result<Tls, TenantError> {
        lock(&self.bundles)
            .get(&(cluster_id.to_string(), cert))
            .cloned()
            .ok_or_else(|| TenantError::CertUnavailable(format!("{cluster_id}-{cert}")))
    }
}
