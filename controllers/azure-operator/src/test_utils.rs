//! Test utilities for unit testing reconcilers
//!
//! This module provides builders for the custom resources and Azure models,
//! in-memory stand-ins for the collaborators the client crates do not mock,
//! and [`TestContext`] wiring all of them into a [`Reconciler`].

use crate::clients::ClientFactory;
use crate::error::ControllerError;
use crate::management::ManagementClusterTrait;
use crate::metrics::Metrics;
use crate::reconciler::{Clients, Reconciler, Settings};
use crate::state::{StatusStore, StatusTarget};
use crate::templates::{masters_parameters, node_pool_parameters, DeploymentTemplate, TemplateSource};
use azure_client::{
    AzureClientTrait, AzureError, MockAzureClient, Sku, VirtualMachineScaleSet, VirtualMachineScaleSetVm, VmProperties,
    PROVISIONING_SUCCEEDED,
};
use crds::label::{MACHINE_POOL, OPERATOR_VERSION, OPERATOR_VERSION_TAG};
use crds::*;
use k8s_openapi::api::core::v1::{Node, NodeCondition, NodeStatus};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference, Time};
use semver::Version;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tenant_client::{
    CertsSearcherTrait, DrainerClientTrait, MockCertsSearcher, MockDrainerClient, MockTenantCluster, TenantClusterTrait,
    Tls,
};

/// Operator version of the test reconciler
pub const TEST_OPERATOR_VERSION: &str = "5.0.0";
/// Version of resources deployed by an older operator
pub const OLD_OPERATOR_VERSION: &str = "4.2.0";
pub const TEST_INSTALLATION: &str = "ghost";
pub const TEST_NAMESPACE: &str = "default";
pub const TEST_VM_SIZE: &str = "Standard_D4s_v3";
pub const TEST_WAIT_REQUEUE: Duration = Duration::from_secs(30);
pub const TEST_STEADY_REQUEUE: Duration = Duration::from_secs(300);

/// Helper to create test AzureConfig CRD
pub fn create_test_azure_config(cluster_id: &str, masters: usize, zones: &[u32]) -> AzureConfig {
    let mut cr = AzureConfig::new(
        cluster_id,
        AzureConfigSpec {
            cluster: ClusterSpec {
                id: cluster_id.to_string(),
                dns_zone: format!("{cluster_id}.k8s.westeurope.example.io"),
                etcd: EtcdSpec {
                    domain: format!("etcd.{cluster_id}.k8s.westeurope.example.io"),
                },
                organization: Some("acme".to_string()),
            },
            azure: AzureSpec {
                location: "westeurope".to_string(),
                masters: vec![
                    NodeSpec {
                        vm_size: TEST_VM_SIZE.to_string(),
                    };
                    masters
                ],
                workers: Vec::new(),
                availability_zones: zones.to_vec(),
                credential_secret: CredentialSecret {
                    name: format!("credential-{cluster_id}"),
                    namespace: "giantswarm".to_string(),
                },
                vnet_peering: false,
            },
        },
    );
    cr.metadata.namespace = Some(TEST_NAMESPACE.to_string());
    cr.metadata.resource_version = Some("1".to_string());
    cr
}

/// Handler map holding `stage` plus any extra `values`
pub fn create_test_statuses(handler: &str, stage: &str, values: &[(&str, &str)]) -> ResourceStatuses {
    let mut map: BTreeMap<String, String> = values
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    map.insert(STAGE_KEY.to_string(), stage.to_string());
    BTreeMap::from([(handler.to_string(), map)])
}

/// `cr` with its masters state set to `stage`
pub fn with_masters_stage(mut cr: AzureConfig, stage: &str) -> AzureConfig {
    cr.status = Some(AzureConfigStatus {
        resources: create_test_statuses(crate::reconciler::masters::HANDLER, stage, &[]),
        conditions: Vec::new(),
    });
    cr
}

/// Helper to create test MachinePool CRD
pub fn create_test_machine_pool(name: &str, cluster_id: &str, replicas: Option<i32>) -> MachinePool {
    let mut pool = MachinePool::new(
        name,
        MachinePoolSpec {
            cluster_name: cluster_id.to_string(),
            replicas,
        },
    );
    pool.metadata.namespace = Some(TEST_NAMESPACE.to_string());
    pool
}

/// Helper to create test AzureMachinePool CRD, owned by MachinePool `owner`
pub fn create_test_azure_machine_pool(name: &str, owner: Option<&str>) -> AzureMachinePool {
    let mut pool = AzureMachinePool::new(
        name,
        AzureMachinePoolSpec {
            location: "westeurope".to_string(),
            template: AzureMachineTemplate {
                vm_size: TEST_VM_SIZE.to_string(),
                data_disk_size_gb: Some(50),
            },
        },
    );
    pool.metadata.namespace = Some(TEST_NAMESPACE.to_string());
    pool.metadata.resource_version = Some("1".to_string());
    pool.metadata.owner_references = owner.map(|owner| {
        vec![OwnerReference {
            api_version: "exp.cluster.x-k8s.io/v1alpha3".to_string(),
            kind: "MachinePool".to_string(),
            name: owner.to_string(),
            uid: format!("uid-{owner}"),
            ..Default::default()
        }]
    });
    pool
}

/// `pool` with its node pool state set to `stage`
pub fn with_pool_stage(mut pool: AzureMachinePool, stage: &str) -> AzureMachinePool {
    pool.status = Some(AzureMachinePoolStatus {
        resources: create_test_statuses(crate::reconciler::nodepool::HANDLER, stage, &[]),
        ..Default::default()
    });
    pool
}

/// Helper to create test Cluster API Cluster
pub fn create_test_cluster(name: &str) -> Cluster {
    let mut cluster = Cluster::new(name, CapiClusterSpec { paused: false });
    cluster.metadata.namespace = Some(TEST_NAMESPACE.to_string());
    cluster
}

/// Same cluster, marked for deletion
pub fn deleting(mut cluster: Cluster) -> Cluster {
    let since: Time = serde_json::from_value(json!("2024-05-01T12:00:00Z")).unwrap();
    cluster.metadata.deletion_timestamp = Some(since);
    cluster
}

/// Helper to create a tenant node
pub fn create_test_node(name: &str, labels: &[(&str, &str)], ready: bool) -> Node {
    Node {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: Some(
                labels
                    .iter()
                    .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                    .collect(),
            ),
            ..Default::default()
        },
        spec: None,
        status: Some(NodeStatus {
            conditions: Some(vec![NodeCondition {
                type_: "Ready".to_string(),
                status: if ready { "True" } else { "False" }.to_string(),
                ..Default::default()
            }]),
            ..Default::default()
        }),
    }
}

/// Tenant master node
pub fn create_test_master_node(name: &str, ready: bool) -> Node {
    create_test_node(name, &[("kubernetes.io/role", "master")], ready)
}

/// Tenant worker node of `pool` labelled with operator `version`
pub fn create_test_worker_node(name: &str, pool: &str, version: &str, ready: bool) -> Node {
    create_test_node(name, &[(MACHINE_POOL, pool), (OPERATOR_VERSION, version)], ready)
}

/// Helper to create a provisioned scale set instance on the latest model
pub fn create_test_vm(instance_id: &str, zone: Option<&str>) -> VirtualMachineScaleSetVm {
    VirtualMachineScaleSetVm {
        name: Some(format!("vm_{instance_id}")),
        instance_id: instance_id.to_string(),
        location: "westeurope".to_string(),
        tags: HashMap::from([(OPERATOR_VERSION_TAG.to_string(), TEST_OPERATOR_VERSION.to_string())]),
        zones: zone.map(|z| vec![z.to_string()]).unwrap_or_default(),
        sku: Some(Sku {
            name: Some(TEST_VM_SIZE.to_string()),
            tier: Some("Standard".to_string()),
            capacity: None,
        }),
        properties: VmProperties {
            latest_model_applied: Some(true),
            provisioning_state: Some(PROVISIONING_SUCCEEDED.to_string()),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Same instance, running an outdated model
pub fn outdated(mut vm: VirtualMachineScaleSetVm) -> VirtualMachineScaleSetVm {
    vm.properties.latest_model_applied = Some(false);
    vm
}

/// Helper to create a scale set deployed by operator `version`
pub fn create_test_vmss(capacity: i64, version: &str) -> VirtualMachineScaleSet {
    VirtualMachineScaleSet {
        location: "westeurope".to_string(),
        tags: HashMap::from([(OPERATOR_VERSION_TAG.to_string(), version.to_string())]),
        sku: Some(Sku {
            name: Some(TEST_VM_SIZE.to_string()),
            tier: Some("Standard".to_string()),
            capacity: Some(capacity),
        }),
        ..Default::default()
    }
}

pub fn create_test_tls(member: &str) -> Tls {
    Tls {
        ca: format!("{member}-ca"),
        crt: format!("{member}-crt"),
        key: format!("{member}-key"),
    }
}

/// [`StatusStore`] keeping the last saved map per object and handler
#[derive(Default)]
pub struct MemoryStatusStore {
    saved: Mutex<BTreeMap<(String, String), BTreeMap<String, String>>>,
    saves: AtomicUsize,
    conflict: AtomicBool,
}

impl MemoryStatusStore {
    /// Make every save fail as if the object changed concurrently
    pub fn fail_with_conflict(&self, conflict: bool) {
        self.conflict.store(conflict, Ordering::SeqCst);
    }

    /// Last map saved for `handler` of object `name`
    pub fn saved(&self, name: &str, handler: &str) -> Option<BTreeMap<String, String>> {
        self.saved
            .lock()
            .unwrap()
            .get(&(name.to_string(), handler.to_string()))
            .cloned()
    }

    /// All handler maps saved for object `name`
    pub fn statuses(&self, name: &str) -> ResourceStatuses {
        self.saved
            .lock()
            .unwrap()
            .iter()
            .filter(|((object, _), _)| object == name)
            .map(|((_, handler), values)| (handler.clone(), values.clone()))
            .collect()
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl StatusStore for MemoryStatusStore {
    async fn save(
        &self,
        target: &StatusTarget,
        handler: &str,
        values: &BTreeMap<String, String>,
    ) -> Result<(), ControllerError> {
        if self.conflict.load(Ordering::SeqCst) {
            return Err(AzureError::Conflict(format!("{}/{} was modified", target.namespace, target.name)).into());
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.saved
            .lock()
            .unwrap()
            .insert((target.name.clone(), handler.to_string()), values.clone());
        Ok(())
    }
}

/// [`ClientFactory`] handing out fixed mocks
pub struct StaticClientFactory {
    pub azure: MockAzureClient,
    pub control_plane: MockAzureClient,
    pub tenant: MockTenantCluster,
    tenant_available: AtomicBool,
}

impl StaticClientFactory {
    /// Toggle whether the tenant API answers
    pub fn set_tenant_available(&self, available: bool) {
        self.tenant_available.store(available, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl ClientFactory for StaticClientFactory {
    async fn azure_client(&self, _secret: &CredentialSecret) -> Result<Arc<dyn AzureClientTrait>, ControllerError> {
        Ok(Arc::new(self.azure.clone()))
    }

    fn control_plane_client(&self) -> Arc<dyn AzureClientTrait> {
        Arc::new(self.control_plane.clone())
    }

    async fn tenant_client(
        &self,
        _namespace: &str,
        _cluster_id: &str,
    ) -> Result<Option<Arc<dyn TenantClusterTrait>>, ControllerError> {
        if !self.tenant_available.load(Ordering::SeqCst) {
            return Ok(None);
        }
        Ok(Some(Arc::new(self.tenant.clone())))
    }
}

/// [`ManagementClusterTrait`] over in-memory objects keyed by name
#[derive(Default)]
pub struct MemoryManagement {
    machine_pools: Mutex<HashMap<String, MachinePool>>,
    clusters: Mutex<HashMap<String, Cluster>>,
    azure_configs: Mutex<HashMap<String, AzureConfig>>,
    cert_configs: Mutex<BTreeMap<String, CertConfig>>,
}

impl MemoryManagement {
    pub fn add_machine_pool(&self, pool: MachinePool) {
        let name = pool.metadata.name.clone().unwrap_or_default();
        self.machine_pools.lock().unwrap().insert(name, pool);
    }

    pub fn add_cluster(&self, cluster: Cluster) {
        let name = cluster.metadata.name.clone().unwrap_or_default();
        self.clusters.lock().unwrap().insert(name, cluster);
    }

    pub fn add_azure_config(&self, cr: AzureConfig) {
        let name = cr.metadata.name.clone().unwrap_or_default();
        self.azure_configs.lock().unwrap().insert(name, cr);
    }

    /// Names of the requested certificates
    pub fn cert_configs(&self) -> Vec<String> {
        self.cert_configs.lock().unwrap().keys().cloned().collect()
    }
}

#[async_trait::async_trait]
impl ManagementClusterTrait for MemoryManagement {
    async fn get_machine_pool(&self, _namespace: &str, name: &str) -> Result<Option<MachinePool>, ControllerError> {
        Ok(self.machine_pools.lock().unwrap().get(name).cloned())
    }

    async fn get_cluster(&self, _namespace: &str, name: &str) -> Result<Option<Cluster>, ControllerError> {
        Ok(self.clusters.lock().unwrap().get(name).cloned())
    }

    async fn get_azure_config(&self, _namespace: &str, name: &str) -> Result<Option<AzureConfig>, ControllerError> {
        Ok(self.azure_configs.lock().unwrap().get(name).cloned())
    }

    async fn ensure_cert_config(&self, cert_config: &CertConfig) -> Result<(), ControllerError> {
        let name = cert_config.metadata.name.clone().unwrap_or_default();
        self.cert_configs
            .lock()
            .unwrap()
            .entry(name)
            .or_insert_with(|| cert_config.clone());
        Ok(())
    }
}

/// [`TemplateSource`] with a replaceable template document
///
/// Parameters are derived from the resources like the file source does, so
/// a new operator version changes the parameters checksum.
pub struct StaticTemplateSource {
    template: Mutex<Value>,
}

impl Default for StaticTemplateSource {
    fn default() -> Self {
        Self {
            template: Mutex::new(json!({"contentVersion": "1.0.0.0", "resources": []})),
        }
    }
}

impl StaticTemplateSource {
    pub fn set_template(&self, template: Value) {
        *self.template.lock().unwrap() = template;
    }
}

#[async_trait::async_trait]
impl TemplateSource for StaticTemplateSource {
    async fn masters(&self, cr: &AzureConfig, operator_version: &str) -> Result<DeploymentTemplate, ControllerError> {
        Ok(DeploymentTemplate {
            template: self.template.lock().unwrap().clone(),
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
            template: self.template.lock().unwrap().clone(),
            parameters: node_pool_parameters(pool, machine_pool, operator_version),
        })
    }
}

/// A reconciler wired to mocks, with handles to all of them
pub struct TestContext {
    pub reconciler: Reconciler,
    pub factory: Arc<StaticClientFactory>,
    pub azure: MockAzureClient,
    pub control_plane: MockAzureClient,
    pub tenant: MockTenantCluster,
    pub drainer: MockDrainerClient,
    pub certs: MockCertsSearcher,
    pub management: Arc<MemoryManagement>,
    pub status: Arc<MemoryStatusStore>,
    pub templates: Arc<StaticTemplateSource>,
    pub metrics: Arc<Metrics>,
}

/// Helper to create a reconciler at [`TEST_OPERATOR_VERSION`] over fresh mocks
pub fn create_test_context() -> TestContext {
    let azure = MockAzureClient::new("sub-tenant");
    let control_plane = MockAzureClient::new("sub-control-plane");
    let tenant = MockTenantCluster::new();
    let drainer = MockDrainerClient::new();
    let certs = MockCertsSearcher::new();
    let management = Arc::new(MemoryManagement::default());
    let status = Arc::new(MemoryStatusStore::default());
    let templates = Arc::new(StaticTemplateSource::default());
    let metrics = Arc::new(Metrics::new().unwrap());
    let factory = Arc::new(StaticClientFactory {
        azure: azure.clone(),
        control_plane: control_plane.clone(),
        tenant: tenant.clone(),
        tenant_available: AtomicBool::new(true),
    });

    let settings = Settings {
        installation_name: TEST_INSTALLATION.to_string(),
        operator_version: Version::parse(TEST_OPERATOR_VERSION).unwrap(),
        wait_requeue: TEST_WAIT_REQUEUE,
        steady_requeue: TEST_STEADY_REQUEUE,
    };
    let clients = Clients {
        factory: factory.clone() as Arc<dyn ClientFactory>,
        management: management.clone() as Arc<dyn ManagementClusterTrait>,
        drainer: Arc::new(drainer.clone()) as Arc<dyn DrainerClientTrait>,
        certs: Arc::new(certs.clone()) as Arc<dyn CertsSearcherTrait>,
        status_store: status.clone() as Arc<dyn StatusStore>,
        templates: templates.clone() as Arc<dyn TemplateSource>,
    };

    TestContext {
        reconciler: Reconciler::new(settings, clients, metrics.clone()),
        factory,
        azure,
        control_plane,
        tenant,
        drainer,
        certs,
        management,
        status,
        templates,
        metrics,
    }
}

impl TestContext {
    /// Runs one masters pass and carries the saved state into `cr`
    pub async fn run_masters(&self, cr: &mut AzureConfig) -> Result<Duration, ControllerError> {
        let requeue = self.reconciler.ensure_masters(cr, &self.azure).await?;
        self.sync_azure_config(cr);
        Ok(requeue)
    }

    /// Runs one node pool pass and carries the saved state into `pool`
    pub async fn run_node_pool(
        &self,
        pool: &mut AzureMachinePool,
        machine_pool: &MachinePool,
    ) -> Result<Duration, ControllerError> {
        let requeue = self.reconciler.ensure_node_pool(pool, machine_pool, &self.azure).await?;
        self.sync_pool(pool);
        Ok(requeue)
    }

    pub fn sync_azure_config(&self, cr: &mut AzureConfig) {
        let statuses = self.status.statuses(&cr.metadata.name.clone().unwrap_or_default());
        cr.status.get_or_insert_with(Default::default).resources.extend(statuses);
    }

    pub fn sync_pool(&self, pool: &mut AzureMachinePool) {
        let statuses = self.status.statuses(&pool.metadata.name.clone().unwrap_or_default());
        pool.status.get_or_insert_with(Default::default).resources.extend(statuses);
    }

    /// Stage last saved by `handler` for object `name`
    pub fn stage(&self, name: &str, handler: &str) -> Option<String> {
        self.status
            .saved(name, handler)
            .and_then(|values| values.get(STAGE_KEY).cloned())
    }
}
