//! Tenant Cluster Clients
//!
//! Everything the Azure operator needs from Kubernetes APIs other than its
//! own custom resources:
//!
//! - **Tenant nodes**: list, cordon and delete nodes of a workload cluster
//!   ([`KubeTenantCluster`], built from the `<cluster>-kubeconfig` secret)
//! - **Drain requests**: `DrainerConfig` objects in the management cluster
//!   ([`KubeDrainerClient`])
//! - **ETCD TLS**: member certificate bundles issued from `CertConfig`s
//!   ([`KubeCertsSearcher`])
//!
//! The `test-util` feature adds in-memory mocks of all three.

pub mod certs;
pub mod drainer;
pub mod error;
pub mod node;
pub mod tenant;
#[path = "trait.rs"]
pub mod tenant_trait;
#[cfg(feature = "test-util")]
pub mod mock;

pub use certs::{EtcdCert, KubeCertsSearcher, Tls, CERTS_NAMESPACE};
pub use drainer::KubeDrainerClient;
pub use error::TenantError;
pub use node::{is_node_ready, is_node_unschedulable, node_label, node_name};
pub use tenant::{kubeconfig_secret_name, KubeTenantCluster, KUBECONFIG_SECRET_KEY};
pub use tenant_trait::{CertsSearcherTrait, DrainerClientTrait, TenantClusterTrait};
#[cfg(feature = "test-util")]
pub use mock::{MockCertsSearcher, MockDrainerClient, MockTenantCluster};
