//! ETCD member disks of the master scale set.
//!
//! Every ETCD member keeps its data on a managed disk named `etcd<N>`,
//! attached at LUN 0 of one master instance. Disks outlive the instances:
//! when a master is reimaged or moves to another zone, the disk (or a
//! snapshot copy of it) is reattached to whichever master comes up next.
//!
//! - `prerequisites`: certificates, disk creation and readiness checks
//! - `disks`: disk creation, selection and zone migration
//! - `attach`: attaching disks to masters
//! - `bootstrap`: DNS record, TLS and env file of a member
//! - `cleanup`: removal of snapshots that were copied back into disks

mod attach;
mod bootstrap;
mod cleanup;
mod disks;
mod prerequisites;

pub use attach::ETCD_DISK_LUN;
pub(crate) use disks::etcd_snapshot;

use crate::error::ControllerError;
use crate::management::ManagementClusterTrait;
use azure_client::AzureClientTrait;
use crds::AzureConfig;
use kube::ResourceExt;
use tenant_client::CertsSearcherTrait;
use tracing::{debug, info};

/// Size of a newly created member disk
pub const ETCD_DISK_SIZE_GB: i32 = 100;

/// Upper bound of ETCD members regardless of the master count
pub const MAX_ETCD_MEMBERS: usize = 3;

/// Number of ETCD members for `masters` master nodes
///
/// ETCD needs an odd member count for quorum, so an even master count leaves
/// one master without a member.
#[must_use]
pub fn members_desired_count(masters: usize) -> usize {
    let odd = if masters % 2 == 0 {
        masters.saturating_sub(1)
    } else {
        masters
    };
    odd.min(MAX_ETCD_MEMBERS)
}

/// Name of the disk of member `index` (1 based)
#[must_use]
pub fn disk_name(index: usize) -> String {
    format!("etcd{index}")
}

/// Name of the snapshot taken from disk `disk`
#[must_use]
pub fn snapshot_name(disk: &str) -> String {
    format!("{disk}-snapshot")
}

/// Manages the ETCD member disks of one cluster
pub struct EtcdDisks<'a> {
    pub(crate) azure: &'a dyn AzureClientTrait,
    pub(crate) certs: &'a dyn CertsSearcherTrait,
    pub(crate) management: &'a dyn ManagementClusterTrait,
    pub(crate) operator_version: &'a str,
}

impl<'a> EtcdDisks<'a> {
    pub fn new(
        azure: &'a dyn AzureClientTrait,
        certs: &'a dyn CertsSearcherTrait,
        management: &'a dyn ManagementClusterTrait,
        operator_version: &'a str,
    ) -> Self {
        Self {
            azure,
            certs,
            management,
            operator_version,
        }
    }

    /// Entry point: attaches disks once the cluster is ready for it
    pub async fn ensure(&self, cr: &AzureConfig) -> Result<(), ControllerError> {
        if !self.verify_prerequisites(cr).await? {
            debug!(
                "ETCD prerequisites of cluster {} not met yet, not attaching disks",
                cr.name_any()
            );
            return Ok(());
        }

        info!("Ensuring ETCD disks are attached for cluster {}", cr.cluster_id());
        self.attach_disks(cr).await?;
        self.cleanup_snapshots(cr).await
    }
}

#[cfg(test)]
mod attach_test;
