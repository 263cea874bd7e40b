//! Master upgrade state machine.
//!
//! Rolls the master scale set of an `AzureConfig` to a new ARM deployment.
//! Clusters created before ETCD lived on dedicated disks first drain and
//! stop their master and back up its ETCD disk; afterwards the master is
//! moved onto the `etcd1` disk. Every pass runs one stage and stores the
//! next one under `status.resources.masters`.
//!
//! - `backup`: draining, stopping and snapshotting a legacy master
//! - `provision`: submitting and observing the deployment
//! - `upgrade`: updating and reimaging instances to the latest model

mod backup;
mod provision;
mod upgrade;

use super::etcd_disks::EtcdDisks;
use super::{resource_key, Reconciler};
use crate::error::ControllerError;
use crate::state::{ResourceState, StatusTarget};
use crate::state_machine::{Stage, Transition};
use azure_client::{AzureClientTrait, Snapshot, VirtualMachineScaleSetVm};
use crds::label::{DISK_ROLE_ETCD, DISK_ROLE_TAG, NODE_ROLE, NODE_ROLE_MASTER, SNAPSHOT_DISK_NAME_TAG};
use crds::AzureConfig;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::time::Duration;
use tracing::{debug, info};

/// Status key of the masters state
pub const HANDLER: &str = "masters";

/// Member disk backed up before a legacy master is migrated
pub const BACKUP_DISK: &str = "etcd1";

#[must_use]
pub fn master_vmss_name(cluster_id: &str) -> String {
    format!("{cluster_id}-master")
}

#[must_use]
pub fn master_nic_name(cluster_id: &str) -> String {
    format!("{cluster_id}-master-nic")
}

/// Label selector of tenant master nodes
#[must_use]
pub fn master_node_selector() -> String {
    format!("{NODE_ROLE}={NODE_ROLE_MASTER}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MastersStage {
    Empty,
    BackupETCDDisk,
    WaitForMastersToDrain,
    StopMasters,
    EnsureSnapshot,
    DeploymentUninitialized,
    DeploymentInitialized,
    ProvisioningSuccessful,
    ETCDMigrationCheck,
    UpdateMaster,
    ReimageMaster,
    StartMaster,
    ClusterUpgradeRequirementCheck,
    MasterInstancesUpgrading,
    WaitForMastersToBecomeReady,
    DeploymentCompleted,
}

impl Stage for MastersStage {
    const INITIAL: Self = Self::Empty;

    const ALL: &'static [Self] = &[
        Self::Empty,
        Self::BackupETCDDisk,
        Self::WaitForMastersToDrain,
        Self::StopMasters,
        Self::EnsureSnapshot,
        Self::DeploymentUninitialized,
        Self::DeploymentInitialized,
        Self::ProvisioningSuccessful,
        Self::ETCDMigrationCheck,
        Self::UpdateMaster,
        Self::ReimageMaster,
        Self::StartMaster,
        Self::ClusterUpgradeRequirementCheck,
        Self::MasterInstancesUpgrading,
        Self::WaitForMastersToBecomeReady,
        Self::DeploymentCompleted,
    ];

    fn as_str(self) -> &'static str {
        match self {
            Self::Empty => "",
            Self::BackupETCDDisk => "BackupETCDDisk",
            Self::WaitForMastersToDrain => "WaitForMastersToDrain",
            Self::StopMasters => "StopMasters",
            Self::EnsureSnapshot => "EnsureSnapshot",
            Self::DeploymentUninitialized => "DeploymentUninitialized",
            Self::DeploymentInitialized => "DeploymentInitialized",
            Self::ProvisioningSuccessful => "ProvisioningSuccessful",
            Self::ETCDMigrationCheck => "ETCDMigrationCheck",
            Self::UpdateMaster => "UpdateMaster",
            Self::ReimageMaster => "ReimageMaster",
            Self::StartMaster => "StartMaster",
            Self::ClusterUpgradeRequirementCheck => "ClusterUpgradeRequirementCheck",
            Self::MasterInstancesUpgrading => "MasterInstancesUpgrading",
            Self::WaitForMastersToBecomeReady => "WaitForMastersToBecomeReady",
            Self::DeploymentCompleted => "DeploymentCompleted",
        }
    }

    fn successors(self) -> &'static [Self] {
        match self {
            Self::Empty => &[Self::BackupETCDDisk, Self::DeploymentUninitialized],
            Self::BackupETCDDisk => &[Self::WaitForMastersToDrain],
            Self::WaitForMastersToDrain => &[Self::StopMasters],
            Self::StopMasters => &[Self::EnsureSnapshot],
            Self::EnsureSnapshot => &[Self::DeploymentUninitialized],
            Self::DeploymentUninitialized => &[Self::DeploymentInitialized, Self::DeploymentCompleted],
            Self::DeploymentInitialized => &[
                Self::ETCDMigrationCheck,
                Self::ProvisioningSuccessful,
                Self::DeploymentUninitialized,
            ],
            Self::ProvisioningSuccessful => &[Self::ClusterUpgradeRequirementCheck],
            Self::ETCDMigrationCheck => &[Self::UpdateMaster, Self::ClusterUpgradeRequirementCheck],
            Self::UpdateMaster => &[Self::ReimageMaster],
            Self::ReimageMaster => &[Self::StartMaster],
            Self::StartMaster => &[Self::ClusterUpgradeRequirementCheck],
            Self::ClusterUpgradeRequirementCheck => &[Self::MasterInstancesUpgrading, Self::DeploymentCompleted],
            Self::MasterInstancesUpgrading => &[Self::WaitForMastersToBecomeReady],
            Self::WaitForMastersToBecomeReady => &[Self::DeploymentCompleted],
            Self::DeploymentCompleted => &[Self::DeploymentUninitialized],
        }
    }
}

/// What a masters stage handler works on
pub(crate) struct MastersContext<'a> {
    pub cr: &'a AzureConfig,
    pub azure: &'a dyn AzureClientTrait,
    pub resource_group: &'a str,
    pub vmss: String,
}

impl<'a> MastersContext<'a> {
    pub fn new(cr: &'a AzureConfig, azure: &'a dyn AzureClientTrait) -> Self {
        Self {
            cr,
            azure,
            resource_group: cr.cluster_id(),
            vmss: master_vmss_name(cr.cluster_id()),
        }
    }

    pub async fn instances(&self) -> Result<Vec<VirtualMachineScaleSetVm>, ControllerError> {
        Ok(self.azure.list_vmss_vms(self.resource_group, &self.vmss).await?)
    }

    /// The master every single-instance step operates on
    pub async fn first_instance(&self) -> Result<VirtualMachineScaleSetVm, ControllerError> {
        self.instances()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ControllerError::ExecutionFailed(format!("scale set {} has no instances", self.vmss)))
    }

    /// Snapshot of the legacy ETCD disk, if one was taken
    pub async fn etcd_backup(&self) -> Result<Option<Snapshot>, ControllerError> {
        Ok(self
            .azure
            .list_snapshots(self.resource_group)
            .await?
            .into_iter()
            .find(|s| s.has_tag(DISK_ROLE_TAG, DISK_ROLE_ETCD) && s.has_tag(SNAPSHOT_DISK_NAME_TAG, BACKUP_DISK)))
    }

    /// Updates one instance to the latest model and waits for it
    pub async fn update_instance(&self, instance_id: &str) -> Result<(), ControllerError> {
        info!("Updating instance {} of {} to the latest model", instance_id, self.vmss);
        let operation = self
            .azure
            .update_vmss_instances(self.resource_group, &self.vmss, &[instance_id.to_string()])
            .await?;
        self.azure.wait_for_completion(&operation).await?;
        Ok(())
    }

    /// Reimages one instance and waits for it
    pub async fn reimage_instance(&self, instance_id: &str) -> Result<(), ControllerError> {
        info!("Reimaging instance {} of {}", instance_id, self.vmss);
        let operation = self
            .azure
            .reimage_vmss_vm(self.resource_group, &self.vmss, instance_id)
            .await?;
        self.azure.wait_for_completion(&operation).await?;
        Ok(())
    }
}

impl Reconciler {
    /// Reconciles an `AzureConfig`: ETCD disks, masters, then network peering
    pub async fn reconcile_azure_config(&self, cr: &AzureConfig) -> Result<Action, ControllerError> {
        if cr.master_count() < 1 {
            return Err(ControllerError::InvalidConfig(format!(
                "AzureConfig {} declares no masters",
                resource_key(cr)
            )));
        }
        info!("Reconciling AzureConfig {}", resource_key(cr));

        let azure = self.clients.azure_client(&cr.spec.azure.credential_secret).await?;
        let version = self.operator_version();

        EtcdDisks::new(azure.as_ref(), self.certs.as_ref(), self.management.as_ref(), &version)
            .ensure(cr)
            .await?;

        let requeue = self.ensure_masters(cr, azure.as_ref()).await?;

        if cr.spec.azure.vnet_peering {
            self.ensure_vnet_peering(cr, azure.as_ref()).await?;
        }

        Ok(Action::requeue(requeue))
    }

    /// Runs the current masters stage and stores the next one
    pub(crate) async fn ensure_masters(
        &self,
        cr: &AzureConfig,
        azure: &dyn AzureClientTrait,
    ) -> Result<Duration, ControllerError> {
        let target = StatusTarget::azure_config(cr);
        let mut state = ResourceState::load(cr.status.as_ref().map(|s| &s.resources), HANDLER);
        let stage: MastersStage = state.stage();
        debug!("Masters of {} in stage {:?}", cr.name_any(), stage);

        let ctx = MastersContext::new(cr, azure);
        let transition = self.handle_masters_stage(&ctx, stage, &mut state).await?;
        self.persist(HANDLER, &target, &mut state, stage, transition).await
    }

    async fn handle_masters_stage(
        &self,
        ctx: &MastersContext<'_>,
        stage: MastersStage,
        state: &mut ResourceState,
    ) -> Result<Transition<MastersStage>, ControllerError> {
        match stage {
            MastersStage::Empty => self.masters_empty(ctx).await,
            MastersStage::BackupETCDDisk => self.backup_etcd_disk(ctx).await,
            MastersStage::WaitForMastersToDrain => self.wait_for_masters_to_drain(ctx).await,
            MastersStage::StopMasters => self.stop_masters(ctx).await,
            MastersStage::EnsureSnapshot => self.ensure_snapshot(ctx).await,
            MastersStage::DeploymentUninitialized => self.masters_deployment_uninitialized(ctx, state).await,
            MastersStage::DeploymentInitialized => self.masters_deployment_initialized(ctx, state).await,
            MastersStage::ProvisioningSuccessful => {
                Ok(Transition::advance(MastersStage::ClusterUpgradeRequirementCheck))
            }
            MastersStage::ETCDMigrationCheck => Ok(Transition::advance(MastersStage::UpdateMaster)),
            MastersStage::UpdateMaster => self.update_master(ctx).await,
            MastersStage::ReimageMaster => self.reimage_master(ctx).await,
            MastersStage::StartMaster => self.start_master(ctx).await,
            MastersStage::ClusterUpgradeRequirementCheck => self.cluster_upgrade_requirement_check(ctx).await,
            MastersStage::MasterInstancesUpgrading => self.master_instances_upgrading(ctx).await,
            MastersStage::WaitForMastersToBecomeReady => self.wait_for_masters_to_become_ready(ctx).await,
            MastersStage::DeploymentCompleted => self.masters_deployment_completed(ctx, state).await,
        }
    }
}
