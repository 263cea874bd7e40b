//! Label, tag and annotation keys shared between the operator and the
//! resources it manages.

/// Cluster ID label on management cluster resources
pub const CLUSTER: &str = "giantswarm.io/cluster";
/// Certificate component label on CertConfigs
pub const CERTIFICATE: &str = "giantswarm.io/certificate";
/// Manager label
pub const MANAGED_BY: &str = "giantswarm.io/managed-by";
/// Organization label
pub const ORGANIZATION: &str = "giantswarm.io/organization";
/// Machine pool label on tenant nodes
pub const MACHINE_POOL: &str = "giantswarm.io/machine-pool";
/// Operator version label on tenant nodes
pub const OPERATOR_VERSION: &str = "azure-operator.giantswarm.io/version";
/// Role label on tenant nodes
pub const NODE_ROLE: &str = "kubernetes.io/role";
/// Value of [`NODE_ROLE`] on masters
pub const NODE_ROLE_MASTER: &str = "master";

/// Azure tag marking ETCD disks and snapshots
pub const DISK_ROLE_TAG: &str = "gs-role";
/// Value of [`DISK_ROLE_TAG`]
pub const DISK_ROLE_ETCD: &str = "etcd";
/// Azure tag naming the disk a snapshot was taken from
pub const SNAPSHOT_DISK_NAME_TAG: &str = "gs-disk-name";
/// Azure tag carrying the operator version that deployed a scale set or VM
pub const OPERATOR_VERSION_TAG: &str = "gs-operator-version";
/// Scale set tag the cluster autoscaler uses to discover node groups
pub const AUTOSCALER_ENABLED_TAG: &str = "cluster-autoscaler-enabled";

/// Name this operator uses in `managed-by` labels
pub const OPERATOR_NAME: &str = "azure-operator";
