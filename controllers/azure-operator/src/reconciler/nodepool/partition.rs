//! Split of a pool's workers into outdated and up to date ones.

use azure_client::VirtualMachineScaleSetVm;
use crds::label::OPERATOR_VERSION;
use k8s_openapi::api::core::v1::Node;
use semver::Version;
use std::collections::HashMap;
use tenant_client::{node_label, node_name};
use tracing::{debug, warn};

/// Width of the base 36 instance suffix of a computer name
const INSTANCE_SUFFIX_WIDTH: usize = 6;

/// Base 36 rendering of a numeric instance ID, zero padded
fn base36(instance_id: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut n = instance_id;
    let mut out = Vec::new();
    loop {
        out.push(DIGITS[usize::try_from(n % 36).unwrap_or_default()]);
        n /= 36;
        if n == 0 {
            break;
        }
    }
    out.reverse();
    let digits = String::from_utf8(out).unwrap_or_default();
    format!("{digits:0>INSTANCE_SUFFIX_WIDTH$}")
}

/// Tenant node name of instance `instance_id` of scale set `vmss`
///
/// Azure names scale set machines `<prefix><base36 instance id>`, padded to
/// six characters. An ID that is not a number is appended verbatim.
#[must_use]
pub fn worker_node_name(vmss: &str, instance_id: &str) -> String {
    match instance_id.parse::<u64>() {
        Ok(id) => format!("{vmss}-{}", base36(id)),
        Err(_) => format!("{vmss}-{instance_id}"),
    }
}

/// A scale set instance with its tenant node
#[derive(Debug, Clone)]
pub struct Worker {
    pub instance: VirtualMachineScaleSetVm,
    pub node: Node,
}

impl Worker {
    #[must_use]
    pub fn node_name(&self) -> &str {
        node_name(&self.node)
    }
}

/// Workers of a pool by model freshness
///
/// Workers whose node carries no usable version label are in neither list.
#[derive(Debug, Clone, Default)]
pub struct Partition {
    pub old: Vec<Worker>,
    pub new: Vec<Worker>,
}

impl Partition {
    /// Sorts `instances` by the version label of their node
    ///
    /// A worker is old when its node label is older than `operator_version`
    /// or when its VM size is known and differs from the scale set's.
    /// Instances without a node are skipped.
    #[must_use]
    pub fn of(
        vmss: &str,
        vmss_sku: Option<&str>,
        instances: Vec<VirtualMachineScaleSetVm>,
        nodes: Vec<Node>,
        operator_version: &Version,
    ) -> Self {
        let mut nodes: HashMap<String, Node> = nodes
            .into_iter()
            .map(|n| (node_name(&n).to_string(), n))
            .collect();
        let mut partition = Self::default();

        for instance in instances {
            let name = worker_node_name(vmss, &instance.instance_id);
            let Some(node) = nodes.remove(&name) else {
                debug!("Instance {} of {} has no node {} yet", instance.instance_id, vmss, name);
                continue;
            };

            let version = match node_label(&node, OPERATOR_VERSION).map(Version::parse) {
                Some(Ok(version)) => version,
                Some(Err(e)) => {
                    warn!("Node {} has an invalid version label: {}", name, e);
                    continue;
                }
                None => {
                    debug!("Node {} has no version label", name);
                    continue;
                }
            };

            let resized = matches!((instance.sku_name(), vmss_sku), (Some(a), Some(b)) if a != b);
            let worker = Worker { instance, node };
            if version < *operator_version || resized {
                partition.old.push(worker);
            } else {
                partition.new.push(worker);
            }
        }

        partition
    }
}
